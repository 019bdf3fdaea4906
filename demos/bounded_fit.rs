//! Least-squares fit of `y = a·exp(−k·t) + c` with box constraints on the
//! parameters, compared against the unconstrained L-BFGS fit.
//!
//! ```text
//! cargo run --example bounded_fit
//! ```
use ndarray::prelude::*;
use qnmkit::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use tracing::{info, Level};

#[derive(Clone)]
struct DecayFit {
    t: Array1<f64>,
    y: Array1<f64>,
}

impl DecayFit {
    fn residuals(&self, p: &Array1<f64>) -> Array1<f64> {
        self.t.mapv(|ti| p[0] * (-p[1] * ti).exp() + p[2]) - &self.y
    }
}

impl ObjFn for DecayFit {
    fn call(&self, p: &Array1<f64>) -> f64 {
        let r = self.residuals(p);
        0.5 * r.dot(&r)
    }
}

impl ObjGradFn for DecayFit {
    fn grad(&self, p: &Array1<f64>) -> Array1<f64> {
        let r = self.residuals(p);
        let e = self.t.mapv(|ti| (-p[1] * ti).exp());
        array![
            r.dot(&e),
            -p[0] * (&r * &e).dot(&self.t),
            r.sum(),
        ]
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let noise = Normal::new(0.0, 0.05)?;
    let t = Array1::linspace(0.0, 4.0, 40);
    let y = t.mapv(|ti: f64| 2.5 * (-1.3 * ti).exp() + 0.4 + noise.sample(&mut rng));
    let fit = DecayFit { t, y };

    let check = gradient_check(&fit, &array![1.0, 1.0, 0.0], &GradientCheckOptions::default());
    info!(ok = check.ok, diff = check.diff_norm, "gradient check");

    let x0 = array![1.0, 0.5, 0.0];
    let bounds = vec![(Some(0.0), Some(10.0)), (Some(0.0), Some(5.0)), (Some(-1.0), Some(0.3))];

    let bounded = Lbfgsb::new(fit.clone())
        .with_bounds(bounds)
        .with_options(LbfgsbOptions::default().with_tol(1e-8))
        .minimize(&x0)?;
    println!("bounded fit (c <= 0.3):\n{}", bounded);
    println!("parameters: {}\n", bounded.x);

    let free = lbfgs(fit, &x0, LbfgsOptions::default().with_tol(1e-8))?;
    println!("unconstrained fit:\n{}", free);
    println!("parameters: {}", free.x);
    Ok(())
}
