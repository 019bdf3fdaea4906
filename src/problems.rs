//! Synthetic benchmark problems for exercising the solvers.
use crate::minimize::{ObjFn, ObjGradFn};
use faer::Mat;
use ndarray::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use simple_error::{bail, SimpleError};
use std::fmt;

/// A named objective with a start point and, when known, its minimizer
#[derive(Clone)]
pub struct Problem {
    pub name: String,
    pub objective: Box<dyn ObjGradFn>,
    pub x0: Array1<f64>,
    pub solution: Option<Array1<f64>>,
}

impl Problem {
    pub fn new<F>(name: &str, objective: F, x0: Array1<f64>, solution: Option<Array1<f64>>) -> Self
    where
        F: ObjGradFn + Clone + 'static,
    {
        Problem {
            name: name.to_string(),
            objective: Box::new(objective),
            x0,
            solution,
        }
    }

    pub fn dim(&self) -> usize {
        self.x0.len()
    }
}

impl fmt::Debug for Problem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Problem")
            .field("name", &self.name)
            .field("x0", &self.x0)
            .field("solution", &self.solution)
            .finish()
    }
}

impl ObjFn for Problem {
    fn call(&self, x: &Array1<f64>) -> f64 {
        self.objective.call(x)
    }
}

impl ObjGradFn for Problem {
    fn grad(&self, x: &Array1<f64>) -> Array1<f64> {
        self.objective.grad(x)
    }
}

/// `f(x) = ½ xᵀAx − bᵀx`
#[derive(Debug, Clone)]
pub struct Quadratic {
    a: Array2<f64>,
    b: Array1<f64>,
}

impl Quadratic {
    pub fn new(a: Array2<f64>, b: Array1<f64>) -> Self {
        Quadratic { a, b }
    }
}

impl ObjFn for Quadratic {
    fn call(&self, x: &Array1<f64>) -> f64 {
        0.5 * x.dot(&self.a.dot(x)) - self.b.dot(x)
    }
}

impl ObjGradFn for Quadratic {
    fn grad(&self, x: &Array1<f64>) -> Array1<f64> {
        self.a.dot(x) - &self.b
    }
}

/// Chained Rosenbrock function
#[derive(Debug, Clone)]
pub struct Rosenbrock {
    a: f64,
    b: f64,
}

impl Rosenbrock {
    pub fn new(a: f64, b: f64) -> Self {
        Rosenbrock { a, b }
    }
}

impl ObjFn for Rosenbrock {
    fn call(&self, x: &Array1<f64>) -> f64 {
        x.windows(2)
            .into_iter()
            .map(|w| self.b * (w[1] - w[0] * w[0]).powi(2) + (self.a - w[0]).powi(2))
            .sum()
    }
}

impl ObjGradFn for Rosenbrock {
    fn grad(&self, x: &Array1<f64>) -> Array1<f64> {
        let n = x.len();
        let mut g = Array1::zeros(n);
        for i in 0..n.saturating_sub(1) {
            let r = x[i + 1] - x[i] * x[i];
            g[i] += -4.0 * self.b * x[i] * r - 2.0 * (self.a - x[i]);
            g[i + 1] += 2.0 * self.b * r;
        }
        g
    }
}

/// Random convex quadratic with a prescribed condition number
///
/// # Arguments
/// * `dim` - Problem dimension
/// * `condition_number` - Ratio of largest to smallest eigenvalue of `A`
/// * `seed` - Seed for reproducible problems, `None` for a fresh one
///
/// # Returns
/// * `Problem` with `A = QΛQᵀ`, where `Q` is a random orthogonal matrix and
///   the eigenvalues are evenly spaced in `[1, condition_number]`. The
///   solution `A⁻¹b` is exact up to rounding.
pub fn quadratic_problem(
    dim: usize,
    condition_number: f64,
    seed: Option<u64>,
) -> Result<Problem, SimpleError> {
    if dim == 0 {
        bail!("quadratic problem needs dim >= 1");
    }
    if !(condition_number >= 1.0) || !condition_number.is_finite() {
        bail!("condition number must be finite and at least 1");
    }

    let mut rng = match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => ChaCha8Rng::from_entropy(),
    };
    let mut normal = || -> f64 { StandardNormal.sample(&mut rng) };

    let gaussian = Mat::<f64>::from_fn(dim, dim, |_, _| normal());
    let q_faer = gaussian.qr().compute_q();
    let q = Array2::from_shape_fn((dim, dim), |(i, j)| q_faer.read(i, j));

    let eigenvalues = Array1::linspace(1.0, condition_number, dim);
    let a = (&q * &eigenvalues).dot(&q.t());
    let b = Array1::from_shape_fn(dim, |_| normal());

    // x* = Q Λ⁻¹ Qᵀ b
    let qtb = q.t().dot(&b);
    let solution = q.dot(&(&qtb / &eigenvalues));
    let x0 = Array1::from_shape_fn(dim, |_| normal());

    Ok(Problem::new(
        "quadratic",
        Quadratic::new(a, b),
        x0,
        Some(solution),
    ))
}

/// Chained Rosenbrock problem, `Σ b(xᵢ₊₁ − xᵢ²)² + (a − xᵢ)²`
///
/// Starts from `(-1.2, 1.0, -1.2, 1.0, …)`; the minimizer is `(a, …, a)`.
pub fn rosenbrock_problem(dim: usize, a: f64, b: f64) -> Result<Problem, SimpleError> {
    if dim < 2 {
        bail!("Rosenbrock problem requires dim >= 2");
    }

    let x0 = Array1::from_shape_fn(dim, |i| if i % 2 == 0 { -1.2 } else { 1.0 });
    let solution = Array1::from_elem(dim, a);

    Ok(Problem::new(
        "rosenbrock",
        Rosenbrock::new(a, b),
        x0,
        Some(solution),
    ))
}

#[cfg(test)]
mod problems_tests {
    use super::*;
    use crate::gradcheck::{gradient_check, GradientCheckOptions};
    use crate::minimize::inf_norm;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_quadratic_is_reproducible() {
        let p1 = quadratic_problem(4, 10.0, Some(3)).unwrap();
        let p2 = quadratic_problem(4, 10.0, Some(3)).unwrap();
        assert_eq!(p1.x0, p2.x0);
        assert_eq!(p1.solution, p2.solution);
        assert_eq!(p1.dim(), 4);
    }

    #[test]
    fn test_quadratic_solution_has_zero_gradient() {
        let p = quadratic_problem(6, 25.0, Some(11)).unwrap();
        let x_star = p.solution.clone().unwrap();
        assert!(inf_norm(&p.grad(&x_star)) < 1e-10);
        assert!(p.call(&x_star) < p.call(&p.x0));
    }

    #[test]
    fn test_quadratic_condition_number() {
        let p = quadratic_problem(3, 9.0, Some(2)).unwrap();
        // Rayleigh quotients of A stay inside [1, κ]
        let x = array![0.3, -1.0, 2.0];
        let ax = p.grad(&x) - p.grad(&Array1::zeros(3));
        let rq = x.dot(&ax) / x.dot(&x);
        assert!(rq >= 1.0 - 1e-12 && rq <= 9.0 + 1e-12);
    }

    #[test]
    fn test_rosenbrock_values() {
        let p = rosenbrock_problem(2, 1.0, 100.0).unwrap();
        assert_eq!(p.x0, array![-1.2, 1.0]);
        assert_abs_diff_eq!(p.call(&p.x0), 24.2, epsilon = 1e-12);
        assert_eq!(p.call(&array![1.0, 1.0]), 0.0);
        assert_eq!(p.grad(&array![1.0, 1.0]), array![0.0, 0.0]);

        let g = p.grad(&p.x0);
        assert_abs_diff_eq!(g[0], -215.6, epsilon = 1e-10);
        assert_abs_diff_eq!(g[1], -88.0, epsilon = 1e-10);
    }

    #[test]
    fn test_rosenbrock_gradient_checks_out() {
        let p = rosenbrock_problem(5, 1.0, 100.0).unwrap();
        let check = gradient_check(&p, &array![0.1, -0.4, 0.9, 1.3, -0.2], &GradientCheckOptions::default());
        assert!(check.ok, "diff_norm = {}", check.diff_norm);
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(rosenbrock_problem(1, 1.0, 100.0).is_err());
        assert!(quadratic_problem(0, 10.0, Some(0)).is_err());
        assert!(quadratic_problem(3, 0.5, Some(0)).is_err());
        assert!(quadratic_problem(3, f64::NAN, Some(0)).is_err());
    }
}
