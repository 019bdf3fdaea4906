use ndarray::prelude::*;
use qnmkit::minimize::update_inverse_hessian;
use qnmkit::minimize::HessianUpdate;
use qnmkit::prelude::*;

fn scaled_bowl() -> impl ObjGradFn + Clone {
    MultiDimGradFn::new(
        |x: &Array1<f64>| 0.5 * (3.0 * x[0] * x[0] + x[1] * x[1]),
        |x: &Array1<f64>| array![3.0 * x[0], x[1]],
    )
}

#[test]
fn accepted_step_satisfies_strong_wolfe() {
    let f = scaled_bowl();
    let config = LineSearchConfig::default();

    for start in [array![1.0, -2.0], array![-0.3, 4.0], array![10.0, 0.1]] {
        let f0 = f.call(&start);
        let g0 = f.grad(&start);
        let p = -&g0;
        let dphi0 = g0.dot(&p);

        let res = line_search(&f, &start, &p, f0, &g0, &config);

        assert!(res.step > 0.0);
        assert!(res.f_new <= f0 + config.c1 * res.step * dphi0);
        assert!(res.g_new.dot(&p).abs() <= config.c2 * dphi0.abs());
        assert_eq!(res.n_fun, res.n_grad);
    }
}

#[test]
fn tighter_curvature_constant_still_holds() {
    let f = scaled_bowl();
    let config = LineSearchConfig::default().with_c2(0.1);
    let x = array![1.0, -2.0];
    let g0 = f.grad(&x);
    let p = -&g0;

    let res = line_search(&f, &x, &p, f.call(&x), &g0, &config);
    assert!(res.wolfe);
    assert!(res.g_new.dot(&p).abs() <= 0.1 * g0.dot(&p).abs());
}

#[test]
fn ascent_direction_is_rejected_without_evaluations() {
    let f = scaled_bowl();
    let x = array![1.0, -2.0];
    let f0 = f.call(&x);
    let g0 = f.grad(&x);

    let res = line_search(&f, &x, &g0, f0, &g0, &LineSearchConfig::default());
    assert_eq!(res.step, 0.0);
    assert_eq!(res.f_new, f0);
    assert_eq!(res.g_new, g0);
    assert_eq!(res.n_fun, 0);
    assert_eq!(res.n_grad, 0);
}

#[test]
fn identity_reset_is_idempotent() {
    let mut h = array![[4.0, 1.0], [1.0, 2.0]];
    let s = array![0.1, 0.2];
    let y = array![-0.1, -0.2];

    assert_eq!(update_inverse_hessian(&mut h, &s, &y), HessianUpdate::Reset);
    let after_first = h.clone();
    assert_eq!(update_inverse_hessian(&mut h, &s, &y), HessianUpdate::Reset);
    assert_eq!(h, after_first);
    assert_eq!(h, Array2::<f64>::eye(2));
}
