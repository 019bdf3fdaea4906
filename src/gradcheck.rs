//! Finite-difference gradient checking.
//!
//! Compares an analytic gradient against a central-difference approximation,
//! which is the usual first step when wiring a new objective into a solver.
use crate::minimize::{l2_norm, ObjFn, ObjGradFn};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

/// Tolerances for [`gradient_check`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientCheckOptions {
    pub eps: f64,
    pub atol: f64,
    pub rtol: f64,
}

impl Default for GradientCheckOptions {
    fn default() -> Self {
        Self {
            eps: 1e-6,
            atol: 1e-5,
            rtol: 1e-4,
        }
    }
}

/// Outcome of a gradient check
#[derive(Debug, Clone, PartialEq)]
pub struct GradientCheck {
    pub ok: bool,
    pub numerical: Array1<f64>,
    pub analytical: Array1<f64>,
    pub diff_norm: f64,
}

/// Central finite-difference gradient of `f` at `x` with step `eps`
pub fn finite_difference_gradient<F>(f: &F, x: &Array1<f64>, eps: f64) -> Array1<f64>
where
    F: ObjFn + ?Sized,
{
    let mut grad = Array1::zeros(x.len());
    let mut probe = x.clone();

    for i in 0..x.len() {
        let xi = probe[i];

        probe[i] = xi + eps;
        let f_plus = f.call(&probe);

        probe[i] = xi - eps;
        let f_minus = f.call(&probe);

        probe[i] = xi;
        grad[i] = (f_plus - f_minus) / (2.0 * eps);
    }

    grad
}

/// Compare the analytic gradient of `f` with a central finite difference at `x`.
///
/// The check passes when `‖analytic − numerical‖₂ ≤ atol + rtol·‖numerical‖₂`.
///
/// # Arguments
/// * `f` - Objective with analytic gradient
/// * `x` - Point at which to compare
/// * `options` - Step size and tolerances
///
/// # Returns
/// * `GradientCheck` with both gradients and the norm of their difference
pub fn gradient_check<F>(f: &F, x: &Array1<f64>, options: &GradientCheckOptions) -> GradientCheck
where
    F: ObjGradFn + ?Sized,
{
    let analytical = f.grad(x);
    let numerical = finite_difference_gradient(f, x, options.eps);
    let diff_norm = if analytical.len() == numerical.len() {
        l2_norm(&(&analytical - &numerical))
    } else {
        f64::INFINITY
    };
    let ok = diff_norm <= options.atol + options.rtol * l2_norm(&numerical);

    GradientCheck {
        ok,
        numerical,
        analytical,
        diff_norm,
    }
}
