use crate::error::MinimizerError;
use ndarray::prelude::*;

pub mod bfgs;
pub mod history;
pub mod lbfgs;
pub mod lbfgsb;
pub mod line_search;
pub mod objective;
pub mod result;

pub use self::bfgs::{bfgs, update_inverse_hessian, Bfgs, BfgsOptions, HessianUpdate};
pub use self::history::CurvatureHistory;
pub use self::lbfgs::{lbfgs, Lbfgs, LbfgsOptions};
pub use self::lbfgsb::{lbfgsb, Bound, Lbfgsb, LbfgsbOptions};
pub use self::line_search::{line_search, LineSearchConfig, LineSearchResult};
pub use self::objective::{MultiDimGradFn, MultiDimNumGradFn, ObjFn, ObjGradFn};
pub use self::result::{IterationDetail, Observer, OptimizeResult, SolverState, Status};

/// Curvature products `y·s` at or below this are treated as lost curvature.
pub(crate) const CURVATURE_EPS: f64 = 1e-12;

/// Common interface for the quasi-Newton solvers
pub trait Minimizer {
    /// Short method name used in logs and reports
    fn name(&self) -> &str;

    /// Run the solver from `x0` until convergence, stall or budget exhaustion
    fn minimize(&self, x0: &Array1<f64>) -> Result<OptimizeResult, MinimizerError>;

    /// Same as [`Minimizer::minimize`] with an observer notified after every accepted iteration
    fn minimize_with_observer(
        &self,
        x0: &Array1<f64>,
        observer: &mut dyn Observer,
    ) -> Result<OptimizeResult, MinimizerError>;
}

/// Infinity norm, used for every gradient stopping test
pub fn inf_norm(v: &Array1<f64>) -> f64 {
    v.iter().fold(0.0, |acc: f64, &x| acc.max(x.abs()))
}

/// Euclidean norm
pub fn l2_norm(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}

/// Shared input checks run before any iteration starts.
///
/// Evaluates the objective and gradient at `x0` and returns them so the caller
/// can charge one evaluation of each.
pub(crate) fn initial_evaluation(
    f: &dyn ObjGradFn,
    x0: &Array1<f64>,
    tol: f64,
) -> Result<(f64, Array1<f64>), MinimizerError> {
    if x0.is_empty() {
        return Err(MinimizerError::InvalidDimension);
    }
    if !tol.is_finite() || tol < 0.0 {
        return Err(MinimizerError::InvalidTolerance);
    }

    let f0 = f.call(x0);
    if !f0.is_finite() {
        return Err(MinimizerError::FunctionEvaluationError);
    }

    let g0 = f.grad(x0);
    if g0.len() != x0.len() {
        return Err(MinimizerError::DimensionMismatch(format!(
            "gradient has length {} but the start point has length {}",
            g0.len(),
            x0.len()
        )));
    }
    if g0.iter().any(|g| !g.is_finite()) {
        return Err(MinimizerError::GradientEvaluationError);
    }

    Ok((f0, g0))
}
