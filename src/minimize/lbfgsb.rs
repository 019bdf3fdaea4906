//! Bound-constrained L-BFGS delegated to `argmin`.
//!
//! Bounds are enforced by projection: every parameter argmin proposes is
//! clamped onto the box before the objective sees it, and gradient components
//! that would push an active coordinate further outside are zeroed.
use crate::error::MinimizerError;
use crate::minimize::{
    initial_evaluation, Minimizer, ObjGradFn, Observer, OptimizeResult, Status,
};
use argmin::core::{
    CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus,
};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// `(lower, upper)` for one coordinate, `None` meaning unbounded
pub type Bound = (Option<f64>, Option<f64>);

/// Options for [`Lbfgsb`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LbfgsbOptions {
    pub max_iter: usize,
    /// Gradient tolerance handed to argmin (Euclidean norm)
    pub tol: f64,
    pub memory: usize,
}

impl Default for LbfgsbOptions {
    fn default() -> Self {
        Self {
            max_iter: 15000,
            tol: 1e-6,
            memory: 10,
        }
    }
}

impl LbfgsbOptions {
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_memory(mut self, memory: usize) -> Self {
        self.memory = memory;
        self
    }
}

#[derive(Default)]
struct FuncCounts {
    cost: AtomicUsize,
    grad: AtomicUsize,
}

/// Objective seen by argmin: clamped evaluation plus projected gradient
struct BoxedProblem<'a> {
    f: &'a dyn ObjGradFn,
    bounds: &'a [(f64, f64)],
    counts: Arc<FuncCounts>,
}

fn clamp_params(params: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    params
        .iter()
        .zip(bounds.iter())
        .map(|(&v, &(lo, hi))| v.clamp(lo, hi))
        .collect()
}

impl<'a> BoxedProblem<'a> {
    fn projected_gradient(&self, clamped: &[f64]) -> Array1<f64> {
        let mut g = self.f.grad(&Array1::from(clamped.to_vec()));
        const EPS: f64 = 1e-12;
        for (gi, (&x, &(lo, hi))) in g.iter_mut().zip(clamped.iter().zip(self.bounds.iter())) {
            if (x <= lo + EPS && *gi > 0.0) || (x >= hi - EPS && *gi < 0.0) {
                *gi = 0.0;
            }
        }
        g
    }
}

impl<'a> CostFunction for BoxedProblem<'a> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        self.counts.cost.fetch_add(1, Ordering::Relaxed);
        let clamped = clamp_params(params, self.bounds);
        let value = self.f.call(&Array1::from(clamped));
        if !value.is_finite() {
            return Err(argmin::core::Error::msg(format!(
                "objective returned non-finite value {}",
                value
            )));
        }
        Ok(value)
    }
}

impl<'a> Gradient for BoxedProblem<'a> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, params: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
        self.counts.grad.fetch_add(1, Ordering::Relaxed);
        let clamped = clamp_params(params, self.bounds);
        Ok(self.projected_gradient(&clamped).to_vec())
    }
}

/// Turn optional bounds into a closed box, one `(lo, hi)` per coordinate
fn resolve_bounds(bounds: &[Bound], dim: usize) -> Result<Vec<(f64, f64)>, MinimizerError> {
    if bounds.is_empty() {
        return Ok(vec![(f64::NEG_INFINITY, f64::INFINITY); dim]);
    }
    if bounds.len() != dim {
        return Err(MinimizerError::InvalidBounds(format!(
            "{} bounds given for {} coordinates",
            bounds.len(),
            dim
        )));
    }

    bounds
        .iter()
        .enumerate()
        .map(|(i, &(lo, hi))| {
            let lo = lo.unwrap_or(f64::NEG_INFINITY);
            let hi = hi.unwrap_or(f64::INFINITY);
            if lo.is_nan() || hi.is_nan() {
                Err(MinimizerError::InvalidBounds(format!(
                    "bound {} is NaN",
                    i
                )))
            } else if lo > hi {
                Err(MinimizerError::InvalidBounds(format!(
                    "lower bound {} exceeds upper bound {} at coordinate {}",
                    lo, hi, i
                )))
            } else {
                Ok((lo, hi))
            }
        })
        .collect()
}

/// Box-constrained L-BFGS backed by argmin's `LBFGS` with a More-Thuente
/// line search.
///
/// Evaluation counts come from the delegate: `n_fun` and `n_grad` both report
/// the larger of argmin's cost and gradient call counts. A registered
/// observer is called once, with the final result.
#[derive(Clone)]
pub struct Lbfgsb {
    f: Box<dyn ObjGradFn>,
    bounds: Vec<Bound>,
    options: LbfgsbOptions,
}

impl Lbfgsb {
    pub fn new<F>(f: F) -> Self
    where
        F: ObjGradFn + Clone + 'static,
    {
        Self::new_boxed(Box::new(f))
    }

    pub fn new_boxed(f: Box<dyn ObjGradFn>) -> Self {
        Lbfgsb {
            f,
            bounds: Vec::new(),
            options: LbfgsbOptions::default(),
        }
    }

    /// One `(lower, upper)` pair per coordinate; an empty list leaves every
    /// coordinate free
    pub fn with_bounds(mut self, bounds: Vec<Bound>) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_options(mut self, options: LbfgsbOptions) -> Self {
        self.options = options;
        self
    }

    pub fn bounds(&self) -> &[Bound] {
        &self.bounds
    }

    pub fn options(&self) -> &LbfgsbOptions {
        &self.options
    }

    pub fn minimize(&self, x0: &Array1<f64>) -> Result<OptimizeResult, MinimizerError> {
        self.run(x0, None)
    }

    pub fn minimize_with_observer(
        &self,
        x0: &Array1<f64>,
        observer: &mut dyn Observer,
    ) -> Result<OptimizeResult, MinimizerError> {
        self.run(x0, Some(observer))
    }

    fn run(
        &self,
        x0: &Array1<f64>,
        observer: Option<&mut dyn Observer>,
    ) -> Result<OptimizeResult, MinimizerError> {
        let opts = &self.options;
        if opts.memory == 0 {
            return Err(MinimizerError::InvalidParameters(
                "L-BFGS-B memory must be at least 1".to_string(),
            ));
        }
        let bounds = resolve_bounds(&self.bounds, x0.len())?;
        let start = clamp_params(&x0.to_vec(), &bounds);
        initial_evaluation(self.f.as_ref(), &Array1::from(start.clone()), opts.tol)?;

        let counts = Arc::new(FuncCounts::default());
        let problem = BoxedProblem {
            f: self.f.as_ref(),
            bounds: &bounds,
            counts: counts.clone(),
        };

        let tol_cost = if opts.tol == 0.0 {
            0.0
        } else {
            (0.1 * opts.tol).max(1e-12)
        };
        let solver = LBFGS::new(MoreThuenteLineSearch::new(), opts.memory)
            .with_tolerance_grad(opts.tol)
            .and_then(|s| s.with_tolerance_cost(tol_cost))
            .map_err(|e| MinimizerError::InvalidParameters(e.to_string()))?;

        let res = Executor::new(problem, solver)
            .configure(|state| state.param(start).max_iters(opts.max_iter as u64))
            .run()
            .map_err(|e| MinimizerError::Delegate(e.to_string()))?;

        let state = res.state();
        let best = state
            .get_best_param()
            .ok_or_else(|| MinimizerError::Delegate("no parameters returned".to_string()))?;
        let x = clamp_params(best, &bounds);

        // recompute at the projected point, outside the delegate's counters
        let checker = BoxedProblem {
            f: self.f.as_ref(),
            bounds: &bounds,
            counts: Arc::new(FuncCounts::default()),
        };
        let grad = checker.projected_gradient(&x);
        let x = Array1::from(x);
        let fun = self.f.call(&x);

        let termination = state.get_termination_status();
        let success = matches!(
            termination,
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
        );
        let n_calls = counts
            .cost
            .load(Ordering::Relaxed)
            .max(counts.grad.load(Ordering::Relaxed));

        let result = OptimizeResult {
            x,
            fun,
            grad,
            n_iter: state.get_iter() as usize,
            n_fun: n_calls,
            n_grad: n_calls,
            success,
            status: if success {
                Status::Converged
            } else {
                Status::Warning
            },
            message: termination.to_string(),
            detail: None,
        };
        debug!(status = %result.status, n_iter = result.n_iter, n_fun = n_calls, "lbfgsb finished");

        if let Some(obs) = observer {
            obs.observe(&result);
        }
        Ok(result)
    }
}

impl Minimizer for Lbfgsb {
    fn name(&self) -> &str {
        "L-BFGS-B"
    }

    fn minimize(&self, x0: &Array1<f64>) -> Result<OptimizeResult, MinimizerError> {
        Lbfgsb::minimize(self, x0)
    }

    fn minimize_with_observer(
        &self,
        x0: &Array1<f64>,
        observer: &mut dyn Observer,
    ) -> Result<OptimizeResult, MinimizerError> {
        Lbfgsb::minimize_with_observer(self, x0, observer)
    }
}

/// Run [`Lbfgsb`] on `f` from `x0` inside `bounds`
pub fn lbfgsb<F>(
    f: F,
    x0: &Array1<f64>,
    bounds: Vec<Bound>,
    options: LbfgsbOptions,
) -> Result<OptimizeResult, MinimizerError>
where
    F: ObjGradFn + Clone + 'static,
{
    Lbfgsb::new(f)
        .with_bounds(bounds)
        .with_options(options)
        .minimize(x0)
}

#[cfg(test)]
mod minimize_lbfgsb_tests {
    use super::*;
    use crate::minimize::MultiDimGradFn;

    fn shifted_bowl() -> impl ObjGradFn + Clone {
        MultiDimGradFn::new(
            |x: &Array1<f64>| (x[0] - 1.0).powi(2) + (x[1] + 2.0).powi(2),
            |x: &Array1<f64>| array![2.0 * (x[0] - 1.0), 2.0 * (x[1] + 2.0)],
        )
    }

    #[test]
    fn test_resolve_bounds() {
        let free = resolve_bounds(&[], 2).unwrap();
        assert_eq!(free[0], (f64::NEG_INFINITY, f64::INFINITY));

        let mixed = resolve_bounds(&[(Some(0.0), None), (None, Some(1.0))], 2).unwrap();
        assert_eq!(mixed[0], (0.0, f64::INFINITY));
        assert_eq!(mixed[1], (f64::NEG_INFINITY, 1.0));

        assert!(matches!(
            resolve_bounds(&[(Some(0.0), None)], 2),
            Err(MinimizerError::InvalidBounds(_))
        ));
        assert!(matches!(
            resolve_bounds(&[(Some(2.0), Some(1.0))], 1),
            Err(MinimizerError::InvalidBounds(_))
        ));
        assert!(matches!(
            resolve_bounds(&[(Some(f64::NAN), None)], 1),
            Err(MinimizerError::InvalidBounds(_))
        ));
    }

    #[test]
    fn test_projected_gradient_zeroes_outward_components() {
        let f = shifted_bowl();
        let bounds = vec![(0.0, 2.0), (-1.0, 1.0)];
        let problem = BoxedProblem {
            f: &f,
            bounds: &bounds,
            counts: Arc::new(FuncCounts::default()),
        };
        // x1 sits on its lower bound and descent would push it below
        let g = problem.projected_gradient(&[1.5, -1.0]);
        assert_eq!(g, array![1.0, 0.0]);
    }

    #[test]
    fn test_interior_minimum() {
        let res = lbfgsb(
            shifted_bowl(),
            &array![0.5, 0.0],
            vec![(Some(-5.0), Some(5.0)), (Some(-5.0), Some(5.0))],
            LbfgsbOptions::default().with_tol(1e-9),
        )
        .unwrap();
        assert!(res.success);
        assert_eq!(res.status, Status::Converged);
        assert!((res.x[0] - 1.0).abs() < 1e-5);
        assert!((res.x[1] + 2.0).abs() < 1e-5);
        assert_eq!(res.n_fun, res.n_grad);
    }

    #[test]
    fn test_active_bound_and_projected_start() {
        let res = Lbfgsb::new(shifted_bowl())
            .with_bounds(vec![(Some(0.0), Some(2.0)), (Some(-1.0), Some(1.0))])
            .minimize(&array![3.0, 0.5])
            .unwrap();
        assert!((res.x[0] - 1.0).abs() < 1e-4);
        assert!((res.x[1] + 1.0).abs() < 1e-4);
        assert!(res.x[1] >= -1.0);
        assert_eq!(res.n_fun, res.n_grad);
        assert!(res.n_fun > 0);
    }

    #[test]
    fn test_observer_sees_final_result_once() {
        let mut calls = Vec::new();
        let mut observer = |r: &OptimizeResult| calls.push(r.status);
        let solver = Lbfgsb::new(shifted_bowl());
        let res = solver
            .minimize_with_observer(&array![0.0, 0.0], &mut observer)
            .unwrap();
        assert_eq!(calls, vec![res.status]);
    }

    #[test]
    fn test_invalid_input() {
        let solver = Lbfgsb::new(shifted_bowl()).with_bounds(vec![(Some(1.0), Some(0.0))]);
        assert!(matches!(
            solver.minimize(&array![0.0, 0.0]),
            Err(MinimizerError::InvalidBounds(_))
        ));

        let solver = Lbfgsb::new(shifted_bowl()).with_options(LbfgsbOptions::default().with_memory(0));
        assert!(matches!(
            solver.minimize(&array![0.0, 0.0]),
            Err(MinimizerError::InvalidParameters(_))
        ));

        let solver = Lbfgsb::new(shifted_bowl()).with_options(LbfgsbOptions::default().with_tol(f64::INFINITY));
        assert_eq!(
            solver.minimize(&array![0.0, 0.0]),
            Err(MinimizerError::InvalidTolerance)
        );
    }
}
