use crate::error::MinimizerError;
use crate::minimize::result::Evaluations;
use crate::minimize::{
    inf_norm, initial_evaluation, line_search, CurvatureHistory, IterationDetail,
    LineSearchConfig, Minimizer, ObjGradFn, Observer, OptimizeResult, SolverState, CURVATURE_EPS,
};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Options for [`Lbfgs`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LbfgsOptions {
    /// Number of curvature pairs kept
    pub memory: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub line_search: LineSearchConfig,
}

impl Default for LbfgsOptions {
    fn default() -> Self {
        Self {
            memory: 10,
            max_iter: 200,
            tol: 1e-6,
            line_search: LineSearchConfig::default(),
        }
    }
}

impl LbfgsOptions {
    pub fn with_memory(mut self, memory: usize) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_line_search(mut self, line_search: LineSearchConfig) -> Self {
        self.line_search = line_search;
        self
    }
}

/// Limited-memory BFGS.
///
/// The inverse Hessian is never formed; directions come from the two-loop
/// recursion over the last `memory` curvature pairs. The history is dropped
/// whenever curvature is lost or the recursion stops producing a descent
/// direction, in which case that iteration falls back to steepest descent.
#[derive(Clone)]
pub struct Lbfgs {
    f: Box<dyn ObjGradFn>,
    options: LbfgsOptions,
}

impl Lbfgs {
    pub fn new<F>(f: F) -> Self
    where
        F: ObjGradFn + Clone + 'static,
    {
        Self::new_boxed(Box::new(f))
    }

    pub fn new_boxed(f: Box<dyn ObjGradFn>) -> Self {
        Lbfgs {
            f,
            options: LbfgsOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LbfgsOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &LbfgsOptions {
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
        mut observer: Option<&mut dyn Observer>,
    ) -> Result<OptimizeResult, MinimizerError> {
        let opts = &self.options;
        opts.line_search.validate()?;
        let mut history = CurvatureHistory::new(opts.memory, x0.len())?;
        let (mut f, mut g) = initial_evaluation(self.f.as_ref(), x0, opts.tol)?;

        let mut x = x0.clone();
        let mut evals = Evaluations { n_fun: 1, n_grad: 1 };
        let mut state = SolverState::Running;
        let mut n_iter = 0;

        for k in 1..=opts.max_iter {
            if inf_norm(&g) <= opts.tol {
                state = SolverState::Converged;
                break;
            }

            let p = search_direction(&mut history, &g);

            let ls = line_search(self.f.as_ref(), &x, &p, f, &g, &opts.line_search);
            evals.charge(ls.n_fun, ls.n_grad);
            if ls.failed() {
                state = SolverState::LineSearchFailed;
                break;
            }

            let s = p * ls.step;
            let y = &ls.g_new - &g;
            if y.dot(&s) > CURVATURE_EPS {
                history.push(&s, &y);
            } else {
                debug!(iter = k, "curvature lost, history cleared");
                history.clear();
            }

            x += &s;
            f = ls.f_new;
            g = ls.g_new;
            n_iter = k;
            debug!(iter = k, f, grad_norm = inf_norm(&g), step = ls.step, "lbfgs iteration");

            if let Some(obs) = observer.as_mut() {
                let (s_hist, y_hist) = history.pairs();
                obs.observe(&OptimizeResult::snapshot(
                    &x,
                    f,
                    &g,
                    k,
                    evals,
                    IterationDetail::History {
                        s: s_hist,
                        y: y_hist,
                    },
                ));
            }
        }

        if state == SolverState::Running {
            state = SolverState::MaxIterReached;
        }
        let result = OptimizeResult::terminal(state, x, f, g, n_iter, evals);
        debug!(status = %result.status, n_iter, n_fun = evals.n_fun, "lbfgs finished");
        Ok(result)
    }
}

/// Two-loop direction, or steepest descent with the history dropped when the
/// recursion does not give a descent direction
pub(crate) fn search_direction(history: &mut CurvatureHistory, g: &Array1<f64>) -> Array1<f64> {
    let p = history.two_loop(g);
    if p.dot(g) < 0.0 {
        return p;
    }
    debug!(stored = history.len(), "not a descent direction, history cleared");
    history.clear();
    -g
}

impl Minimizer for Lbfgs {
    fn name(&self) -> &str {
        "L-BFGS"
    }

    fn minimize(&self, x0: &Array1<f64>) -> Result<OptimizeResult, MinimizerError> {
        Lbfgs::minimize(self, x0)
    }

    fn minimize_with_observer(
        &self,
        x0: &Array1<f64>,
        observer: &mut dyn Observer,
    ) -> Result<OptimizeResult, MinimizerError> {
        Lbfgs::minimize_with_observer(self, x0, observer)
    }
}

/// Run [`Lbfgs`] on `f` from `x0` with `options`
pub fn lbfgs<F>(
    f: F,
    x0: &Array1<f64>,
    options: LbfgsOptions,
) -> Result<OptimizeResult, MinimizerError>
where
    F: ObjGradFn + Clone + 'static,
{
    Lbfgs::new(f).with_options(options).minimize(x0)
}
