use crate::error::MinimizerError;
use crate::minimize::result::Evaluations;
use crate::minimize::{
    inf_norm, initial_evaluation, line_search, IterationDetail, LineSearchConfig, Minimizer,
    ObjGradFn, Observer, OptimizeResult, SolverState, CURVATURE_EPS,
};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Options for [`Bfgs`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BfgsOptions {
    pub max_iter: usize,
    /// Stop once the gradient infinity norm is at or below this
    pub tol: f64,
    pub line_search: LineSearchConfig,
}

impl Default for BfgsOptions {
    fn default() -> Self {
        Self {
            max_iter: 200,
            tol: 1e-6,
            line_search: LineSearchConfig::default(),
        }
    }
}

impl BfgsOptions {
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

/// What [`update_inverse_hessian`] did to the matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HessianUpdate {
    Updated,
    /// Curvature `y·s` was too small and the matrix is now the identity
    Reset,
}

/// Rank-two inverse BFGS update of `h` in place.
///
/// Applies `H ← (I − ρ s yᵀ) H (I − ρ y sᵀ) + ρ s sᵀ` with `ρ = 1/(y·s)`,
/// expanded as `H + (ρ² yᵀHy + ρ) s sᵀ − ρ (Hy sᵀ + s (Hy)ᵀ)` so no
/// temporary matrices are formed. When `y·s ≤ 1e-12` the matrix is reset to
/// the identity instead.
pub fn update_inverse_hessian(
    h: &mut Array2<f64>,
    s: &Array1<f64>,
    y: &Array1<f64>,
) -> HessianUpdate {
    let ys = y.dot(s);
    if !(ys > CURVATURE_EPS) {
        h.fill(0.0);
        h.diag_mut().fill(1.0);
        return HessianUpdate::Reset;
    }

    let rho = 1.0 / ys;
    let hy = h.dot(y);
    let coef = rho * rho * y.dot(&hy) + rho;

    for ((i, j), hij) in h.indexed_iter_mut() {
        *hij += coef * s[i] * s[j] - rho * (hy[i] * s[j] + s[i] * hy[j]);
    }

    HessianUpdate::Updated
}

/// Full-memory BFGS with a strong-Wolfe line search
#[derive(Clone)]
pub struct Bfgs {
    f: Box<dyn ObjGradFn>,
    options: BfgsOptions,
}

impl Bfgs {
    pub fn new<F>(f: F) -> Self
    where
        F: ObjGradFn + Clone + 'static,
    {
        Self::new_boxed(Box::new(f))
    }

    pub fn new_boxed(f: Box<dyn ObjGradFn>) -> Self {
        Bfgs {
            f,
            options: BfgsOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BfgsOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &BfgsOptions {
        &self.options
    }

    /// Minimize from `x0`
    ///
    /// # Arguments
    /// * `x0` - Starting point
    ///
    /// # Returns
    /// * `OptimizeResult` with status `converged`, `line_search_failed` or
    ///   `max_iter`. Malformed input is reported as `MinimizerError` before
    ///   any iteration runs.
    pub fn minimize(&self, x0: &Array1<f64>) -> Result<OptimizeResult, MinimizerError> {
        self.run(x0, None)
    }

    /// Minimize from `x0`, reporting every accepted iteration to `observer`
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
        let (mut f, mut g) = initial_evaluation(self.f.as_ref(), x0, opts.tol)?;

        let mut x = x0.clone();
        let mut h = Array2::eye(x.len());
        let mut evals = Evaluations { n_fun: 1, n_grad: 1 };
        let mut state = SolverState::Running;
        let mut n_iter = 0;

        for k in 1..=opts.max_iter {
            if inf_norm(&g) <= opts.tol {
                state = SolverState::Converged;
                break;
            }

            let p = -h.dot(&g);
            let ls = line_search(self.f.as_ref(), &x, &p, f, &g, &opts.line_search);
            evals.charge(ls.n_fun, ls.n_grad);
            if ls.failed() {
                state = SolverState::LineSearchFailed;
                break;
            }

            let s = p * ls.step;
            let y = &ls.g_new - &g;
            if update_inverse_hessian(&mut h, &s, &y) == HessianUpdate::Reset {
                debug!(iter = k, "curvature lost, inverse Hessian reset to identity");
            }

            x += &s;
            f = ls.f_new;
            g = ls.g_new;
            n_iter = k;
            debug!(iter = k, f, grad_norm = inf_norm(&g), step = ls.step, "bfgs iteration");

            if let Some(obs) = observer.as_mut() {
                obs.observe(&OptimizeResult::snapshot(
                    &x,
                    f,
                    &g,
                    k,
                    evals,
                    IterationDetail::InverseHessian(h.clone()),
                ));
            }
        }

        if state == SolverState::Running {
            state = SolverState::MaxIterReached;
        }
        let result = OptimizeResult::terminal(state, x, f, g, n_iter, evals);
        debug!(status = %result.status, n_iter, n_fun = evals.n_fun, "bfgs finished");
        Ok(result)
    }
}

impl Minimizer for Bfgs {
    fn name(&self) -> &str {
        "BFGS"
    }

    fn minimize(&self, x0: &Array1<f64>) -> Result<OptimizeResult, MinimizerError> {
        Bfgs::minimize(self, x0)
    }

    fn minimize_with_observer(
        &self,
        x0: &Array1<f64>,
        observer: &mut dyn Observer,
    ) -> Result<OptimizeResult, MinimizerError> {
        Bfgs::minimize_with_observer(self, x0, observer)
    }
}

/// Run [`Bfgs`] on `f` from `x0` with `options`
pub fn bfgs<F>(
    f: F,
    x0: &Array1<f64>,
    options: BfgsOptions,
) -> Result<OptimizeResult, MinimizerError>
where
    F: ObjGradFn + Clone + 'static,
{
    Bfgs::new(f).with_options(options).minimize(x0)
}
