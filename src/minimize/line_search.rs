//! Strong-Wolfe line search.
//!
//! Bracketing phase followed by a bisection zoom (Nocedal & Wright,
//! Algorithms 3.5 and 3.6). Shared by the BFGS and L-BFGS solvers.
use crate::error::MinimizerError;
use crate::minimize::ObjGradFn;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Zoom stops once the bracket is narrower than this
const BRACKET_WIDTH_FLOOR: f64 = 1e-12;

/// Strong Wolfe line-search parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSearchConfig {
    pub initial_step: f64,
    /// Sufficient-decrease (Armijo) constant
    pub c1: f64,
    /// Curvature constant
    pub c2: f64,
    /// Trial budget for each of the two phases
    pub max_iter: usize,
    pub max_step: f64,
}

impl Default for LineSearchConfig {
    fn default() -> Self {
        Self {
            initial_step: 1.0,
            c1: 1e-4,
            c2: 0.9,
            max_iter: 25,
            max_step: 50.0,
        }
    }
}

impl LineSearchConfig {
    pub fn with_initial_step(mut self, initial_step: f64) -> Self {
        self.initial_step = initial_step;
        self
    }

    pub fn with_c1(mut self, c1: f64) -> Self {
        self.c1 = c1;
        self
    }

    pub fn with_c2(mut self, c2: f64) -> Self {
        self.c2 = c2;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = max_step;
        self
    }

    /// Check `0 < c1 < c2 < 1`, `max_iter >= 1` and `0 < initial_step <= max_step`
    pub fn validate(&self) -> Result<(), MinimizerError> {
        if !(self.c1 > 0.0 && self.c1 < self.c2 && self.c2 < 1.0) {
            return Err(MinimizerError::InvalidParameters(format!(
                "line search needs 0 < c1 < c2 < 1, got c1 = {}, c2 = {}",
                self.c1, self.c2
            )));
        }
        if !(self.initial_step > 0.0) || !self.initial_step.is_finite() {
            return Err(MinimizerError::InvalidParameters(format!(
                "initial step must be positive and finite, got {}",
                self.initial_step
            )));
        }
        if self.max_iter == 0 {
            return Err(MinimizerError::InvalidParameters(
                "line search needs at least one trial per phase".to_string(),
            ));
        }
        if !(self.max_step >= self.initial_step) {
            return Err(MinimizerError::InvalidParameters(format!(
                "max step {} is smaller than initial step {}",
                self.max_step, self.initial_step
            )));
        }
        Ok(())
    }
}

/// Accepted step along the search direction.
///
/// A `step` of exactly zero means no usable step was found; `f_new` and
/// `g_new` are then the values passed in.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSearchResult {
    pub step: f64,
    pub f_new: f64,
    pub g_new: Array1<f64>,
    pub n_fun: usize,
    pub n_grad: usize,
    /// Both strong Wolfe conditions were verified at `step`
    pub wolfe: bool,
}

impl LineSearchResult {
    pub fn failed(&self) -> bool {
        self.step == 0.0
    }
}

/// One evaluated point on the ray `x + alpha * p`
struct Trial {
    alpha: f64,
    f: f64,
    g: Array1<f64>,
    /// Directional derivative `g · p`
    dphi: f64,
}

struct StrongWolfe<'a, F: ObjGradFn + ?Sized> {
    f: &'a F,
    x: &'a Array1<f64>,
    p: &'a Array1<f64>,
    phi0: f64,
    dphi0: f64,
    config: &'a LineSearchConfig,
    evals: usize,
}

impl<'a, F: ObjGradFn + ?Sized> StrongWolfe<'a, F> {
    fn evaluate(&mut self, alpha: f64) -> Trial {
        let mut xa = self.x.clone();
        xa.scaled_add(alpha, self.p);
        let f = self.f.call(&xa);
        let g = self.f.grad(&xa);
        let dphi = g.dot(self.p);
        self.evals += 1;
        trace!(alpha, f, dphi, "line search trial");
        Trial { alpha, f, g, dphi }
    }

    // NaN objective values count as a failed decrease
    fn sufficient_decrease(&self, trial: &Trial) -> bool {
        trial.f <= self.phi0 + self.config.c1 * trial.alpha * self.dphi0
    }

    fn curvature(&self, trial: &Trial) -> bool {
        trial.dphi.abs() <= -self.config.c2 * self.dphi0
    }

    fn origin(&self) -> Trial {
        Trial {
            alpha: 0.0,
            f: self.phi0,
            g: Array1::zeros(0),
            dphi: self.dphi0,
        }
    }

    fn bracket(&mut self) -> (Trial, bool) {
        let mut prev = self.origin();
        let mut alpha = self.config.initial_step;

        for i in 0..self.config.max_iter {
            let cur = self.evaluate(alpha);

            if !self.sufficient_decrease(&cur) || (i > 0 && cur.f >= prev.f) {
                return self.zoom(prev, cur.alpha, Some(cur));
            }
            if self.curvature(&cur) {
                return (cur, true);
            }
            if cur.dphi >= 0.0 {
                let hi = prev.alpha;
                return self.zoom(cur, hi, None);
            }

            alpha = (alpha * 2.0).min(self.config.max_step);
            prev = cur;
        }

        // Budget spent while still descending: hand back the furthest trial
        (prev, false)
    }

    /// Bisect `[lo, hi]`, where `lo` is the endpoint with the lower objective
    fn zoom(&mut self, mut lo: Trial, mut hi: f64, mut last: Option<Trial>) -> (Trial, bool) {
        for _ in 0..self.config.max_iter {
            if (hi - lo.alpha).abs() < BRACKET_WIDTH_FLOOR {
                break;
            }
            let alpha = 0.5 * (lo.alpha + hi);
            if alpha > self.config.max_step {
                break;
            }

            let mid = self.evaluate(alpha);
            if !self.sufficient_decrease(&mid) || mid.f >= lo.f {
                hi = mid.alpha;
                last = Some(mid);
            } else {
                if self.curvature(&mid) {
                    return (mid, true);
                }
                if mid.dphi * (hi - lo.alpha) >= 0.0 {
                    hi = lo.alpha;
                }
                lo = mid;
            }
        }

        if lo.alpha > 0.0 {
            return (lo, false);
        }
        match last {
            Some(trial) if trial.f <= self.phi0 => (trial, false),
            _ => (self.origin(), false),
        }
    }
}

/// Find a step along `p` satisfying the strong Wolfe conditions.
///
/// # Arguments
/// * `f` - Objective with gradient
/// * `x` - Current point
/// * `p` - Search direction
/// * `f0` - Objective value at `x`
/// * `g0` - Gradient at `x`
/// * `config` - Line-search parameters
///
/// # Returns
/// * `LineSearchResult` with the step, the new value and gradient, and the
///   number of evaluations made here (`f0`/`g0` are not counted). If `p` is
///   not a descent direction the step is zero and nothing is evaluated.
pub fn line_search<F>(
    f: &F,
    x: &Array1<f64>,
    p: &Array1<f64>,
    f0: f64,
    g0: &Array1<f64>,
    config: &LineSearchConfig,
) -> LineSearchResult
where
    F: ObjGradFn + ?Sized,
{
    let dphi0 = g0.dot(p);
    if !(dphi0 < 0.0) {
        return LineSearchResult {
            step: 0.0,
            f_new: f0,
            g_new: g0.clone(),
            n_fun: 0,
            n_grad: 0,
            wolfe: false,
        };
    }

    let mut search = StrongWolfe {
        f,
        x,
        p,
        phi0: f0,
        dphi0,
        config,
        evals: 0,
    };
    let (trial, wolfe) = search.bracket();

    let (step, f_new, g_new) = if trial.alpha > 0.0 {
        (trial.alpha, trial.f, trial.g)
    } else {
        (0.0, f0, g0.clone())
    };

    LineSearchResult {
        step,
        f_new,
        g_new,
        n_fun: search.evals,
        n_grad: search.evals,
        wolfe,
    }
}
