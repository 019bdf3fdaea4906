use ndarray::prelude::*;
use serde::Serialize;
use std::fmt;

/// Outcome tag carried by every [`OptimizeResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Converged,
    LineSearchFailed,
    MaxIter,
    Warning,
    /// In-progress snapshot handed to an [`Observer`]
    Iter,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Converged => "converged",
            Status::LineSearchFailed => "line_search_failed",
            Status::MaxIter => "max_iter",
            Status::Warning => "warning",
            Status::Iter => "iter",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Solver lifecycle shared by BFGS and L-BFGS.
///
/// `Running` is the only state from which further iterations happen; the
/// other three are terminal and map one-to-one onto a [`Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    Running,
    Converged,
    LineSearchFailed,
    MaxIterReached,
}

impl SolverState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SolverState::Running)
    }

    /// Status reported for a terminal state, `None` while running
    pub fn status(&self) -> Option<Status> {
        match self {
            SolverState::Running => None,
            SolverState::Converged => Some(Status::Converged),
            SolverState::LineSearchFailed => Some(Status::LineSearchFailed),
            SolverState::MaxIterReached => Some(Status::MaxIter),
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, SolverState::Converged)
    }

    pub fn message(&self) -> &'static str {
        match self {
            SolverState::Running => "In-progress",
            SolverState::Converged => "Gradient norm below tolerance",
            SolverState::LineSearchFailed => "Line search failed to find descent",
            SolverState::MaxIterReached => "Reached maximum iterations",
        }
    }
}

/// Solver internals attached to in-progress snapshots
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum IterationDetail {
    /// Inverse-Hessian approximation after the update (BFGS)
    InverseHessian(Array2<f64>),
    /// Stored curvature pairs, oldest first (L-BFGS)
    History {
        s: Vec<Array1<f64>>,
        y: Vec<Array1<f64>>,
    },
}

/// Result of a solver run, or an in-progress snapshot of one
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizeResult {
    pub x: Array1<f64>,
    pub fun: f64,
    pub grad: Array1<f64>,
    pub n_iter: usize,
    pub n_fun: usize,
    pub n_grad: usize,
    pub success: bool,
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<IterationDetail>,
}

impl OptimizeResult {
    /// Build the record for a terminal solver state
    pub(crate) fn terminal(
        state: SolverState,
        x: Array1<f64>,
        fun: f64,
        grad: Array1<f64>,
        n_iter: usize,
        evals: Evaluations,
    ) -> Self {
        OptimizeResult {
            x,
            fun,
            grad,
            n_iter,
            n_fun: evals.n_fun,
            n_grad: evals.n_grad,
            success: state.success(),
            status: state.status().unwrap_or(Status::Warning),
            message: state.message().to_string(),
            detail: None,
        }
    }

    /// Build an in-progress snapshot for an observer
    pub(crate) fn snapshot(
        x: &Array1<f64>,
        fun: f64,
        grad: &Array1<f64>,
        n_iter: usize,
        evals: Evaluations,
        detail: IterationDetail,
    ) -> Self {
        OptimizeResult {
            x: x.clone(),
            fun,
            grad: grad.clone(),
            n_iter,
            n_fun: evals.n_fun,
            n_grad: evals.n_grad,
            success: true,
            status: Status::Iter,
            message: SolverState::Running.message().to_string(),
            detail: Some(detail),
        }
    }

    /// Infinity norm of the final gradient
    pub fn grad_norm(&self) -> f64 {
        super::inf_norm(&self.grad)
    }
}

impl fmt::Display for OptimizeResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "status:  {} ({})", self.status, self.message)?;
        writeln!(f, "success: {}", self.success)?;
        writeln!(f, "fun:     {:.6e}", self.fun)?;
        writeln!(f, "|grad|:  {:.2e}", self.grad_norm())?;
        writeln!(f, "n_iter:  {}", self.n_iter)?;
        write!(f, "n_fun:   {}  n_grad: {}", self.n_fun, self.n_grad)
    }
}

/// Objective/gradient evaluation counters for one solver call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Evaluations {
    pub n_fun: usize,
    pub n_grad: usize,
}

impl Evaluations {
    pub fn charge(&mut self, n_fun: usize, n_grad: usize) {
        self.n_fun += n_fun;
        self.n_grad += n_grad;
    }
}

/// Listener notified synchronously after every accepted iteration.
///
/// Observers are advisory: they see a snapshot and cannot steer the solver.
pub trait Observer {
    fn observe(&mut self, snapshot: &OptimizeResult);
}

impl<F> Observer for F
where
    F: FnMut(&OptimizeResult),
{
    fn observe(&mut self, snapshot: &OptimizeResult) {
        self(snapshot)
    }
}

#[cfg(test)]
mod minimize_result_tests {
    use super::*;

    #[test]
    fn test_terminal_states_map_to_status() {
        assert_eq!(SolverState::Running.status(), None);
        assert_eq!(SolverState::Converged.status(), Some(Status::Converged));
        assert_eq!(
            SolverState::LineSearchFailed.status(),
            Some(Status::LineSearchFailed)
        );
        assert_eq!(SolverState::MaxIterReached.status(), Some(Status::MaxIter));
        assert!(SolverState::Converged.success());
        assert!(!SolverState::MaxIterReached.success());
        assert!(!SolverState::Running.is_terminal());
        assert!(SolverState::LineSearchFailed.is_terminal());
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(Status::LineSearchFailed.to_string(), "line_search_failed");
        assert_eq!(
            serde_json::to_string(&Status::MaxIter).unwrap(),
            "\"max_iter\""
        );
    }

    #[test]
    fn test_closure_observer() {
        let mut seen = Vec::new();
        {
            let mut observer = |r: &OptimizeResult| seen.push(r.fun);
            let snap = OptimizeResult::snapshot(
                &array![1.0],
                2.5,
                &array![0.0],
                1,
                Evaluations::default(),
                IterationDetail::InverseHessian(Array2::eye(1)),
            );
            observer.observe(&snap);
        }
        assert_eq!(seen, vec![2.5]);
    }

    #[test]
    fn test_result_serializes() {
        let res = OptimizeResult::terminal(
            SolverState::Converged,
            array![1.0, 1.0],
            0.0,
            array![0.0, 0.0],
            3,
            Evaluations { n_fun: 5, n_grad: 5 },
        );
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["status"], "converged");
        assert_eq!(json["n_fun"], 5);
        assert!(json.get("detail").is_none());
        assert!(res.to_string().contains("converged"));
    }
}
