//! qnmkit prelude.
//!
//! This module contains the most used types, traits and functions, which you
//! can import easily as a group.
//!
//! ```
//! use qnmkit::prelude::*;
//!
//! let problem = rosenbrock_problem(2, 1.0, 100.0).unwrap();
//! let x0 = problem.x0.clone();
//! let res = Bfgs::new(problem).minimize(&x0).unwrap();
//! assert_eq!(res.status, Status::Converged);
//! ```

#[doc(no_inline)]
pub use crate::config::SolverConfig;

#[doc(no_inline)]
pub use crate::error::MinimizerError;

#[doc(no_inline)]
pub use crate::gradcheck::{
    finite_difference_gradient, gradient_check, GradientCheck, GradientCheckOptions,
};

#[doc(no_inline)]
pub use crate::minimize::{
    bfgs, lbfgs, lbfgsb, line_search, Bfgs, BfgsOptions, Bound, Lbfgs, LbfgsOptions, Lbfgsb,
    LbfgsbOptions, LineSearchConfig, LineSearchResult, Minimizer, MultiDimGradFn,
    MultiDimNumGradFn, ObjFn, ObjGradFn, Observer, OptimizeResult, Status,
};

#[doc(no_inline)]
pub use crate::problems::{quadratic_problem, rosenbrock_problem, Problem};
