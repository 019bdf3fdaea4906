//! Quasi-Newton minimizers over `ndarray` vectors: BFGS, L-BFGS with a
//! strong-Wolfe line search, and a box-constrained L-BFGS-B front end.
pub mod config;
pub mod error;
pub mod gradcheck;
pub mod minimize;
pub mod prelude;
pub mod problems;
