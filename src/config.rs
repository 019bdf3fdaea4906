//! Solver configuration loaded from JSON.
//!
//! Every section and field is optional; anything left out keeps its default.
//!
//! ```json
//! {
//!     "bfgs": { "tol": 1e-8, "line_search": { "c2": 0.5 } },
//!     "lbfgs": { "memory": 5 },
//!     "lbfgsb": { "max_iter": 500 }
//! }
//! ```
use crate::error::MinimizerError;
use crate::minimize::{BfgsOptions, LbfgsOptions, LbfgsbOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub bfgs: BfgsOptions,
    pub lbfgs: LbfgsOptions,
    pub lbfgsb: LbfgsbOptions,
}

impl SolverConfig {
    pub fn from_json_str(json: &str) -> Result<Self, MinimizerError> {
        let config: SolverConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MinimizerError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_string(&self) -> Result<String, MinimizerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values no solver run could accept
    pub fn validate(&self) -> Result<(), MinimizerError> {
        self.bfgs.line_search.validate()?;
        self.lbfgs.line_search.validate()?;
        for tol in [self.bfgs.tol, self.lbfgs.tol, self.lbfgsb.tol] {
            if !tol.is_finite() || tol < 0.0 {
                return Err(MinimizerError::ConfigError(format!(
                    "tolerance {} must be non-negative and finite",
                    tol
                )));
            }
        }
        if self.lbfgs.memory == 0 || self.lbfgsb.memory == 0 {
            return Err(MinimizerError::ConfigError(
                "memory must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
