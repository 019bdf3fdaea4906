//! Runs BFGS and L-BFGS over the benchmark problems and prints a Markdown
//! summary table.
//!
//! ```text
//! cargo run --example verify_solvers
//! ```
use qnmkit::minimize::inf_norm;
use qnmkit::prelude::*;
use tracing::{info, warn, Level};

struct Row {
    problem: String,
    solver: String,
    success: bool,
    fun: f64,
    grad_norm: f64,
    n_iter: usize,
    n_fun: usize,
    f_diff: f64,
    passed: bool,
}

fn verify(solver: &dyn Minimizer, problem: &Problem) -> Result<Row, MinimizerError> {
    let check = gradient_check(problem, &problem.x0, &GradientCheckOptions::default());
    if check.ok {
        info!(problem = %problem.name, diff = check.diff_norm, "gradient check passed");
    } else {
        warn!(problem = %problem.name, diff = check.diff_norm, "gradient check failed");
    }

    let res = solver.minimize(&problem.x0)?;
    let f_star = problem
        .solution
        .as_ref()
        .map(|x| problem.call(x))
        .unwrap_or(f64::NAN);
    let f_diff = (res.fun - f_star).abs();

    Ok(Row {
        problem: format!("{} (n={})", problem.name, problem.dim()),
        solver: solver.name().to_string(),
        success: res.success,
        fun: res.fun,
        grad_norm: inf_norm(&res.grad),
        n_iter: res.n_iter,
        n_fun: res.n_fun,
        f_diff,
        passed: res.success && f_diff < 1e-4,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let problems = vec![
        rosenbrock_problem(2, 1.0, 100.0)?,
        rosenbrock_problem(10, 1.0, 100.0)?,
        quadratic_problem(5, 10.0, Some(0))?,
        quadratic_problem(50, 100.0, Some(0))?,
    ];

    let mut rows = Vec::new();
    for problem in &problems {
        let solvers: Vec<Box<dyn Minimizer>> = vec![
            Box::new(Bfgs::new(problem.clone())),
            Box::new(Lbfgs::new(problem.clone())),
        ];
        for solver in &solvers {
            rows.push(verify(solver.as_ref(), problem)?);
        }
    }

    println!("| Problem | Solver | Success | f(x*) | ‖∇f‖∞ | Iters | Func evals | f_diff (known x*) | Status |");
    println!("|---------|--------|---------|-------|-------|-------|------------|-------------------|--------|");
    for r in &rows {
        println!(
            "| {} | {} | {} | {:.4e} | {:.1e} | {} | {} | {:.1e} | {} |",
            r.problem,
            r.solver,
            if r.success { "✓" } else { "✗" },
            r.fun,
            r.grad_norm,
            r.n_iter,
            r.n_fun,
            r.f_diff,
            if r.passed { "PASSED" } else { "FAILED" },
        );
    }
    Ok(())
}
