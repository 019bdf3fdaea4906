use crate::gradcheck::finite_difference_gradient;
use dyn_clone::DynClone;
use ndarray::prelude::*;

// Define a trait for the objective function
pub trait ObjFn: DynClone {
    fn call(&self, x: &Array1<f64>) -> f64;
}
dyn_clone::clone_trait_object!(ObjFn);

// Define a trait for the gradient function
pub trait ObjGradFn: ObjFn + DynClone {
    fn grad(&self, x: &Array1<f64>) -> Array1<f64>;
}
dyn_clone::clone_trait_object!(ObjGradFn);

impl<F> ObjFn for F
where
    F: Fn(&Array1<f64>) -> f64 + DynClone,
{
    fn call(&self, x: &Array1<f64>) -> f64 {
        self(x)
    }
}

// Wrapper for multi-dimensional function w/gradient
#[derive(Clone)]
pub struct MultiDimGradFn<F, GF>(pub F, pub GF)
where
    F: Fn(&Array1<f64>) -> f64 + Clone,
    GF: Fn(&Array1<f64>) -> Array1<f64> + Clone;

// Convenience constructors
impl<F, GF> MultiDimGradFn<F, GF>
where
    F: Fn(&Array1<f64>) -> f64 + Clone,
    GF: Fn(&Array1<f64>) -> Array1<f64> + Clone,
{
    pub fn new(f: F, gf: GF) -> Self {
        MultiDimGradFn(f, gf)
    }
}

impl<F, GF> ObjFn for MultiDimGradFn<F, GF>
where
    F: Fn(&Array1<f64>) -> f64 + Clone,
    GF: Fn(&Array1<f64>) -> Array1<f64> + Clone,
{
    fn call(&self, x: &Array1<f64>) -> f64 {
        (self.0)(x)
    }
}

impl<F, GF> ObjGradFn for MultiDimGradFn<F, GF>
where
    F: Fn(&Array1<f64>) -> f64 + Clone,
    GF: Fn(&Array1<f64>) -> Array1<f64> + Clone,
{
    fn grad(&self, x: &Array1<f64>) -> Array1<f64> {
        (self.1)(x)
    }
}

/// Objective whose gradient is a central finite difference.
///
/// Handy when no analytic gradient is available, at the cost of `2n` extra
/// objective evaluations per gradient.
#[derive(Clone)]
pub struct MultiDimNumGradFn<F>
where
    F: Fn(&Array1<f64>) -> f64 + Clone,
{
    f: F,
    step: f64,
}

impl<F> MultiDimNumGradFn<F>
where
    F: Fn(&Array1<f64>) -> f64 + Clone,
{
    pub fn new(f: F, step: Option<f64>) -> Self {
        Self {
            f,
            step: step.unwrap_or(1e-8),
        }
    }

    pub fn step(&self) -> f64 {
        self.step
    }
}

impl<F> ObjFn for MultiDimNumGradFn<F>
where
    F: Fn(&Array1<f64>) -> f64 + Clone,
{
    fn call(&self, x: &Array1<f64>) -> f64 {
        (self.f)(x)
    }
}

impl<F> ObjGradFn for MultiDimNumGradFn<F>
where
    F: Fn(&Array1<f64>) -> f64 + Clone,
{
    fn grad(&self, x: &Array1<f64>) -> Array1<f64> {
        finite_difference_gradient(self, x, self.step)
    }
}
