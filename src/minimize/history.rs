use crate::error::MinimizerError;
use ndarray::prelude::*;

/// Fixed-capacity ring buffer of L-BFGS curvature pairs.
///
/// Rows of `s` and `y` and the two-loop coefficients are preallocated once
/// per solver call; pushing at capacity overwrites the oldest pair in place.
/// The returned search direction is the only allocation per iteration. Logical index `0` is the
/// oldest stored pair and `len - 1` the newest.
#[derive(Debug, Clone)]
pub struct CurvatureHistory {
    s: Array2<f64>,
    y: Array2<f64>,
    rho: Array1<f64>,
    alpha: Array1<f64>,
    head: usize,
    len: usize,
}

impl CurvatureHistory {
    /// Empty history holding at most `memory` pairs of length `dim`
    pub fn new(memory: usize, dim: usize) -> Result<Self, MinimizerError> {
        if memory == 0 {
            return Err(MinimizerError::InvalidParameters(
                "L-BFGS memory must be at least 1".to_string(),
            ));
        }
        Ok(CurvatureHistory {
            s: Array2::zeros((memory, dim)),
            y: Array2::zeros((memory, dim)),
            rho: Array1::zeros(memory),
            alpha: Array1::zeros(memory),
            head: 0,
            len: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.rho.len()
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    // Storage row of the i-th oldest pair
    fn slot(&self, i: usize) -> usize {
        (self.head + i) % self.capacity()
    }

    /// Append a pair with `y·s > 0`, evicting the oldest one when full
    pub fn push(&mut self, s: &Array1<f64>, y: &Array1<f64>) {
        let idx = if self.len < self.capacity() {
            self.len += 1;
            self.slot(self.len - 1)
        } else {
            let oldest = self.head;
            self.head = (self.head + 1) % self.capacity();
            oldest
        };

        self.s.row_mut(idx).assign(s);
        self.y.row_mut(idx).assign(y);
        self.rho[idx] = 1.0 / y.dot(s);
    }

    /// Stored pairs as owned vectors, oldest first
    pub fn pairs(&self) -> (Vec<Array1<f64>>, Vec<Array1<f64>>) {
        (0..self.len)
            .map(|i| {
                let k = self.slot(i);
                (self.s.row(k).to_owned(), self.y.row(k).to_owned())
            })
            .unzip()
    }

    /// Search direction `-H·g` from the two-loop recursion.
    ///
    /// The initial scaling `γ = s·y / y·y` comes from the newest pair, or is
    /// one for an empty history.
    pub fn two_loop(&mut self, g: &Array1<f64>) -> Array1<f64> {
        let mut q = g.clone();

        for i in (0..self.len).rev() {
            let k = self.slot(i);
            let a = self.rho[k] * self.s.row(k).dot(&q);
            self.alpha[i] = a;
            q.scaled_add(-a, &self.y.row(k));
        }

        let gamma = if self.is_empty() {
            1.0
        } else {
            let k = self.slot(self.len - 1);
            let (s, y) = (self.s.row(k), self.y.row(k));
            s.dot(&y) / y.dot(&y)
        };
        q *= gamma;

        for i in 0..self.len {
            let k = self.slot(i);
            let beta = self.rho[k] * self.y.row(k).dot(&q);
            q.scaled_add(self.alpha[i] - beta, &self.s.row(k));
        }

        q.mapv_inplace(|v| -v);
        q
    }
}

#[cfg(test)]
mod minimize_history_tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn test_zero_memory_rejected() {
        assert!(matches!(
            CurvatureHistory::new(0, 3),
            Err(MinimizerError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_empty_history_gives_steepest_descent() {
        let mut hist = CurvatureHistory::new(5, 3).unwrap();
        let g = array![1.0, -2.0, 0.5];
        assert_eq!(hist.two_loop(&g), array![-1.0, 2.0, -0.5]);
    }

    #[test]
    fn test_eviction_keeps_newest_pairs() {
        let mut hist = CurvatureHistory::new(2, 1).unwrap();
        for k in 1..=3 {
            let v = array![k as f64];
            hist.push(&v, &v);
        }
        assert_eq!(hist.len(), 2);
        let (s, _) = hist.pairs();
        assert_eq!(s, vec![array![2.0], array![3.0]]);

        hist.clear();
        assert!(hist.is_empty());
        assert_eq!(hist.capacity(), 2);
    }

    #[test]
    fn test_secant_equation_for_newest_pair() {
        let mut hist = CurvatureHistory::new(3, 2).unwrap();
        hist.push(&array![1.0, 0.0], &array![3.0, 0.5]);
        hist.push(&array![0.5, 1.0], &array![2.0, 1.5]);
        hist.push(&array![-0.2, 0.4], &array![0.1, 0.9]);

        // H y_newest = s_newest, so the direction for g = y is -s
        let p = hist.two_loop(&array![0.1, 0.9]);
        assert_abs_diff_eq!(p[0], 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1], -0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_reused_buffer_after_clear() {
        let mut reused = CurvatureHistory::new(3, 2).unwrap();
        reused.push(&array![1.0, 0.0], &array![3.0, 0.5]);
        reused.push(&array![0.5, 1.0], &array![2.0, 1.5]);
        reused.push(&array![-0.2, 0.4], &array![0.1, 0.9]);
        let g = array![0.3, -0.8];
        let _ = reused.two_loop(&g);

        reused.clear();
        reused.push(&array![0.5, 1.0], &array![2.0, 1.5]);
        let mut fresh = CurvatureHistory::new(3, 2).unwrap();
        fresh.push(&array![0.5, 1.0], &array![2.0, 1.5]);

        assert_eq!(reused.two_loop(&g), fresh.two_loop(&g));
        assert_eq!(reused.two_loop(&g), reused.two_loop(&g));
    }

    #[test]
    fn test_two_loop_matches_explicit_update() {
        let pairs = [
            (array![1.0, 0.5], array![2.0, 0.75]),
            (array![-0.3, 0.8], array![-0.5, 1.1]),
        ];
        let mut hist = CurvatureHistory::new(4, 2).unwrap();
        for (s, y) in pairs.iter() {
            hist.push(s, y);
        }

        let (s_new, y_new) = &pairs[1];
        let gamma = s_new.dot(y_new) / y_new.dot(y_new);
        let eye = Array2::<f64>::eye(2);
        let mut h = &eye * gamma;
        for (s, y) in pairs.iter() {
            let rho = 1.0 / y.dot(s);
            let s_col = s.view().insert_axis(Axis(1));
            let y_row = y.view().insert_axis(Axis(0));
            let left = &eye - &(s_col.dot(&y_row) * rho);
            let ss = s_col.dot(&s.view().insert_axis(Axis(0))) * rho;
            h = left.dot(&h).dot(&left.t()) + ss;
        }

        let g = array![0.7, -1.3];
        let expected = -h.dot(&g);
        let p = hist.two_loop(&g);
        assert_abs_diff_eq!(p[0], expected[0], epsilon = 1e-12);
        assert_abs_diff_eq!(p[1], expected[1], epsilon = 1e-12);
    }

    proptest! {
        #[test]
        fn prop_ring_buffer_keeps_newest_in_order(
            memory in 1usize..6,
            values in prop::collection::vec(0.1f64..10.0, 0..20),
        ) {
            let mut hist = CurvatureHistory::new(memory, 1).unwrap();
            for v in values.iter() {
                hist.push(&array![*v], &array![1.0]);
                prop_assert!(hist.len() <= memory);
            }

            let keep = values.len().min(memory);
            let expected: Vec<Array1<f64>> = values[values.len() - keep..]
                .iter()
                .map(|v| array![*v])
                .collect();
            let (s, y) = hist.pairs();
            prop_assert_eq!(s, expected);
            prop_assert_eq!(y.len(), keep);
        }
    }
}
