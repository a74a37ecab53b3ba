//! Sparse linear solve for the implicit scheme.

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use thiserror::Error;

/// Error returned when the linear solve fails. Either variant aborts the
/// simulation; there is no retry or fallback.
#[derive(Debug, Error, PartialEq)]
pub enum SolverError {
    /// Returned when the iteration breaks down; the system is singular or
    /// not positive definite.
    #[error("conjugate gradient breakdown; system is singular or not positive definite")]
    Breakdown,
    /// Returned when the residual target is not reached.
    #[error("conjugate gradient did not converge in {iterations} iterations (residual {residual:.3e})")]
    NonConvergence {
        /// Iterations performed before giving up.
        iterations: usize,
        /// Euclidean norm of the final residual.
        residual: f64,
    },
}

/// Iteration limits for the conjugate gradient solve.
#[derive(Debug, Clone, Copy)]
pub struct SolverOptions {
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iter: 10_000,
            tolerance: 1e-10,
        }
    }
}

/// Solve `A x = b` for a symmetric positive definite CSR matrix by the
/// conjugate gradient method.
///
/// Convergence is declared when the residual norm drops below
/// `tolerance * max(‖b‖, 1)`.
pub fn conjugate_gradient(
    a: &CsrMatrix<f64>,
    b: &DVector<f64>,
    opts: SolverOptions,
) -> Result<DVector<f64>, SolverError> {
    assert_eq!(a.nrows(), a.ncols(), "matrix must be square");
    assert_eq!(a.nrows(), b.len(), "matrix and right-hand side disagree");

    let target = opts.tolerance * b.norm().max(1.0);

    let mut x = DVector::zeros(b.len());
    let mut r = b.clone();
    let mut rs_old = r.dot(&r);
    if rs_old.sqrt() <= target {
        return Ok(x);
    }
    let mut p = r.clone();

    for _ in 0..opts.max_iter {
        let ap = a * &p;
        let denom = p.dot(&ap);
        if denom <= 0.0 || !denom.is_finite() {
            return Err(SolverError::Breakdown);
        }
        let alpha = rs_old / denom;
        x.axpy(alpha, &p, 1.0);
        r.axpy(-alpha, &ap, 1.0);

        let rs_new = r.dot(&r);
        if rs_new.sqrt() <= target {
            return Ok(x);
        }
        p = &r + &p * (rs_new / rs_old);
        rs_old = rs_new;
    }

    Err(SolverError::NonConvergence {
        iterations: opts.max_iter,
        residual: rs_old.sqrt(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::CooMatrix;

    fn csr_from_triplets(n: usize, entries: &[(usize, usize, f64)]) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(n, n);
        for &(r, c, v) in entries {
            coo.push(r, c, v);
        }
        CsrMatrix::from(&coo)
    }

    #[test]
    fn solves_small_spd_system() {
        // 1D Dirichlet Laplacian, solution known in closed form.
        let a = csr_from_triplets(
            3,
            &[
                (0, 0, 2.0),
                (0, 1, -1.0),
                (1, 0, -1.0),
                (1, 1, 2.0),
                (1, 2, -1.0),
                (2, 1, -1.0),
                (2, 2, 2.0),
            ],
        );
        let b = DVector::from_vec(vec![1.0, 0.0, 1.0]);
        let x = conjugate_gradient(&a, &b, SolverOptions::default()).unwrap();
        let expect = [1.0, 1.0, 1.0];
        for (xi, ei) in x.iter().zip(expect) {
            assert!((xi - ei).abs() < 1e-8);
        }
    }

    #[test]
    fn identity_converges_immediately() {
        let a = csr_from_triplets(4, &[(0, 0, 1.0), (1, 1, 1.0), (2, 2, 1.0), (3, 3, 1.0)]);
        let b = DVector::from_vec(vec![3.0, -1.0, 0.5, 2.0]);
        let x = conjugate_gradient(&a, &b, SolverOptions::default()).unwrap();
        assert!((&x - &b).norm() < 1e-12);
    }

    #[test]
    fn singular_system_breaks_down() {
        let a = csr_from_triplets(2, &[(0, 0, 0.0), (1, 1, 0.0)]);
        let b = DVector::from_vec(vec![1.0, 1.0]);
        assert_eq!(
            conjugate_gradient(&a, &b, SolverOptions::default()),
            Err(SolverError::Breakdown)
        );
    }

    #[test]
    fn iteration_cap_is_reported() {
        let a = csr_from_triplets(
            2,
            &[(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)],
        );
        let b = DVector::from_vec(vec![1.0, 2.0]);
        let opts = SolverOptions {
            max_iter: 1,
            tolerance: 1e-14,
        };
        match conjugate_gradient(&a, &b, opts) {
            Err(SolverError::NonConvergence { iterations, .. }) => assert_eq!(iterations, 1),
            other => panic!("expected non-convergence, got {other:?}"),
        }
    }
}
