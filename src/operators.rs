//! Discrete wave operators on the uniform grid.
//!
//! All operators act on fields flattened in the grid's node order and are
//! assembled once per run as CSR matrices. With `rx = τ/hx`, `ry = τ/hy`
//! and `Δ_h` the 5-point Laplacian, the explicit central-difference scheme
//! is `u_{n+1} = A·u_n − u_{n−1} + τ²f`, and the implicit θ-scheme solves
//! `A0·u_{n+1} = A1·u_n + A2·u_{n−1} + τ²f`.

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::grid::UniformGrid;

/// Assemble the 5-point stencil matrix with the given diagonal coefficient
/// and coupling coefficients toward existing x- and y-neighbours.
fn stencil_matrix(grid: &UniformGrid, diag: f64, cx: f64, cy: f64) -> CsrMatrix<f64> {
    let n = grid.node_count();
    let mut coo = CooMatrix::new(n, n);
    for i in 0..=grid.nx {
        for j in 0..=grid.ny {
            let k = grid.node_index(i, j);
            coo.push(k, k, diag);
            if cx != 0.0 {
                if i > 0 {
                    coo.push(k, grid.node_index(i - 1, j), cx);
                }
                if i < grid.nx {
                    coo.push(k, grid.node_index(i + 1, j), cx);
                }
            }
            if cy != 0.0 {
                if j > 0 {
                    coo.push(k, grid.node_index(i, j - 1), cy);
                }
                if j < grid.ny {
                    coo.push(k, grid.node_index(i, j + 1), cy);
                }
            }
        }
    }
    CsrMatrix::from(&coo)
}

/// Discrete operator of the explicit scheme, `A = 2I + τ²Δ_h`.
pub fn wave_operator_explicit(grid: &UniformGrid, tau: f64) -> CsrMatrix<f64> {
    let rx2 = (tau / grid.hx).powi(2);
    let ry2 = (tau / grid.hy).powi(2);
    stencil_matrix(grid, 2.0 * (1.0 - rx2 - ry2), rx2, ry2)
}

/// Operator triple of the implicit θ-scheme.
///
/// `A0 = I − θτ²Δ_h` is symmetric positive definite for θ ≥ 0 and is the
/// matrix solved each step; `A1` and `A2` contribute the right-hand side.
/// θ = 0 degenerates to the explicit recurrence (`A0 = I`), θ = 1/4 is
/// unconditionally stable.
pub struct ImplicitOperators {
    pub a0: CsrMatrix<f64>,
    pub a1: CsrMatrix<f64>,
    pub a2: CsrMatrix<f64>,
    /// `A0` with Dirichlet rows/columns eliminated; the system actually
    /// handed to the linear solver.
    pub a0_constrained: CsrMatrix<f64>,
}

pub fn wave_operator_implicit(grid: &UniformGrid, tau: f64, theta: f64) -> ImplicitOperators {
    assert!(theta >= 0.0, "theta must be non-negative");
    let rx2 = (tau / grid.hx).powi(2);
    let ry2 = (tau / grid.hy).powi(2);

    let a0 = stencil_matrix(
        grid,
        1.0 + 2.0 * theta * (rx2 + ry2),
        -theta * rx2,
        -theta * ry2,
    );
    let a1 = stencil_matrix(
        grid,
        2.0 - 2.0 * (1.0 - 2.0 * theta) * (rx2 + ry2),
        (1.0 - 2.0 * theta) * rx2,
        (1.0 - 2.0 * theta) * ry2,
    );
    // A2 = -A0.
    let a2 = stencil_matrix(
        grid,
        -(1.0 + 2.0 * theta * (rx2 + ry2)),
        theta * rx2,
        theta * ry2,
    );
    let a0_constrained = constrain_dirichlet(&a0, &grid.boundary_mask());

    ImplicitOperators { a0, a1, a2, a0_constrained }
}

/// Symmetric Dirichlet elimination: drop every entry in a boundary row or
/// boundary column and put a unit diagonal on the boundary nodes. The
/// result stays symmetric positive definite.
pub fn constrain_dirichlet(a: &CsrMatrix<f64>, mask: &[bool]) -> CsrMatrix<f64> {
    assert_eq!(a.nrows(), mask.len());
    let mut coo = CooMatrix::new(a.nrows(), a.ncols());
    for (r, c, &v) in a.triplet_iter() {
        if !mask[r] && !mask[c] {
            coo.push(r, c, v);
        }
    }
    for (k, &bd) in mask.iter().enumerate() {
        if bd {
            coo.push(k, k, 1.0);
        }
    }
    CsrMatrix::from(&coo)
}

/// Substitute prescribed boundary values into the right-hand side of the
/// constrained system `A0_c · x = f`.
///
/// `values` holds the Dirichlet value at boundary nodes and zero elsewhere.
/// Interior rows lose the contribution of the eliminated boundary columns,
/// boundary rows pin the prescribed value, so the solve reproduces it
/// exactly.
pub fn apply_dirichlet_rhs(
    a0: &CsrMatrix<f64>,
    mask: &[bool],
    values: &DVector<f64>,
    rhs: &mut DVector<f64>,
) {
    assert_eq!(rhs.len(), values.len());
    let lift = a0 * values;
    *rhs -= lift;
    for (k, &bd) in mask.iter().enumerate() {
        if bd {
            rhs[k] = values[k];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    fn dense(a: &CsrMatrix<f64>) -> DMatrix<f64> {
        let mut m = DMatrix::zeros(a.nrows(), a.ncols());
        for (r, c, &v) in a.triplet_iter() {
            m[(r, c)] += v;
        }
        m
    }

    fn test_grid() -> UniformGrid {
        UniformGrid::from_domain([0.0, 1.0, 0.0, 1.0], 4, 4)
    }

    #[test]
    fn explicit_operator_rows_sum_to_two_inside() {
        let grid = test_grid();
        let a = wave_operator_explicit(&grid, 0.1);
        let ones = DVector::from_element(grid.node_count(), 1.0);
        let row_sums = &a * &ones;
        for i in 1..grid.nx {
            for j in 1..grid.ny {
                let k = grid.node_index(i, j);
                assert!((row_sums[k] - 2.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn explicit_operator_matches_direct_stencil() {
        let grid = test_grid();
        let tau = 0.07;
        let rx2 = (tau / grid.hx).powi(2);
        let ry2 = (tau / grid.hy).powi(2);
        let field = grid.interpolate(|p| (3.0 * p[0]).sin() + p[1] * p[1]);
        let u = DVector::from_iterator(grid.node_count(), field.iter().cloned());

        let au = &wave_operator_explicit(&grid, tau) * &u;
        for i in 1..grid.nx {
            for j in 1..grid.ny {
                let expect = 2.0 * (1.0 - rx2 - ry2) * field[[i, j]]
                    + rx2 * (field[[i - 1, j]] + field[[i + 1, j]])
                    + ry2 * (field[[i, j - 1]] + field[[i, j + 1]]);
                assert!((au[grid.node_index(i, j)] - expect).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn operators_are_symmetric() {
        let grid = test_grid();
        let ops = wave_operator_implicit(&grid, 0.05, 0.25);
        for a in [
            &wave_operator_explicit(&grid, 0.05),
            &ops.a0,
            &ops.a1,
            &ops.a0_constrained,
        ] {
            let d = dense(a);
            assert!((&d - d.transpose()).abs().max() < 1e-14);
        }
    }

    #[test]
    fn theta_zero_gives_identity_lhs() {
        let grid = test_grid();
        let ops = wave_operator_implicit(&grid, 0.1, 0.0);
        let d = dense(&ops.a0);
        assert!((&d - DMatrix::identity(d.nrows(), d.ncols())).abs().max() < 1e-14);
    }

    #[test]
    fn implicit_triple_is_consistent() {
        // A2 = -A0, and A0 + A1 + A2 applied to anything equals A1.
        let grid = test_grid();
        let ops = wave_operator_implicit(&grid, 0.08, 0.25);
        let d0 = dense(&ops.a0);
        let d2 = dense(&ops.a2);
        assert!((&d0 + &d2).abs().max() < 1e-14);
        // Interior row sums: A0 -> 1, A1 -> 2 (scheme reproduces constants).
        let ones = DVector::from_element(grid.node_count(), 1.0);
        let s0 = &ops.a0 * &ones;
        let s1 = &ops.a1 * &ones;
        for i in 1..grid.nx {
            for j in 1..grid.ny {
                let k = grid.node_index(i, j);
                assert!((s0[k] - 1.0).abs() < 1e-12);
                assert!((s1[k] - 2.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn constrained_system_pins_boundary_values() {
        let grid = test_grid();
        let mask = grid.boundary_mask();
        let ops = wave_operator_implicit(&grid, 0.05, 0.25);

        let d = dense(&ops.a0_constrained);
        for (k, &bd) in mask.iter().enumerate() {
            if bd {
                for c in 0..d.ncols() {
                    let expect = if c == k { 1.0 } else { 0.0 };
                    assert!((d[(k, c)] - expect).abs() < 1e-14);
                }
            }
        }

        // RHS substitution pins boundary rows to the prescribed values.
        let mut values = DVector::zeros(grid.node_count());
        for (k, &bd) in mask.iter().enumerate() {
            if bd {
                values[k] = 3.5;
            }
        }
        let mut rhs = DVector::from_element(grid.node_count(), 1.0);
        apply_dirichlet_rhs(&ops.a0, &mask, &values, &mut rhs);
        for (k, &bd) in mask.iter().enumerate() {
            if bd {
                assert!((rhs[k] - 3.5).abs() < 1e-14);
            }
        }
    }
}
