//! Time-stepping driver for the membrane wave equation.
//!
//! The driver is a state machine over the step index: step 0 returns the
//! interpolated initial displacement, step 1 applies a Taylor-expansion
//! bootstrap (no previous-previous state exists yet), and every later step
//! runs the steady recurrence of the configured scheme. Two displacement
//! fields persist across steps; the initial-velocity field is consumed by
//! the bootstrap.

use nalgebra::DVector;
use ndarray::Array2;
use thiserror::Error;

use crate::grid::UniformGrid;
use crate::operators::{
    apply_dirichlet_rhs, wave_operator_explicit, wave_operator_implicit, ImplicitOperators,
};
use crate::problem::ProblemData;
use crate::solver::{conjugate_gradient, SolverError, SolverOptions};
use nalgebra_sparse::CsrMatrix;

/// Time-integration scheme for the steady steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scheme {
    /// Central-difference recurrence, stable for rx² + ry² ≤ 1.
    Explicit,
    /// θ-scheme linear system per step; unconditionally stable for θ ≥ 1/4.
    Implicit { theta: f64 },
}

/// Fixed parameters of a simulation run.
#[derive(Debug, Clone, Copy)]
pub struct SimulationParams {
    pub tau: f64,   // Time step size
    pub nt: usize,  // Number of time steps (nt + 1 frames including t0)
    pub scheme: Scheme,
    pub solver: SolverOptions,
}

/// Error produced while advancing the simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// The implicit linear solve failed; the run cannot continue.
    #[error("linear solve failed at step {step}: {source}")]
    Solve {
        /// Step index at which the solve failed.
        step: usize,
        #[source]
        source: SolverError,
    },
}

enum SchemeOperators {
    Explicit(CsrMatrix<f64>),
    Implicit(ImplicitOperators),
}

/// Simulation state: grid, problem data, precomputed operators and the
/// persistent displacement history.
///
/// All state lives here and is advanced by [`Simulation::advance`]; there is
/// no hidden shared state and no dependence on anything but the call count.
pub struct Simulation<P: ProblemData> {
    grid: UniformGrid,
    problem: P,
    params: SimulationParams,
    operators: SchemeOperators,
    boundary: Vec<bool>,
    u_prev: Array2<f64>,
    u_curr: Array2<f64>,
    v0: Array2<f64>,
    step_index: usize,
    t0: f64,
}

impl<P: ProblemData> Simulation<P> {
    /// Set up a run: interpolate the initial data onto the grid and build
    /// the discrete operators for the chosen scheme once.
    pub fn new(grid: UniformGrid, problem: P, params: SimulationParams) -> Self {
        let u_prev = grid.interpolate(|p| problem.initial_displacement(p));
        let v0 = grid.interpolate(|p| problem.initial_velocity(p));
        let u_curr = Array2::zeros(grid.shape());

        let operators = match params.scheme {
            Scheme::Explicit => {
                SchemeOperators::Explicit(wave_operator_explicit(&grid, params.tau))
            }
            Scheme::Implicit { theta } => {
                SchemeOperators::Implicit(wave_operator_implicit(&grid, params.tau, theta))
            }
        };

        let t0 = problem.duration()[0];
        let sim = Self {
            boundary: grid.boundary_mask(),
            grid,
            problem,
            params,
            operators,
            u_prev,
            u_curr,
            v0,
            step_index: 0,
            t0,
        };

        if params.scheme == Scheme::Explicit && !sim.satisfies_cfl() {
            eprintln!(
                "Warning: explicit scheme violates the stability bound (rx² + ry² = {:.3} > 1); \
                 the solution will grow without bound",
                sim.cfl_number()
            );
        }

        sim
    }

    pub fn grid(&self) -> &UniformGrid {
        &self.grid
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Index of the next step [`advance`](Self::advance) will produce.
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    /// Timestamp of the most recently produced step.
    pub fn current_time(&self) -> f64 {
        self.t0 + self.step_index.saturating_sub(1) as f64 * self.params.tau
    }

    /// Whether all `nt + 1` frames have been produced.
    pub fn is_finished(&self) -> bool {
        self.step_index > self.params.nt
    }

    /// rx² + ry², the quantity bounded by 1 in the explicit stability
    /// condition.
    pub fn cfl_number(&self) -> f64 {
        let rx = self.params.tau / self.grid.hx;
        let ry = self.params.tau / self.grid.hy;
        rx * rx + ry * ry
    }

    pub fn satisfies_cfl(&self) -> bool {
        self.cfl_number() <= 1.0
    }

    /// Produce the solution field for the next step index, together with
    /// its timestamp.
    ///
    /// Fails only when the implicit linear solve does; the error is fatal
    /// and the simulation must not be advanced further.
    pub fn advance(&mut self) -> Result<(&Array2<f64>, f64), SimulationError> {
        let n = self.step_index;
        let t = self.t0 + n as f64 * self.params.tau;
        match n {
            0 => {}
            1 => self.bootstrap(t),
            _ => match self.params.scheme {
                Scheme::Explicit => self.step_explicit(t),
                Scheme::Implicit { .. } => self
                    .step_implicit(t)
                    .map_err(|source| SimulationError::Solve { step: n, source })?,
            },
        }
        self.step_index = n + 1;
        let field = if n == 0 { &self.u_prev } else { &self.u_curr };
        Ok((field, t))
    }

    /// First update: second-order Taylor expansion around t0 using the
    /// initial velocity, since no previous-previous state exists yet.
    fn bootstrap(&mut self, t: f64) {
        let tau = self.params.tau;
        let rx2 = (tau / self.grid.hx).powi(2);
        let ry2 = (tau / self.grid.hy).powi(2);
        for i in 1..self.grid.nx {
            for j in 1..self.grid.ny {
                self.u_curr[[i, j]] = 0.5 * rx2 * (self.u_prev[[i - 1, j]] + self.u_prev[[i + 1, j]])
                    + 0.5 * ry2 * (self.u_prev[[i, j - 1]] + self.u_prev[[i, j + 1]])
                    + (1.0 - rx2 - ry2) * self.u_prev[[i, j]]
                    + tau * self.v0[[i, j]];
            }
        }
        let problem = &self.problem;
        self.grid
            .update_dirichlet_bc(|p| problem.dirichlet(p, t), &mut self.u_curr);
    }

    /// Steady explicit step: u_next = A·u_curr − u_prev + τ²·f, then the
    /// boundary overwrite at the new time.
    fn step_explicit(&mut self, t: f64) {
        let a = match &self.operators {
            SchemeOperators::Explicit(a) => a,
            SchemeOperators::Implicit(_) => unreachable!("scheme and operators always agree"),
        };
        let tau = self.params.tau;
        let problem = &self.problem;

        let u1 = flatten(&self.u_curr);
        let u0 = flatten(&self.u_prev);
        let f = flatten(&self.grid.interpolate(|p| problem.source(p, t)));
        let next = a * &u1 - u0 + f * (tau * tau);

        self.u_prev.assign(&self.u_curr);
        self.u_curr = reshape(next, self.grid.shape());
        self.grid
            .update_dirichlet_bc(|p| problem.dirichlet(p, t), &mut self.u_curr);
    }

    /// Steady implicit step: assemble the right-hand side, substitute the
    /// Dirichlet values and solve the constrained system. The elimination
    /// already enforces the boundary, so no overwrite follows.
    fn step_implicit(&mut self, t: f64) -> Result<(), SolverError> {
        let ops = match &self.operators {
            SchemeOperators::Implicit(ops) => ops,
            SchemeOperators::Explicit(_) => unreachable!("scheme and operators always agree"),
        };
        let tau = self.params.tau;
        let problem = &self.problem;

        let u1 = flatten(&self.u_curr);
        let u0 = flatten(&self.u_prev);
        let f = flatten(&self.grid.interpolate(|p| problem.source(p, t)));
        let mut rhs = f * (tau * tau);
        rhs += &ops.a1 * &u1;
        rhs += &ops.a2 * &u0;

        self.u_prev.assign(&self.u_curr);

        let mut values = DVector::zeros(self.grid.node_count());
        for i in 0..=self.grid.nx {
            for j in 0..=self.grid.ny {
                if self.grid.is_boundary(i, j) {
                    values[self.grid.node_index(i, j)] =
                        problem.dirichlet(self.grid.node_point(i, j), t);
                }
            }
        }
        apply_dirichlet_rhs(&ops.a0, &self.boundary, &values, &mut rhs);

        let x = conjugate_gradient(&ops.a0_constrained, &rhs, self.params.solver)?;
        self.u_curr = reshape(x, self.grid.shape());
        Ok(())
    }

    /// Discrete energy of the current history pair,
    /// `E = hx·hy·( ‖u_curr − u_prev‖² / 2τ² + ½·u_curr·L·u_prev )`
    /// with `L` the zero-Dirichlet 5-point Laplacian. For the explicit
    /// scheme with zero source and boundary data this is conserved from the
    /// first steady pair onward, and it stays bounded exactly when the
    /// stability bound holds.
    pub fn discrete_energy(&self) -> f64 {
        let tau = self.params.tau;
        let (hx, hy) = (self.grid.hx, self.grid.hy);

        let mut kinetic = 0.0;
        for (a, b) in self.u_curr.iter().zip(self.u_prev.iter()) {
            let d = (a - b) / tau;
            kinetic += d * d;
        }

        let mut cross = 0.0;
        for i in 1..self.grid.nx {
            for j in 1..self.grid.ny {
                let lap = (2.0 * self.u_prev[[i, j]]
                    - self.u_prev[[i - 1, j]]
                    - self.u_prev[[i + 1, j]])
                    / (hx * hx)
                    + (2.0 * self.u_prev[[i, j]]
                        - self.u_prev[[i, j - 1]]
                        - self.u_prev[[i, j + 1]])
                        / (hy * hy);
                cross += self.u_curr[[i, j]] * lap;
            }
        }

        0.5 * hx * hy * (kinetic + cross)
    }

    /// Run all remaining steps without rendering, printing progress the
    /// whole way.
    pub fn run(&mut self) -> Result<(), SimulationError> {
        println!("Starting simulation...");
        println!(
            "Grid: {}x{} nodes, spacing ({:.4}, {:.4})",
            self.grid.nx + 1,
            self.grid.ny + 1,
            self.grid.hx,
            self.grid.hy
        );
        println!("Time step: {:.6}", self.params.tau);
        println!("Number of steps: {}", self.params.nt);

        while !self.is_finished() {
            let (_, t) = self.advance()?;
            if self.step_index % 100 == 0 {
                println!("Step {}/{} (t={:.4})", self.step_index - 1, self.params.nt, t);
            }
        }

        println!("Simulation complete!");
        Ok(())
    }
}

fn flatten(field: &Array2<f64>) -> DVector<f64> {
    DVector::from_iterator(field.len(), field.iter().cloned())
}

fn reshape(v: DVector<f64>, shape: (usize, usize)) -> Array2<f64> {
    Array2::from_shape_vec(shape, v.as_slice().to_vec())
        .expect("flattened field has one entry per node")
}
