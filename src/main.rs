use anyhow::anyhow;
use membrane_wave::config::Config;
use membrane_wave::grid::UniformGrid;
use membrane_wave::problem::{MembraneOscillation, ProblemData};
use membrane_wave::simulation::{Simulation, SimulationParams};
use membrane_wave::visualisation::SurfaceAnimator;

fn main() -> anyhow::Result<()> {
    // Built-in defaults reproduce the membrane demonstration: unit square,
    // 100x100 cells, 1000 steps over [0, 5], explicit scheme. A TOML file
    // given as the sole argument overrides them.
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)?,
        None => Config::default(),
    };
    config.print_summary();

    let problem = MembraneOscillation::new(
        config.domain.extents(),
        [config.time.start, config.time.end],
    );
    let grid = UniformGrid::from_domain(problem.domain(), config.grid.nx, config.grid.ny);
    let params = SimulationParams {
        tau: config.time.tau(),
        nt: config.time.steps,
        scheme: config.scheme(),
        solver: config.solver_options(),
    };
    let mut sim = Simulation::new(grid, problem, params);

    let viz = &config.visualization;
    let animator = SurfaceAnimator::new(
        &viz.output,
        viz.width,
        viz.height,
        viz.frame_delay_ms,
        (viz.z_range[0], viz.z_range[1]),
    );
    animator
        .animate(&mut sim, config.time.steps + 1)
        .map_err(|e| anyhow!("rendering failed: {e}"))?;

    Ok(())
}
