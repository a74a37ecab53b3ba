//! Animation rendering of the membrane surface.

use plotters::prelude::*;
use std::error::Error;

use crate::problem::ProblemData;
use crate::simulation::Simulation;

/// Renders the simulation as an animated 3D surface, one frame per step.
pub struct SurfaceAnimator {
    path: String,
    width: u32,
    height: u32,
    frame_delay_ms: u32,
    z_range: (f64, f64),
    // Store as a boxed trait object
    gradient: Box<dyn colorgrad::Gradient>,
}

impl SurfaceAnimator {
    pub fn new(
        path: &str,
        width: u32,
        height: u32,
        frame_delay_ms: u32,
        z_range: (f64, f64),
    ) -> Self {
        let gradient = Box::new(colorgrad::preset::rd_yl_bu());

        Self {
            path: path.to_string(),
            width,
            height,
            frame_delay_ms,
            z_range,
            gradient,
        }
    }

    /// Drive the simulation through `frames` steps in strictly increasing
    /// order, drawing each returned field as a surface over the domain.
    ///
    /// The output is a GIF animation at the configured size and frame
    /// delay.
    pub fn animate<P: ProblemData>(
        &self,
        sim: &mut Simulation<P>,
        frames: usize,
    ) -> Result<(), Box<dyn Error>> {
        let grid = *sim.grid();
        let x_min = grid.origin[0];
        let x_max = grid.origin[0] + grid.nx as f64 * grid.hx;
        let y_min = grid.origin[1];
        let y_max = grid.origin[1] + grid.ny as f64 * grid.hy;
        let (z_min, z_max) = self.z_range;

        let root = BitMapBackend::gif(&self.path, (self.width, self.height), self.frame_delay_ms)?
            .into_drawing_area();

        for frame in 0..frames {
            let (field, t) = sim.advance()?;

            root.fill(&WHITE)?;
            let caption = format!("membrane displacement at t={:.3} (frame {})", t, frame);
            let mut chart = ChartBuilder::on(&root)
                .caption(&caption, ("sans-serif", 30))
                .margin(10)
                .build_cartesian_3d(x_min..x_max, z_min..z_max, y_min..y_max)?;
            chart.with_projection(|mut pb| {
                pb.pitch = 0.4;
                pb.yaw = 0.7;
                pb.scale = 0.8;
                pb.into_matrix()
            });
            chart
                .configure_axes()
                .light_grid_style(BLACK.mix(0.15))
                .max_light_lines(3)
                .draw()?;

            chart.draw_series(
                SurfaceSeries::xoz(
                    (0..=grid.nx).map(|i| grid.node_point(i, 0)[0]),
                    (0..=grid.ny).map(|j| grid.node_point(0, j)[1]),
                    |x, y| {
                        let i = ((x - grid.origin[0]) / grid.hx).round() as usize;
                        let j = ((y - grid.origin[1]) / grid.hy).round() as usize;
                        field[[i, j]]
                    },
                )
                .style_func(&|&v| self.surface_color(v).filled()),
            )?;

            root.present()?;
            if frame % 100 == 0 {
                println!("Rendered frame {}/{}", frame, frames.saturating_sub(1));
            }
        }

        println!("Animation saved to {}", self.path);
        Ok(())
    }

    fn surface_color(&self, value: f64) -> RGBColor {
        let (z_min, z_max) = self.z_range;
        let normalized = if z_max > z_min {
            (value - z_min) / (z_max - z_min)
        } else {
            0.5
        };
        let color_rgba = self.gradient.at(normalized.clamp(0.0, 1.0) as f32).to_rgba8();
        RGBColor(color_rgba[0], color_rgba[1], color_rgba[2])
    }
}
