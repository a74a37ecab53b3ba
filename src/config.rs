use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::simulation::Scheme;
use crate::solver::SolverOptions;

/// Spatial domain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    pub x: [f64; 2],
    pub y: [f64; 2],
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            x: [0.0, 1.0],
            y: [0.0, 1.0],
        }
    }
}

impl DomainConfig {
    fn validate(&self) -> Result<()> {
        if self.x[1] <= self.x[0] || self.y[1] <= self.y[0] {
            return Err(anyhow!(
                "domain extents must be increasing (x={:?}, y={:?})",
                self.x,
                self.y
            ));
        }
        Ok(())
    }

    /// Extents as `[x0, x1, y0, y1]`.
    pub fn extents(&self) -> [f64; 4] {
        [self.x[0], self.x[1], self.y[0], self.y[1]]
    }
}

/// Grid resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub nx: usize,
    pub ny: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { nx: 100, ny: 100 }
    }
}

impl GridConfig {
    fn validate(&self) -> Result<()> {
        if self.nx == 0 || self.ny == 0 {
            return Err(anyhow!(
                "grid resolution must be positive (nx={}, ny={})",
                self.nx,
                self.ny
            ));
        }
        Ok(())
    }
}

/// Time discretisation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    pub start: f64,
    pub end: f64,
    pub steps: usize,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: 5.0,
            steps: 1000,
        }
    }
}

impl TimeConfig {
    fn validate(&self) -> Result<()> {
        if self.end <= self.start {
            return Err(anyhow!(
                "time interval must be increasing (start={}, end={})",
                self.start,
                self.end
            ));
        }
        if self.steps == 0 {
            return Err(anyhow!("steps must be positive"));
        }
        Ok(())
    }

    /// Time step size.
    pub fn tau(&self) -> f64 {
        (self.end - self.start) / self.steps as f64
    }
}

/// Which steady-state recurrence to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeKind {
    Explicit,
    Implicit,
}

/// Time-integration scheme configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemeConfig {
    pub kind: SchemeKind,
    #[serde(default = "default_theta")]
    pub theta: f64,
}

fn default_theta() -> f64 {
    0.25
}

impl Default for SchemeConfig {
    fn default() -> Self {
        Self {
            kind: SchemeKind::Explicit,
            theta: default_theta(),
        }
    }
}

impl SchemeConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..=0.5).contains(&self.theta) {
            return Err(anyhow!("theta must be in [0, 0.5], got {}", self.theta));
        }
        Ok(())
    }
}

/// Linear solver configuration (implicit scheme only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_max_iter() -> usize {
    10_000
}

fn default_tolerance() -> f64 {
    1e-10
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iter: default_max_iter(),
            tolerance: default_tolerance(),
        }
    }
}

impl SolverConfig {
    fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(anyhow!("solver max_iter must be positive"));
        }
        if self.tolerance <= 0.0 {
            return Err(anyhow!(
                "solver tolerance must be positive, got {}",
                self.tolerance
            ));
        }
        Ok(())
    }
}

/// Animation output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizationConfig {
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default = "default_image_width")]
    pub width: u32,
    #[serde(default = "default_image_height")]
    pub height: u32,
    #[serde(default = "default_frame_delay")]
    pub frame_delay_ms: u32,
    #[serde(default = "default_z_range")]
    pub z_range: [f64; 2],
}

fn default_output() -> String {
    "explicit.gif".to_string()
}

fn default_image_width() -> u32 {
    800
}

fn default_image_height() -> u32 {
    600
}

fn default_frame_delay() -> u32 {
    40
}

fn default_z_range() -> [f64; 2] {
    [-2.0, 2.0]
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            width: default_image_width(),
            height: default_image_height(),
            frame_delay_ms: default_frame_delay(),
            z_range: default_z_range(),
        }
    }
}

impl VisualizationConfig {
    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!(
                "image dimensions must be positive (width={}, height={})",
                self.width,
                self.height
            ));
        }
        if self.z_range[1] <= self.z_range[0] {
            return Err(anyhow!("z_range must be increasing, got {:?}", self.z_range));
        }
        Ok(())
    }
}

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub domain: DomainConfig,
    pub grid: GridConfig,
    pub time: TimeConfig,
    pub scheme: SchemeConfig,
    pub solver: SolverConfig,
    pub visualization: VisualizationConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read config file '{}': {}", path, e))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| anyhow!("failed to parse TOML config: {}", e))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<()> {
        self.domain.validate()?;
        self.grid.validate()?;
        self.time.validate()?;
        self.scheme.validate()?;
        self.solver.validate()?;
        self.visualization.validate()?;

        if self.time.tau() < 1e-9 {
            eprintln!(
                "Warning: time step is very small ({:.3e}), rendering will be slow",
                self.time.tau()
            );
        }

        Ok(())
    }

    /// The scheme the simulation should run.
    pub fn scheme(&self) -> Scheme {
        match self.scheme.kind {
            SchemeKind::Explicit => Scheme::Explicit,
            SchemeKind::Implicit => Scheme::Implicit {
                theta: self.scheme.theta,
            },
        }
    }

    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            max_iter: self.solver.max_iter,
            tolerance: self.solver.tolerance,
        }
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("=== Membrane Wave Configuration ===");
        println!(
            "Domain: [{}, {}] x [{}, {}]",
            self.domain.x[0], self.domain.x[1], self.domain.y[0], self.domain.y[1]
        );
        println!("Grid: {}x{} cells", self.grid.nx, self.grid.ny);
        println!(
            "Time: [{}, {}] in {} steps (tau={:.5})",
            self.time.start,
            self.time.end,
            self.time.steps,
            self.time.tau()
        );
        match self.scheme.kind {
            SchemeKind::Explicit => println!("Scheme: explicit"),
            SchemeKind::Implicit => println!("Scheme: implicit (theta={})", self.scheme.theta),
        }
        println!(
            "Output: {} ({}x{}, {} ms/frame, z in {:?})",
            self.visualization.output,
            self.visualization.width,
            self.visualization.height,
            self.visualization.frame_delay_ms,
            self.visualization.z_range
        );
        println!("===================================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_demonstration_setup() {
        let config = Config::default();
        assert_eq!(config.grid.nx, 100);
        assert_eq!(config.grid.ny, 100);
        assert_eq!(config.time.steps, 1000);
        assert!((config.time.tau() - 0.005).abs() < 1e-15);
        assert_eq!(config.scheme.kind, SchemeKind::Explicit);
        assert_eq!(config.visualization.z_range, [-2.0, 2.0]);
        config.validate().unwrap();
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [grid]
            nx = 8
            ny = 8

            [scheme]
            kind = "implicit"
            "#,
        )
        .unwrap();
        assert_eq!(config.grid.nx, 8);
        assert_eq!(config.scheme.kind, SchemeKind::Implicit);
        assert!((config.scheme.theta - 0.25).abs() < 1e-15);
        assert_eq!(config.time.steps, 1000);
        assert_eq!(config.scheme(), Scheme::Implicit { theta: 0.25 });
    }

    #[test]
    fn validation_rejects_bad_parameters() {
        let mut config = Config::default();
        config.time.end = config.time.start;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.grid.nx = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scheme.theta = 0.9;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.visualization.z_range = [2.0, -2.0];
        assert!(config.validate().is_err());
    }
}
