//! # Configuration System
//!
//! YAML configuration for a pipeline run:
//!
//! - Grid geometry (box side, cells per axis)
//! - Synthesis seed and Fourier symmetry treatment
//! - Bias coefficients, shot noise and mass-assignment scheme
//! - Estimator binning
//! - Which stages run and where files go
//! - Logging
//!
//! ## Configuration Search Path
//!
//! Configuration is loaded from the first file found:
//! 1. Path specified via `COSMOFIELD_CONFIG` environment variable
//! 2. `./cosmofield.yaml` (current directory)
//! 3. `~/.config/cosmofield/config.yaml` (user config)
//! 4. `/etc/cosmofield/config.yaml` (system config)
//!
//! ## Example Configuration
//!
//! ```yaml
//! grid:
//!   box_size: 500.0
//!   grid_size: 128
//!
//! synthesis:
//!   seed: 42
//!   symmetry: hermitian
//!
//! bias:
//!   b1: 1.5
//!   b2: 0.5
//!   bg2: -0.2
//!   nbar: 3.0e-4
//!   scheme: cic
//!
//! pipeline:
//!   input_dir: "output/lcdm"
//!   lognormal: true
//!   galaxy: true
//!   measure: true
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::bias::{BiasParameters, MassAssignment};
use crate::estimator::EstimatorConfig;
use crate::gaussian_field::FourierSymmetry;
use crate::observe::LogConfig;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "COSMOFIELD_CONFIG";

/// Error type for configuration operations.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file or referenced directory not found
    NotFound(String),
    /// Failed to read configuration file
    ReadError(String),
    /// Failed to parse configuration
    ParseError(String),
    /// Invalid configuration value
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(msg) => write!(f, "not found: {}", msg),
            ConfigError::ReadError(msg) => write!(f, "failed to read config: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Periodic box geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Box side length L in Mpc/h
    pub box_size: f64,
    /// Cells per axis N
    pub grid_size: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            box_size: 500.0,
            grid_size: 128,
        }
    }
}

/// Gaussian field synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Seed for the run's random source
    pub seed: u64,
    pub symmetry: FourierSymmetry,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            symmetry: FourierSymmetry::Hermitian,
        }
    }
}

/// Tracer bias expansion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiasConfig {
    pub b1: f64,
    pub b2: f64,
    pub bg2: f64,
    /// Tracer number density in (h/Mpc)³; no shot noise when absent
    pub nbar: Option<f64>,
    pub scheme: MassAssignment,
}

impl Default for BiasConfig {
    fn default() -> Self {
        let params = BiasParameters::default();
        Self {
            b1: params.b1,
            b2: params.b2,
            bg2: params.bg2,
            nbar: params.nbar,
            scheme: MassAssignment::NearestGridPoint,
        }
    }
}

impl BiasConfig {
    pub fn parameters(&self) -> BiasParameters {
        BiasParameters {
            b1: self.b1,
            b2: self.b2,
            bg2: self.bg2,
            nbar: self.nbar,
        }
    }
}

/// Stage selection and directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory of P(k) `.txt` tables
    pub input_dir: PathBuf,
    /// Root of the per-stage output directories; the parent of
    /// `input_dir` when absent
    pub output_dir: Option<PathBuf>,
    /// Write log-normal densities
    pub lognormal: bool,
    /// Write biased tracer fields
    pub galaxy: bool,
    /// Measure and write P(k) of every field produced
    pub measure: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("output/pk"),
            output_dir: None,
            lognormal: true,
            galaxy: true,
            measure: true,
        }
    }
}

impl PipelineConfig {
    /// Directory the stage subdirectories are created in.
    pub fn output_root(&self) -> PathBuf {
        if let Some(dir) = &self.output_dir {
            return dir.clone();
        }
        match self.input_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// Complete run configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CosmofieldConfig {
    pub grid: GridConfig,
    pub synthesis: SynthesisConfig,
    pub bias: BiasConfig,
    pub estimator: EstimatorConfig,
    pub pipeline: PipelineConfig,
    pub logging: LogConfig,
}

impl CosmofieldConfig {
    /// Load configuration from the default search path.
    ///
    /// Returns the defaults if no file is found. A path named by
    /// `COSMOFIELD_CONFIG` must exist.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(ConfigError::NotFound(format!(
                    "{} points to {}",
                    CONFIG_ENV,
                    path.display()
                )));
            }
            return Self::load_from(&path);
        }

        for path in Self::config_search_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load and validate a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))
    }

    /// Standard locations, in search order (the env var is checked first).
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./cosmofield.yaml")];

        if let Some(dirs) = directories::ProjectDirs::from("", "", "cosmofield") {
            paths.push(dirs.config_dir().join("config.yaml"));
        }

        paths.push(PathBuf::from("/etc/cosmofield/config.yaml"));
        paths
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.grid.box_size.is_finite() && self.grid.box_size > 0.0) {
            return Err(ConfigError::ValidationError("box_size must be positive".to_string()));
        }
        if self.grid.grid_size == 0 {
            return Err(ConfigError::ValidationError("grid_size must be > 0".to_string()));
        }
        if self.estimator.num_edges < 2 {
            return Err(ConfigError::ValidationError("num_edges must be at least 2".to_string()));
        }
        self.bias
            .parameters()
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        Ok(())
    }

    /// Documented example configuration as YAML.
    pub fn example_yaml() -> String {
        let config = Self {
            bias: BiasConfig {
                bg2: -0.2,
                nbar: Some(3e-4),
                scheme: MassAssignment::CloudInCell,
                ..Default::default()
            },
            pipeline: PipelineConfig {
                input_dir: PathBuf::from("output/lcdm"),
                ..Default::default()
            },
            ..Default::default()
        };

        serde_yaml::to_string(&config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::LogFormat;

    #[test]
    fn test_default_config() {
        let config = CosmofieldConfig::default();
        assert_eq!(config.grid.box_size, 500.0);
        assert_eq!(config.grid.grid_size, 128);
        assert_eq!(config.synthesis.seed, 42);
        assert_eq!(config.bias.b1, 1.5);
        assert_eq!(config.bias.b2, 0.5);
        assert_eq!(config.bias.scheme, MassAssignment::NearestGridPoint);
        assert_eq!(config.estimator.num_edges, 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
grid:
  box_size: 1000.0
  grid_size: 64

synthesis:
  seed: 7
  symmetry: truncate_imaginary

bias:
  b1: 2.0
  bg2: -0.3
  nbar: 1.0e-3
  scheme: tsc

estimator:
  num_edges: 10

pipeline:
  input_dir: "runs/lcdm"
  output_dir: "runs/out"
  lognormal: false

logging:
  level: debug
  format: json
"#;

        let config = CosmofieldConfig::parse(yaml).unwrap();
        assert_eq!(config.grid.box_size, 1000.0);
        assert_eq!(config.grid.grid_size, 64);
        assert_eq!(config.synthesis.seed, 7);
        assert_eq!(config.synthesis.symmetry, FourierSymmetry::TruncateImaginary);
        assert_eq!(config.bias.b1, 2.0);
        assert_eq!(config.bias.b2, 0.5);
        assert_eq!(config.bias.nbar, Some(1e-3));
        assert_eq!(config.bias.scheme, MassAssignment::TriangularShapedCloud);
        assert_eq!(config.estimator.num_edges, 10);
        assert_eq!(config.pipeline.output_root(), PathBuf::from("runs/out"));
        assert!(!config.pipeline.lognormal);
        assert!(config.pipeline.galaxy);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_output_root_defaults_to_parent() {
        let pipeline = PipelineConfig {
            input_dir: PathBuf::from("output/lcdm/pk"),
            ..Default::default()
        };
        assert_eq!(pipeline.output_root(), PathBuf::from("output/lcdm"));

        let bare = PipelineConfig {
            input_dir: PathBuf::from("tables"),
            ..Default::default()
        };
        assert_eq!(bare.output_root(), PathBuf::from("."));
    }

    #[test]
    fn test_validation() {
        let mut config = CosmofieldConfig::default();
        config.grid.box_size = 0.0;
        assert!(config.validate().is_err());

        let mut config = CosmofieldConfig::default();
        config.grid.grid_size = 0;
        assert!(config.validate().is_err());

        let mut config = CosmofieldConfig::default();
        config.estimator.num_edges = 1;
        assert!(config.validate().is_err());

        let mut config = CosmofieldConfig::default();
        config.bias.nbar = Some(-1.0);
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let err = CosmofieldConfig::parse("bias:\n  scheme: pcs\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_example_yaml() {
        let yaml = CosmofieldConfig::example_yaml();
        assert!(yaml.contains("grid:"));
        assert!(yaml.contains("scheme: cic"));
        let parsed = CosmofieldConfig::parse(&yaml).unwrap();
        assert_eq!(parsed.bias.nbar, Some(3e-4));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cosmofield.yaml");
        let mut config = CosmofieldConfig::default();
        config.synthesis.seed = 99;
        config.save(&path).unwrap();

        assert_eq!(CosmofieldConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_from_rejects_invalid() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "grid:\n  grid_size: 0\n").unwrap();
        assert!(matches!(
            CosmofieldConfig::load_from(&path),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            CosmofieldConfig::load_from(&dir.path().join("missing.yaml")),
            Err(ConfigError::ReadError(_))
        ));
    }

    #[test]
    fn test_config_search_paths() {
        let paths = CosmofieldConfig::config_search_paths();
        assert!(paths[0].ends_with("cosmofield.yaml"));
        assert!(paths.last().unwrap().starts_with("/etc/cosmofield"));
    }
}
