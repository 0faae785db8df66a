//! Batch pipeline: P(k) tables in, fields and spectra out
//!
//! Every `*.txt` table in the input directory runs through the enabled
//! stages and its products land in sibling directories:
//!
//! ```text
//! <input_dir>/pk_lcdm_z0.5.txt
//!      │
//!      ▼  synthesize                       <root>/gaussian_field/pk_lcdm_z0.5.npy
//!      ├──► log-normal                     <root>/lognormal_field/pk_lcdm_z0.5_lognormal.npy
//!      ├──► bias expansion                 <root>/galaxy_field/pk_lcdm_z0.5_galaxy.npy
//!      └──► estimate (each field above)    <root>/power_spectrum/<field stem>_pk.txt
//! ```
//!
//! Tables are processed in file-name order. Each table gets its own `StdRng`
//! seeded from the configured seed and its position in that order, so the
//! fields of one table do not depend on which stages ran for the others.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, info_span, warn};

use cosmofield_core::bias::BiasExpansionEngine;
use cosmofield_core::config::{ConfigError, CosmofieldConfig};
use cosmofield_core::estimator::PowerSpectrumEstimator;
use cosmofield_core::gaussian_field::GaussianFieldSynthesizer;
use cosmofield_core::io::{self, GALAXY_DIR, GAUSSIAN_DIR, LOGNORMAL_DIR, SPECTRUM_DIR};
use cosmofield_core::lognormal::{apply_log_normal, density_contrast};
use cosmofield_core::power_table::PowerSpectrumTable;
use cosmofield_core::types::{FieldError, FieldStats, ScalarField};

/// Errors that abort a pipeline run
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{}: {source}", path.display())]
    Table {
        path: PathBuf,
        #[source]
        source: FieldError,
    },

    #[error(transparent)]
    Field(#[from] FieldError),
}

/// What one table produced
#[derive(Debug, Clone)]
pub struct TableReport {
    pub table: PathBuf,
    pub redshift: Option<f64>,
    pub gaussian: FieldStats,
    pub outputs: Vec<PathBuf>,
}

/// Summary of a run
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub tables: Vec<TableReport>,
}

impl PipelineReport {
    pub fn files_written(&self) -> usize {
        self.tables.iter().map(|t| t.outputs.len()).sum()
    }
}

/// Stage driver for one configuration.
#[derive(Debug)]
pub struct Pipeline {
    config: CosmofieldConfig,
    synth: GaussianFieldSynthesizer,
    engine: BiasExpansionEngine,
    estimator: PowerSpectrumEstimator,
}

impl Pipeline {
    pub fn new(config: CosmofieldConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let (n, box_size) = (config.grid.grid_size, config.grid.box_size);

        let synth = GaussianFieldSynthesizer::new(n, box_size)?.with_symmetry(config.synthesis.symmetry);
        let engine = BiasExpansionEngine::new(n, box_size)?.with_scheme(config.bias.scheme);
        let estimator = PowerSpectrumEstimator::new(n, box_size, config.estimator)?;

        Ok(Self {
            config,
            synth,
            engine,
            estimator,
        })
    }

    pub fn config(&self) -> &CosmofieldConfig {
        &self.config
    }

    /// Run every table in the input directory.
    pub fn run(&mut self) -> Result<PipelineReport, PipelineError> {
        let input_dir = self.config.pipeline.input_dir.clone();
        if !input_dir.is_dir() {
            return Err(ConfigError::NotFound(format!("input directory {}", input_dir.display())).into());
        }

        let tables = discover_tables(&input_dir)?;
        if tables.is_empty() {
            warn!(dir = %input_dir.display(), "no .txt power spectrum tables found");
            return Ok(PipelineReport::default());
        }

        let root = self.config.pipeline.output_root();
        self.prepare_dirs(&root)?;
        info!(
            tables = tables.len(),
            n = self.config.grid.grid_size,
            box_size = self.config.grid.box_size,
            output = %root.display(),
            "pipeline starting"
        );

        let mut report = PipelineReport::default();
        for (index, path) in tables.iter().enumerate() {
            let seed = self.config.synthesis.seed.wrapping_add(index as u64);
            let mut rng = StdRng::seed_from_u64(seed);
            let table_report = self
                .process_table(path, &root, &mut rng)
                .map_err(|source| PipelineError::Table {
                    path: path.clone(),
                    source,
                })?;
            report.tables.push(table_report);
        }

        info!(files = report.files_written(), "pipeline finished");
        Ok(report)
    }

    /// Run the enabled stages for one table.
    pub fn process_table(
        &mut self,
        path: &Path,
        root: &Path,
        rng: &mut StdRng,
    ) -> Result<TableReport, FieldError> {
        let stem = io::stem_of(path);
        let redshift = io::extract_redshift(path);
        let _span = info_span!("table", file = %stem).entered();

        let table = PowerSpectrumTable::from_file(path)?;
        info!(rows = table.len(), z = ?redshift, "generating gaussian field");

        let delta = self.synth.generate(&table, rng);
        let gaussian = delta.stats();
        log_stats("gaussian", &delta);

        let mut outputs = Vec::new();
        let mut measured: Vec<(String, ScalarField)> = Vec::new();

        let gaussian_path = root.join(GAUSSIAN_DIR).join(io::gaussian_name(&stem));
        io::write_field(&gaussian_path, &delta)?;
        info!(path = %gaussian_path.display(), "saved gaussian field");
        outputs.push(gaussian_path);

        if self.config.pipeline.lognormal {
            let rho = apply_log_normal(&delta);
            log_stats("lognormal", &rho);
            let path = root.join(LOGNORMAL_DIR).join(io::lognormal_name(&stem));
            io::write_field(&path, &rho)?;
            info!(path = %path.display(), "saved log-normal field");
            outputs.push(path);
            measured.push((format!("{}_lognormal", stem), density_contrast(&rho)));
        }

        if self.config.pipeline.galaxy {
            let params = self.config.bias.parameters();
            let tracer = self.engine.tracer_field(&delta, &params, rng)?;
            log_stats("galaxy", &tracer);
            let path = root.join(GALAXY_DIR).join(io::galaxy_name(&stem));
            io::write_field(&path, &tracer)?;
            info!(path = %path.display(), "saved galaxy field");
            outputs.push(path);
            measured.push((format!("{}_galaxy", stem), tracer));
        }

        if self.config.pipeline.measure {
            measured.insert(0, (stem.clone(), delta));
            for (name, field) in &measured {
                let spectrum = self.estimator.estimate(field)?;
                let path = root.join(SPECTRUM_DIR).join(io::spectrum_name(name));
                spectrum.write_to(&path)?;
                info!(path = %path.display(), bins = spectrum.len(), "saved power spectrum");
                outputs.push(path);
            }
        }

        Ok(TableReport {
            table: path.to_path_buf(),
            redshift,
            gaussian,
            outputs,
        })
    }

    fn prepare_dirs(&self, root: &Path) -> Result<(), FieldError> {
        let pipeline = &self.config.pipeline;
        let stages = [
            (GAUSSIAN_DIR, true),
            (LOGNORMAL_DIR, pipeline.lognormal),
            (GALAXY_DIR, pipeline.galaxy),
            (SPECTRUM_DIR, pipeline.measure),
        ];
        for (dir, enabled) in stages {
            if enabled {
                std::fs::create_dir_all(root.join(dir))?;
            }
        }
        Ok(())
    }
}

/// `*.txt` files directly inside `dir`, sorted by name.
pub fn discover_tables(dir: &Path) -> Result<Vec<PathBuf>, FieldError> {
    let mut tables = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == "txt") {
            tables.push(path);
        }
    }
    tables.sort();
    Ok(tables)
}

fn log_stats(stage: &str, field: &ScalarField) {
    let stats = field.stats();
    debug!(
        stage,
        mean = stats.mean,
        variance = stats.variance,
        min = stats.min,
        max = stats.max,
        "field statistics"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmofield_core::power_table::TABLE_HEADER;
    use tempfile::TempDir;

    fn write_table(dir: &Path, name: &str, p: f64) {
        let table = PowerSpectrumTable::from_pairs(&[(0.0, p), (5.0, p)]).unwrap();
        table.write_to(&dir.join(name)).unwrap();
    }

    fn small_config(input_dir: PathBuf) -> CosmofieldConfig {
        let mut config = CosmofieldConfig::default();
        config.grid.grid_size = 8;
        config.grid.box_size = 100.0;
        config.bias.nbar = Some(1e-3);
        config.pipeline.input_dir = input_dir;
        config
    }

    #[test]
    fn test_full_run_writes_every_product() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("pk");
        std::fs::create_dir(&input).unwrap();
        write_table(&input, "pk_test_z0.txt", 500.0);
        write_table(&input, "pk_test_z1.txt", 200.0);
        std::fs::write(input.join("notes.md"), "ignored").unwrap();

        let mut pipeline = Pipeline::new(small_config(input)).unwrap();
        let report = pipeline.run().unwrap();

        assert_eq!(report.tables.len(), 2);
        assert_eq!(report.tables[0].redshift, Some(0.0));
        assert_eq!(report.tables[1].redshift, Some(1.0));
        // 3 fields + 3 spectra per table
        assert_eq!(report.files_written(), 12);

        let root = tmp.path();
        for expected in [
            "gaussian_field/pk_test_z0.npy",
            "lognormal_field/pk_test_z0_lognormal.npy",
            "galaxy_field/pk_test_z1_galaxy.npy",
            "power_spectrum/pk_test_z1_pk.txt",
            "power_spectrum/pk_test_z1_lognormal_pk.txt",
            "power_spectrum/pk_test_z0_galaxy_pk.txt",
        ] {
            assert!(root.join(expected).is_file(), "missing {}", expected);
        }

        let rho = io::read_field(&root.join("lognormal_field/pk_test_z0_lognormal.npy")).unwrap();
        assert!(rho.data().iter().all(|&r| r > 0.0));

        let spectrum = std::fs::read_to_string(root.join("power_spectrum/pk_test_z0_pk.txt")).unwrap();
        assert!(spectrum.starts_with(&format!("# {}", TABLE_HEADER)));
    }

    #[test]
    fn test_rerun_is_bit_identical() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("pk");
        std::fs::create_dir(&input).unwrap();
        write_table(&input, "pk_test_z0.txt", 500.0);

        let out_a = tmp.path().join("a");
        let out_b = tmp.path().join("b");
        for out in [&out_a, &out_b] {
            let mut config = small_config(input.clone());
            config.pipeline.output_dir = Some(out.clone());
            Pipeline::new(config).unwrap().run().unwrap();
        }

        for rel in ["gaussian_field/pk_test_z0.npy", "galaxy_field/pk_test_z0_galaxy.npy"] {
            let a = std::fs::read(out_a.join(rel)).unwrap();
            let b = std::fs::read(out_b.join(rel)).unwrap();
            assert_eq!(a, b, "{} differs between runs", rel);
        }
    }

    #[test]
    fn test_disabled_stages_skipped() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("pk");
        std::fs::create_dir(&input).unwrap();
        write_table(&input, "pk_test_z0.txt", 500.0);

        let mut config = small_config(input);
        config.pipeline.lognormal = false;
        config.pipeline.galaxy = false;
        config.pipeline.measure = false;
        let report = Pipeline::new(config).unwrap().run().unwrap();

        assert_eq!(report.files_written(), 1);
        assert!(!tmp.path().join(LOGNORMAL_DIR).exists());
        assert!(!tmp.path().join(SPECTRUM_DIR).exists());
    }

    #[test]
    fn test_missing_input_dir() {
        let tmp = TempDir::new().unwrap();
        let config = small_config(tmp.path().join("does_not_exist"));
        let err = Pipeline::new(config).unwrap().run().unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_bad_table_names_the_file() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("pk");
        std::fs::create_dir(&input).unwrap();
        std::fs::write(input.join("pk_bad_z0.txt"), "0.2 1.0\n0.1 1.0\n").unwrap();

        let err = Pipeline::new(small_config(input)).unwrap().run().unwrap_err();
        match err {
            PipelineError::Table { path, source } => {
                assert!(path.ends_with("pk_bad_z0.txt"));
                assert!(matches!(source, FieldError::InvalidTable(_)));
            }
            other => panic!("expected table error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input_dir() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("pk");
        std::fs::create_dir(&input).unwrap();
        let report = Pipeline::new(small_config(input)).unwrap().run().unwrap();
        assert!(report.tables.is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = CosmofieldConfig::default();
        config.grid.grid_size = 0;
        assert!(matches!(Pipeline::new(config), Err(PipelineError::Config(_))));
    }
}
