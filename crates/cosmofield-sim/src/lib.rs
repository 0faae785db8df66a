//! # Cosmofield Batch Driver
//!
//! Runs the density-field pipeline over a directory of P(k) tables, as
//! configured by a [`CosmofieldConfig`](cosmofield_core::config::CosmofieldConfig).
//!
//! ```rust,no_run
//! use cosmofield_core::config::CosmofieldConfig;
//! use cosmofield_sim::Pipeline;
//!
//! let config = CosmofieldConfig::load().unwrap();
//! let report = Pipeline::new(config).unwrap().run().unwrap();
//! println!("{} files written", report.files_written());
//! ```

pub mod pipeline;

pub use pipeline::{discover_tables, Pipeline, PipelineError, PipelineReport, TableReport};
