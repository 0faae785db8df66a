//! # Observability
//!
//! Structured logging via `tracing`. Library code only emits events; the
//! binary decides where they go by calling [`init_logging`] once at startup.
//!
//! ```text
//! stage code ── info!/debug!/warn! ──► registry ─► EnvFilter ─► fmt layer ─► stderr
//!                                                               (json | pretty | compact)
//! ```

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
