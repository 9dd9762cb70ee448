//! Batch driver for the Cobalt COBOL-to-Python transpiler.
//!
//! The front end (`cobalt-cobol`) and pipeline (`cobalt-transpile`)
//! handle one program at a time; this crate runs whole source trees:
//!
//! - [`config`]: batch settings and source discovery
//! - [`orchestrator`]: the per-program pipeline state machine and the
//!   worker fan-out that drives it
//! - [`augment`]: the contract for an external collaborator that may
//!   propose translations for edge-case snippets, with retry, backoff,
//!   and a shared TTL cache
//! - [`report`]: the run-level report in text and JSON form

pub mod augment;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod report;

pub use augment::{Augmentation, AugmentationError, AugmentationHint, NoAugmentation};
pub use config::{discover_sources, Config};
pub use error::{Result, RunError};
pub use orchestrator::{Orchestrator, Stage};
pub use report::{ProgramReport, ProgramStatus, ReportFormat, RunReport};
