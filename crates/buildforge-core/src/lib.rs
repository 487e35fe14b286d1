//! Core domain types for the BuildForge container-image build service.
//!
//! This crate contains:
//! - The [`job::Job`] entity and its lifecycle types (status, phase, metrics, logs)
//! - [`config::BuildConfig`], the immutable submitted request
//! - [`history::JobHistory`], the archival record for terminal jobs
//! - [`naming`], the bit-exact temp-image and sanitization rules external
//!   consumers depend on
//! - The shared [`error::Error`] type

pub mod config;
pub mod error;
pub mod history;
pub mod id;
pub mod job;
pub mod naming;

pub use error::{Error, Result};
pub use id::{JobId, WorkloadId};
pub use job::{Job, JobLogs, JobMetrics, JobStatus, Phase};
