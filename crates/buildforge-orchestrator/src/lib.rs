//! Typed adapter over the cluster workload orchestrator (C1).
//!
//! [`WorkloadClient`] is the only way the rest of the service talks to the
//! orchestrator. [`HttpWorkloadClient`] backs production; [`FakeWorkloadClient`]
//! backs tests and exercises the same status-derivation logic.

pub mod client;
pub mod error;
pub mod fake;
pub mod http;
pub mod spec;
pub mod status;

pub use client::{LogStream, WorkloadClient};
pub use error::{ClientError, Result};
pub use fake::FakeWorkloadClient;
pub use http::HttpWorkloadClient;
pub use spec::{Constraint, ConstraintOperator, SecretTemplateRequest, WorkloadSpec, WorkloadType};
pub use status::{
    derive_status, extract_failure_detail, Allocation, ClientStatus, Evaluation,
    EvaluationStatus, RawWorkloadStatus, TaskEvent, TaskState, TaskStatus, WorkloadStatus,
};
