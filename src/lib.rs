//! preform - preference dataset formatting and fine-tuning job submission.
//!
//! ## Architecture
//!
//! Two pure formatters compose a linear pipeline:
//! - **Preference formatting**: raw (prompt, chosen, rejected) rows become the
//!   preference-pair records the fine-tuning service consumes
//! - **Supervised conversion**: each preference record yields a supervised
//!   record from its preferred side only
//!
//! The driver runs both over each dataset split and writes one JSONL file per
//! (format × split). The client uploads the files and creates fine-tuning
//! jobs (supervised or DPO), which can be chained off a prior checkpoint.

pub mod client;
pub mod dataset;
pub mod models;
pub mod pipeline;

// Re-exports for convenience
pub use client::{FineTuneClient, FineTuneJob, JobRequest, JobStatus, UploadedFile};
pub use dataset::Split;
pub use models::{
    ChatMessage, Config, FormatError, PreferenceRecord, PreformError, RawExample, Result, Role,
    SupervisedRecord, TrainingMethod,
};
pub use pipeline::{FormatPipeline, PreferenceFormatter};
