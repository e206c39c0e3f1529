pub mod client;
pub mod types;

pub use client::IntakeClient;
pub use types::{DOCUMENT_FILENAME, FormField, SubmissionOutcome, SubmissionReceipt, build_fields};
