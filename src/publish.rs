use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::intake::SubmissionReceipt;
use crate::storage::{ObjectStore, StorageError};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to encode tracking record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The record clients poll for once a submission is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingRecord {
    #[serde(rename = "trackingNumber")]
    pub tracking_number: String,
}

/// Writes tracking records to their pre-assigned storage keys.
#[derive(Clone)]
pub struct MetadataPublisher {
    store: Arc<dyn ObjectStore>,
}

impl MetadataPublisher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn publish(&self, receipt: &SubmissionReceipt, metadata_key: &str) -> Result<(), PublishError> {
        let record = TrackingRecord {
            tracking_number: receipt.tracking_number.clone(),
        };
        let body = serde_json::to_vec(&record)?;
        self.store
            .put_object(metadata_key, body, "application/json", None)
            .await?;
        info!(
            key = metadata_key,
            tracking_number = %receipt.tracking_number,
            "tracking record published"
        );
        Ok(())
    }
}
