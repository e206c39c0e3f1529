//! Downloads attachment objects into a per-attempt staging directory and
//! holds them open for the submission call.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

use crate::comment::AttachmentDescriptor;
use crate::staging::{safe_file_name, staging_dir};
use crate::storage::{ObjectStore, StorageError};

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("failed to create staging directory: {0}")]
    Staging(#[source] io::Error),

    #[error("failed to download attachment `{key}`: {source}")]
    Download {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("failed to stage attachment `{name}`: {source}")]
    Write {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// One downloaded attachment, open for reading.
#[derive(Debug)]
pub struct StagedAttachment {
    pub descriptor: AttachmentDescriptor,
    file: File,
    path: PathBuf,
}

impl StagedAttachment {
    /// Display name used in the outbound payload.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read_bytes(&mut self) -> io::Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(0)).await?;
        let mut bytes = Vec::new();
        self.file.read_to_end(&mut bytes).await?;
        Ok(bytes)
    }
}

/// All attachments staged for one attempt. Dropping the session closes every
/// handle and then removes the staging directory.
#[derive(Debug)]
pub struct AttachmentSession {
    // Field order matters: handles close before the directory goes away.
    attachments: Vec<StagedAttachment>,
    staging: TempDir,
}

impl AttachmentSession {
    pub fn attachments_mut(&mut self) -> &mut [StagedAttachment] {
        &mut self.attachments
    }

    pub fn len(&self) -> usize {
        self.attachments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }

    pub fn staging_path(&self) -> &Path {
        self.staging.path()
    }
}

#[derive(Clone)]
pub struct AttachmentAssembler {
    store: Arc<dyn ObjectStore>,
    staging_root: Option<PathBuf>,
}

impl AttachmentAssembler {
    pub fn new(store: Arc<dyn ObjectStore>, staging_root: Option<PathBuf>) -> Self {
        Self {
            store,
            staging_root,
        }
    }

    /// Download each descriptor in order. On failure, everything staged so
    /// far is released before the error is returned.
    pub async fn stage(
        &self,
        descriptors: &[AttachmentDescriptor],
    ) -> Result<AttachmentSession, AttachmentError> {
        let staging =
            staging_dir(self.staging_root.as_deref(), "attachments-").map_err(AttachmentError::Staging)?;
        let mut attachments = Vec::with_capacity(descriptors.len());

        for (index, descriptor) in descriptors.iter().enumerate() {
            let bytes = self
                .store
                .get_object(&descriptor.key)
                .await
                .map_err(|source| {
                    warn!(
                        key = %descriptor.key,
                        position = index + 1,
                        total = descriptors.len(),
                        error = %source,
                        "attachment download failed"
                    );
                    AttachmentError::Download {
                        key: descriptor.key.clone(),
                        source,
                    }
                })?;

            // Index prefix keeps duplicate display names apart.
            let path = staging
                .path()
                .join(format!("{index}-{}", safe_file_name(&descriptor.name)));
            let write_err = |source| AttachmentError::Write {
                name: descriptor.name.clone(),
                source,
            };
            tokio::fs::write(&path, &bytes).await.map_err(write_err)?;
            let file = File::open(&path).await.map_err(write_err)?;

            debug!(key = %descriptor.key, size = bytes.len(), "attachment staged");
            attachments.push(StagedAttachment {
                descriptor: descriptor.clone(),
                file,
                path,
            });
        }

        Ok(AttachmentSession {
            attachments,
            staging,
        })
    }
}
