// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Directory-backed blob store used as the blob storage probe target.

use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;
use lifeline::backend::{BackendError, BackendResult};
use lifeline::BlobStore;

/// Name of the marker blob written and read back on every ping.
const PROBE_BLOB: &str = ".lifeline-probe";

/// Blob store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct DirBlobStore {
    root: PathBuf,
}

impl DirBlobStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        DirBlobStore {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes, reads back and removes the marker blob.
    async fn round_trip(&self) -> BackendResult<()> {
        let path = self.root.join(PROBE_BLOB);
        let marker = std::process::id().to_string();

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&path, marker.as_bytes()).await?;
        let read = tokio::fs::read(&path).await?;
        tokio::fs::remove_file(&path).await?;

        if read != marker.as_bytes() {
            return Err(BackendError::Unavailable(format!(
                "blob read back mismatch in {}",
                self.root.display()
            )));
        }
        Ok(())
    }
}

impl BlobStore for DirBlobStore {
    fn ping(&self) -> BoxFuture<'_, BackendResult<()>> {
        Box::pin(self.round_trip())
    }
}

#[cfg(test)]
#[path = "blobs_tests.rs"]
mod tests;
