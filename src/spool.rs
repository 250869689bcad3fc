//! Transient on-disk storage for outbound documents.
//!
//! A rendered PDF is written to a uniquely named file (`pdfbridge-*.pdf`),
//! read back for transport encoding, and deleted when the
//! [`SpooledDocument`] is dropped. Dropping covers every exit path,
//! including early returns and panics after the write.

use crate::error::BridgeError;
use crate::pipeline::encode::{self, OutboundMedia};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

const SPOOL_PREFIX: &str = "pdfbridge-";
const SPOOL_SUFFIX: &str = ".pdf";

/// A PDF held in a temp file for as long as this value lives.
#[derive(Debug)]
pub struct SpooledDocument {
    file: NamedTempFile,
    dir: PathBuf,
}

impl SpooledDocument {
    /// Write `bytes` to a fresh spool file inside `dir`.
    pub fn write(dir: &Path, bytes: &[u8]) -> Result<Self, BridgeError> {
        let spool_err = |source| BridgeError::Spool {
            dir: dir.to_path_buf(),
            source,
        };
        let mut file = tempfile::Builder::new()
            .prefix(SPOOL_PREFIX)
            .suffix(SPOOL_SUFFIX)
            .tempfile_in(dir)
            .map_err(spool_err)?;
        file.write_all(bytes).map_err(spool_err)?;
        file.flush().map_err(spool_err)?;
        debug!("Spooled {} bytes to {}", bytes.len(), file.path().display());
        Ok(Self {
            file,
            dir: dir.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read the spooled bytes back.
    pub fn read(&self) -> Result<Vec<u8>, BridgeError> {
        fs::read(self.file.path()).map_err(|source| BridgeError::Spool {
            dir: self.dir.clone(),
            source,
        })
    }

    /// Read the document back as a base64 attachment.
    pub fn to_media(&self, filename: &str) -> Result<OutboundMedia, BridgeError> {
        Ok(encode::encode_pdf(&self.read()?, filename))
    }
}

/// Route `bytes` through the spool and return them as an attachment.
///
/// Runs on the blocking pool. The spool file is gone by the time this
/// returns, whether or not encoding succeeded.
pub async fn spool_media(
    dir: PathBuf,
    bytes: Vec<u8>,
    filename: String,
) -> Result<OutboundMedia, BridgeError> {
    tokio::task::spawn_blocking(move || {
        let spooled = SpooledDocument::write(&dir, &bytes)?;
        spooled.to_media(&filename)
    })
    .await
    .map_err(|e| BridgeError::Internal(format!("spool worker failed: {e}")))?
}
