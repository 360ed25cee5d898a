use std::path::Path;

use crate::error::PreconditionError;
use crate::util;

/// File contents encoded as base64 for inclusion in a gateway payload.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedFile {
    pub name: String,
    /// Size of the raw bytes.
    pub size: usize,
    pub data: String,
}

impl EncodedFile {
    pub fn from_bytes(
        name: impl Into<String>,
        bytes: impl AsRef<[u8]>,
        limit: usize,
    ) -> Result<EncodedFile, PreconditionError> {
        let name = name.into();
        let bytes = bytes.as_ref();
        if bytes.len() > limit {
            return Err(PreconditionError::FileTooLarge {
                name,
                size: bytes.len(),
                limit,
            });
        }

        Ok(EncodedFile {
            name,
            size: bytes.len(),
            data: util::encode_base64(bytes),
        })
    }

    /// Reads and encodes a file, checking its size before loading it.
    pub async fn read(path: impl AsRef<Path>, limit: usize) -> Result<EncodedFile, UploadError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|it| it.to_string_lossy().to_string())
            .unwrap_or_default();

        let size = tokio::fs::metadata(path).await?.len() as usize;
        if size > limit {
            return Err(PreconditionError::FileTooLarge { name, size, limit }.into());
        }

        let bytes = tokio::fs::read(path).await?;
        Ok(EncodedFile::from_bytes(name, bytes, limit)?)
    }
}

impl std::fmt::Debug for EncodedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncodedFile:{} ({} bytes)", self.name, self.size)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
