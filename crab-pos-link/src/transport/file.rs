//! Write-only file sink (device node, spool file, capture file)

use super::Transport;
use crate::error::PrintResult;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::instrument;

/// Writes to a file-like sink; the device never answers, so reads return 0
///
/// A link over a file never observes inbound bytes and therefore never
/// reports itself connected.
#[derive(Debug)]
pub struct FileTransport {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileTransport {
    /// Open `path` for appending, creating it if missing
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> PrintResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn read_bytes(&self, _buf: &mut [u8]) -> io::Result<usize> {
        Ok(0)
    }

    async fn write_bytes(&self, data: &[u8]) -> io::Result<usize> {
        self.file.lock().await.write(data).await
    }

    async fn flush(&self) -> io::Result<()> {
        self.file.lock().await.flush().await
    }

    async fn close(&self) -> io::Result<()> {
        let mut file = self.file.lock().await;
        file.flush().await?;
        file.sync_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sink.bin");

        let t = FileTransport::open(&path).await.unwrap();
        let mut written = 0;
        while written < 3 {
            written += t.write_bytes(&[0x1B, 0x40, 0x0A][written..]).await.unwrap();
        }
        t.close().await.unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(t.read_bytes(&mut buf).await.unwrap(), 0);

        let contents = tokio::fs::read(&path).await.unwrap();
        assert_eq!(contents, vec![0x1B, 0x40, 0x0A]);
    }
}
