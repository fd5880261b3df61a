//! Local directory backend.
//!
//! Remote paths resolve under a root directory. Used for backup mirrors, for
//! mounted network shares and in tests.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};

use super::config::LocalMirrorConfig;
use super::error::TransferError;
use super::traits::{RemoteEntry, TransferGateway};
use crate::config::join_remote;

/// Transfer backend over a local directory tree.
pub struct LocalMirrorTransfer {
    config: LocalMirrorConfig,
}

impl LocalMirrorTransfer {
    pub fn new(config: LocalMirrorConfig) -> Self {
        Self { config }
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Maps a remote path onto the mirror root, refusing to leave it.
    fn resolve(&self, remote: &str) -> Result<PathBuf, TransferError> {
        let mut path = self.config.root.clone();
        for part in remote.split('/').filter(|p| !p.is_empty()) {
            match Path::new(part).components().next() {
                Some(Component::Normal(_)) => path.push(part),
                _ => return Err(TransferError::not_found(remote)),
            }
        }
        Ok(path)
    }

    async fn copy_file(&self, source: &Path, destination: &Path) -> Result<u64, TransferError> {
        let source_file = File::open(source).await?;

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        let dest_file = File::create(destination).await?;

        let mut reader = BufReader::with_capacity(self.config.buffer_size, source_file);
        let mut writer = BufWriter::with_capacity(self.config.buffer_size, dest_file);
        let mut buffer = vec![0u8; self.config.buffer_size.min(1024 * 1024)];
        let mut total_bytes = 0u64;

        loop {
            let bytes_read = reader.read(&mut buffer).await?;
            if bytes_read == 0 {
                break;
            }
            writer.write_all(&buffer[..bytes_read]).await?;
            total_bytes += bytes_read as u64;
        }

        writer.flush().await?;
        Ok(total_bytes)
    }
}

#[async_trait]
impl TransferGateway for LocalMirrorTransfer {
    fn name(&self) -> &str {
        "local_mirror"
    }

    async fn remote_size(&self, remote: &str) -> Result<u64, TransferError> {
        let path = self.resolve(remote)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(meta.len()),
            Ok(_) => Err(TransferError::not_found(remote)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TransferError::not_found(remote))
            }
            Err(e) => Err(TransferError::Io(e)),
        }
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<u64, TransferError> {
        let source = self.resolve(remote)?;
        if !source.is_file() {
            return Err(TransferError::not_found(remote));
        }
        self.copy_file(&source, local).await
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<u64, TransferError> {
        if !local.is_file() {
            return Err(TransferError::LocalNotFound {
                path: local.to_path_buf(),
            });
        }
        let destination = self.resolve(remote)?;
        self.copy_file(local, &destination).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<RemoteEntry>, TransferError> {
        let dir = self.resolve(prefix)?;
        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransferError::not_found(prefix))
            }
            Err(e) => return Err(TransferError::Io(e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let meta = entry.metadata().await?;
            let name = entry.file_name().to_string_lossy().to_string();
            entries.push(RemoteEntry {
                path: join_remote(prefix, &name),
                size: if meta.is_file() { meta.len() } else { 0 },
                is_dir: meta.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn delete(&self, remote: &str) -> Result<(), TransferError> {
        let path = self.resolve(remote)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TransferError::not_found(remote))
            }
            Err(e) => Err(TransferError::Io(e)),
        }
    }
}
