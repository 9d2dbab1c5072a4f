//! Slice sources / 分片数据源
//!
//! A source is either an open local file or an in-memory buffer; both expose
//! the same `read_range` so the uploader never cares where bytes come from.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::{Error, Result};

/// Buffer size for whole-source hashing / 整体哈希的读缓冲
const HASH_BUF_SIZE: usize = 64 * 1024;

/// What the caller wants uploaded / 上传源描述
#[derive(Debug, Clone)]
pub enum UploadSource {
    Path(PathBuf),
    Bytes(Bytes),
}

impl From<&Path> for UploadSource {
    fn from(path: &Path) -> Self {
        UploadSource::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for UploadSource {
    fn from(path: PathBuf) -> Self {
        UploadSource::Path(path)
    }
}

impl From<Bytes> for UploadSource {
    fn from(data: Bytes) -> Self {
        UploadSource::Bytes(data)
    }
}

/// Opened source / 已打开的数据源
///
/// The file handle lives as long as the source and is closed on drop, so every
/// exit path of an upload releases it.
#[derive(Debug)]
pub enum SliceSource {
    File {
        file: tokio::fs::File,
        path: PathBuf,
        len: u64,
    },
    Memory(Bytes),
}

impl SliceSource {
    /// Open the source, failing with [`Error::FileNotExist`] for missing or non-regular files
    /// / 打开数据源
    pub async fn open(source: UploadSource) -> Result<Self> {
        match source {
            UploadSource::Bytes(data) => Ok(SliceSource::Memory(data)),
            UploadSource::Path(path) => {
                let meta = match tokio::fs::metadata(&path).await {
                    Ok(meta) if meta.is_file() => meta,
                    _ => return Err(Error::FileNotExist(path)),
                };
                let file = tokio::fs::File::open(&path).await?;
                Ok(SliceSource::File {
                    file,
                    path,
                    len: meta.len(),
                })
            }
        }
    }

    /// Total length in bytes / 总长度
    pub fn len(&self) -> u64 {
        match self {
            SliceSource::File { len, .. } => *len,
            SliceSource::Memory(data) => data.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Display name used for the multipart file field / 文件名
    pub fn file_name(&self) -> String {
        match self {
            SliceSource::File { path, .. } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".to_string()),
            SliceSource::Memory(_) => "blob".to_string(),
        }
    }

    /// Read exactly `length` bytes at `offset` / 读取指定范围
    pub async fn read_range(&mut self, offset: u64, length: u64) -> Result<Bytes> {
        let end = offset
            .checked_add(length)
            .filter(|end| *end <= self.len())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("range {}+{} beyond source length {}", offset, length, self.len()),
                )
            })?;

        match self {
            SliceSource::Memory(data) => Ok(data.slice(offset as usize..end as usize)),
            SliceSource::File { file, .. } => {
                file.seek(SeekFrom::Start(offset)).await?;
                let mut buf = vec![0u8; length as usize];
                file.read_exact(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
        }
    }

    /// SHA-1 of the whole source, hex encoded / 整体 SHA-1
    pub async fn sha1_hex(&mut self) -> Result<String> {
        match self {
            SliceSource::Memory(data) => Ok(sha1_hex(data)),
            SliceSource::File { file, .. } => {
                file.seek(SeekFrom::Start(0)).await?;
                let mut hasher = Sha1::new();
                let mut buf = vec![0u8; HASH_BUF_SIZE];
                loop {
                    let n = file.read(&mut buf).await?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buf[..n]);
                }
                Ok(hex::encode(hasher.finalize()))
            }
        }
    }
}

/// SHA-1 of `data`, hex encoded / 计算 SHA-1
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    #[test]
    fn test_sha1_known_vector() {
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = SliceSource::open(UploadSource::Path("/definitely/not/here.bin".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileNotExist(_)));
    }

    #[tokio::test]
    async fn test_directory_is_not_a_file() {
        let dir = TempDir::new().unwrap();
        let err = SliceSource::open(dir.path().into()).await.unwrap_err();
        assert!(matches!(err, Error::FileNotExist(_)));
    }

    #[tokio::test]
    async fn test_file_and_memory_read_alike() {
        let dir = TempDir::new().unwrap();
        let data = b"0123456789";
        let path = create_test_file(dir.path(), "digits.bin", data);

        let mut file = SliceSource::open(path.into()).await.unwrap();
        let mut mem = SliceSource::open(Bytes::from_static(data).into()).await.unwrap();

        assert_eq!(file.len(), 10);
        assert_eq!(file.file_name(), "digits.bin");
        for (offset, length) in [(0, 4), (4, 4), (8, 2)] {
            let a = file.read_range(offset, length).await.unwrap();
            let b = mem.read_range(offset, length).await.unwrap();
            assert_eq!(a, b);
        }
        assert_eq!(file.sha1_hex().await.unwrap(), sha1_hex(data));
        assert_eq!(mem.sha1_hex().await.unwrap(), sha1_hex(data));
    }

    #[tokio::test]
    async fn test_read_past_end() {
        let mut mem = SliceSource::Memory(Bytes::from_static(b"abc"));
        assert!(matches!(mem.read_range(2, 5).await, Err(Error::Io(_))));
    }
}
