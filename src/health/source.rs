//! Readable export sources with a known size and random-access byte ranges.

use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// A document the scanner can read in bounded pieces.
#[async_trait]
pub trait DocumentSource: Send {
    /// Declared file name, used for format validation.
    fn name(&self) -> &str;

    /// Total size in bytes.
    fn size(&self) -> u64;

    /// Read exactly `len` bytes starting at `offset`.
    async fn read_range(&mut self, offset: u64, len: usize) -> std::io::Result<Vec<u8>>;
}

/// An export file on local disk.
#[derive(Debug)]
pub struct FileSource {
    name: String,
    size: u64,
    file: File,
}

impl FileSource {
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path).await?;
        let size = file.metadata().await?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(Self {
            name,
            size,
            file,
        })
    }
}

#[async_trait]
impl DocumentSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn read_range(&mut self, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf).await?;
        Ok(buf)
    }
}

/// An export already held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    bytes: Vec<u8>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    async fn read_range(&mut self, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let end = start.saturating_add(len);
        self.bytes
            .get(start..end)
            .map(|slice| slice.to_vec())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("range {}..{} past end of {} bytes", start, end, self.bytes.len()),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_file_source_reads_ranges() {
        let mut temp = tempfile::Builder::new().suffix(".xml").tempfile().unwrap();
        temp.write_all(b"<HealthData>hello</HealthData>").unwrap();
        temp.flush().unwrap();

        let mut source = FileSource::open(temp.path()).await.unwrap();
        assert_eq!(source.size(), 30);
        assert!(source.name().ends_with(".xml"));

        let bytes = source.read_range(12, 5).await.unwrap();
        assert_eq!(bytes, b"hello");
        let bytes = source.read_range(0, 1).await.unwrap();
        assert_eq!(bytes, b"<");
    }

    #[tokio::test]
    async fn test_file_source_short_read_fails() {
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        temp.write_all(b"abc").unwrap();
        temp.flush().unwrap();

        let mut source = FileSource::open(temp.path()).await.unwrap();
        let err = source.read_range(1, 10).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_memory_source_bounds() {
        let mut source = MemorySource::new("export.xml", "0123456789");
        assert_eq!(source.size(), 10);
        assert_eq!(source.read_range(8, 2).await.unwrap(), b"89");
        assert!(source.read_range(8, 3).await.is_err());
    }
}
