use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::resource::next_chunk_len;
use crate::{Error, RateLimit, Resource, Result, Sink};

/// Serves a file from disk. Size and times are read once, on open.
#[derive(Debug)]
pub struct FileResource {
    path: PathBuf,
    file: Option<File>,
    available: bool,
    byte_size: u64,
    modified: SystemTime,
    created: SystemTime,
}

impl FileResource {
    /// Opens `path`. A missing, unreadable or non-regular file gives an
    /// unavailable resource rather than an error.
    pub async fn open(path: impl AsRef<Path>) -> FileResource {
        let path = path.as_ref().to_path_buf();
        match Self::try_open(&path).await {
            Ok(resource) => resource,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "file unavailable");
                FileResource {
                    path,
                    file: None,
                    available: false,
                    byte_size: 0,
                    modified: UNIX_EPOCH,
                    created: UNIX_EPOCH,
                }
            }
        }
    }

    async fn try_open(path: &Path) -> io::Result<FileResource> {
        let file = File::open(path).await?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"));
        }

        let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
        let created = metadata.created().unwrap_or(modified);

        Ok(FileResource {
            path: path.to_path_buf(),
            file: Some(file),
            available: true,
            byte_size: metadata.len(),
            modified,
            created,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Resource for FileResource {
    fn is_available(&self) -> bool {
        self.available
    }

    fn byte_size(&self) -> u64 {
        self.byte_size
    }

    fn modified(&self) -> SystemTime {
        self.modified
    }

    fn created(&self) -> SystemTime {
        self.created
    }

    fn mime_type(&self) -> String {
        mime_guess::from_path(&self.path).first_or_octet_stream().to_string()
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    async fn read_range(
        &mut self,
        start: u64,
        end: u64,
        rate: &RateLimit,
        sink: &mut dyn Sink,
    ) -> Result<u64> {
        let Some(file) = self.file.as_mut() else {
            return Err(Error::Resource(io::Error::new(
                io::ErrorKind::NotFound,
                "file is closed",
            )));
        };

        file.seek(io::SeekFrom::Start(start)).await.map_err(Error::Resource)?;

        let mut position = start;
        while position <= end {
            rate.throttle().await;

            let mut chunk = BytesMut::zeroed(next_chunk_len(position, end, rate));
            let n = file.read(&mut chunk).await.map_err(Error::Resource)?;
            if n == 0 {
                // physical end of file
                break;
            }
            chunk.truncate(n);
            tracing::trace!(position, len = n, "file chunk");
            sink.process(chunk.freeze()).await.map_err(Error::Sink)?;

            position += n as u64;
        }

        Ok(position - start)
    }

    fn destroy(&mut self) {
        if self.file.take().is_some() {
            tracing::trace!(path = %self.path.display(), "file closed");
        }
    }
}
