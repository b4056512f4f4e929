use futures::future::BoxFuture;
use futures::FutureExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use url::Url;

const LOG_TARGET: &str = "download";

/// A published JSON export. Stays reachable until revoked.
#[derive(Debug, PartialEq, Eq)]
pub struct DownloadUrl {
    url: Url,
    path: PathBuf,
}

impl DownloadUrl {
    pub fn new(url: Url, path: PathBuf) -> Self {
        Self { url, path }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DownloadError {
    #[error("download io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot build file url for {0}")]
    InvalidPath(PathBuf),
}

pub trait DownloadStore: Send + Sync {
    fn publish(&self, json: String) -> BoxFuture<'_, Result<DownloadUrl, DownloadError>>;

    fn revoke(&self, url: DownloadUrl) -> BoxFuture<'_, Result<(), DownloadError>>;
}

/// Publishes exports as `timeline-<id>.json` files and hands out `file://`
/// URLs to them.
#[derive(Clone)]
pub struct FileDownloadStore {
    dir: PathBuf,
    next_id: Arc<AtomicU64>,
}

impl FileDownloadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl DownloadStore for FileDownloadStore {
    fn publish(&self, json: String) -> BoxFuture<'_, Result<DownloadUrl, DownloadError>> {
        async move {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            tokio::fs::create_dir_all(&self.dir).await?;
            let path = tokio::fs::canonicalize(&self.dir)
                .await?
                .join(format!("timeline-{id}.json"));
            let url = Url::from_file_path(&path)
                .map_err(|_| DownloadError::InvalidPath(path.clone()))?;
            tokio::fs::write(&path, json).await?;
            tracing::debug!(target: LOG_TARGET, %url, "export published");
            Ok(DownloadUrl { url, path })
        }
        .boxed()
    }

    fn revoke(&self, download: DownloadUrl) -> BoxFuture<'_, Result<(), DownloadError>> {
        async move {
            match tokio::fs::remove_file(&download.path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            tracing::debug!(target: LOG_TARGET, url = %download.url, "export revoked");
            Ok(())
        }
        .boxed()
    }
}
