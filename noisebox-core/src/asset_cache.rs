//! Local cache of remote audio assets.
//!
//! Each asset is stored under a file name derived from its URL, so the
//! contents of the cache directory are the whole index: a file that exists is
//! a hit, even across process restarts. Misses are downloaded once; concurrent
//! resolves of the same URL wait for the download already in flight.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;

use crate::error::{Error, Result};

/// Download status for UI updates.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadStatus {
    /// Download is in progress
    Downloading,
    /// Download completed successfully
    Complete { local_path: PathBuf },
    /// Download failed
    Failed { error: String },
}

/// What a transfer wrote to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadReport {
    /// Bytes written to the destination file.
    pub bytes: u64,
    /// Length announced by the server, if any.
    pub expected: Option<u64>,
}

/// Transfers one remote asset into a local file.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Downloads `url` into `dest`, creating or truncating it.
    async fn download(&self, url: &str, dest: &Path) -> Result<DownloadReport>;
}

/// Receives "downloading" notifications so a host can show a spinner.
pub trait DownloadObserver: Send + Sync {
    fn download_started(&self, url: &str);
    fn download_finished(&self, url: &str);
}

/// Observer that ignores all notifications.
pub struct NoopObserver;

impl DownloadObserver for NoopObserver {
    fn download_started(&self, _url: &str) {}
    fn download_finished(&self, _url: &str) {}
}

/// Plain HTTP(S) GET downloader backed by reqwest.
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<DownloadReport> {
        let download_err = |e: reqwest::Error| Error::Download(url.to_string(), e.to_string());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(download_err)?
            .error_for_status()
            .map_err(download_err)?;

        let expected = response.content_length();
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut bytes = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(download_err)?;
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(DownloadReport { bytes, expected })
    }
}

/// Result shared with callers waiting on someone else's download.
type SharedOutcome = Option<std::result::Result<PathBuf, String>>;

type InFlight = Arc<Mutex<HashMap<String, watch::Receiver<SharedOutcome>>>>;

/// Our role for one resolve of an uncached URL.
enum Claim {
    /// We perform the download and publish its result.
    Leader(watch::Sender<SharedOutcome>, InFlightGuard),
    /// Someone else is downloading; wait for their result.
    Follower(watch::Receiver<SharedOutcome>),
}

/// Removes the in-flight marker for a URL when dropped, so failed or
/// abandoned downloads never leave the URL stuck.
struct InFlightGuard {
    in_flight: InFlight,
    url: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut map) = self.in_flight.lock() {
            map.remove(&self.url);
        }
    }
}

/// Brackets a wait on the network with observer notifications.
struct DownloadSignal<'a> {
    observer: &'a dyn DownloadObserver,
    url: &'a str,
}

impl<'a> DownloadSignal<'a> {
    fn new(observer: &'a dyn DownloadObserver, url: &'a str) -> Self {
        observer.download_started(url);
        Self { observer, url }
    }
}

impl Drop for DownloadSignal<'_> {
    fn drop(&mut self) {
        self.observer.download_finished(self.url);
    }
}

/// Resolves remote asset URLs to local files, downloading on a miss.
pub struct AssetCache {
    cache_dir: PathBuf,
    downloader: Arc<dyn Downloader>,
    in_flight: InFlight,
    status_map: Arc<RwLock<HashMap<String, DownloadStatus>>>,
}

impl AssetCache {
    /// Creates a cache rooted at `cache_dir`.
    pub fn new<P: AsRef<Path>>(cache_dir: P, downloader: Arc<dyn Downloader>) -> Self {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        if let Err(e) = std::fs::create_dir_all(&cache_dir) {
            // Retried by the first download; reported there if it still fails.
            tracing::warn!("Failed to create cache dir {:?}: {}", cache_dir, e);
        }

        Self {
            cache_dir,
            downloader,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            status_map: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Deterministic local path for a URL.
    pub fn local_path(&self, url: &str) -> Result<PathBuf> {
        cache_file_name(url)
            .map(|name| self.cache_dir.join(name))
            .ok_or_else(|| Error::Download(url.to_string(), "Cannot derive a file name".to_string()))
    }

    /// Returns a local file with the asset's bytes, downloading it if absent.
    ///
    /// `observer` is told when this call starts and stops waiting on the
    /// network. Cache hits never notify it.
    pub async fn resolve(&self, url: &str, observer: &dyn DownloadObserver) -> Result<PathBuf> {
        let path = self.local_path(url)?;

        if is_file(&path).await {
            tracing::debug!("Asset already cached: {}", url);
            return Ok(path);
        }

        match self.claim(url)? {
            Claim::Follower(mut rx) => {
                tracing::debug!("Joining in-flight download: {}", url);
                let _signal = DownloadSignal::new(observer, url);
                let outcome = rx
                    .wait_for(|outcome| outcome.is_some())
                    .await
                    .map_err(|_| Error::Download(url.to_string(), "Download was abandoned".to_string()))?
                    .clone();
                match outcome {
                    Some(Ok(path)) => Ok(path),
                    Some(Err(reason)) => Err(Error::Download(url.to_string(), reason)),
                    None => Err(Error::Download(url.to_string(), "Download was abandoned".to_string())),
                }
            }
            Claim::Leader(tx, _guard) => {
                // Another leader may have finished between our check and our claim.
                if is_file(&path).await {
                    let _ = tx.send(Some(Ok(path.clone())));
                    return Ok(path);
                }

                let _signal = DownloadSignal::new(observer, url);
                self.set_status(url, DownloadStatus::Downloading);

                let result = self.fetch(url, &path).await;
                match &result {
                    Ok(path) => {
                        self.set_status(url, DownloadStatus::Complete { local_path: path.clone() });
                        let _ = tx.send(Some(Ok(path.clone())));
                    }
                    Err(e) => {
                        let reason = download_reason(e);
                        tracing::warn!("Download failed for {}: {}", url, reason);
                        self.set_status(url, DownloadStatus::Failed { error: reason.clone() });
                        let _ = tx.send(Some(Err(reason)));
                    }
                }
                result
            }
        }
    }

    /// Registers this resolve in the in-flight registry.
    fn claim(&self, url: &str) -> Result<Claim> {
        let mut map = self.in_flight.lock().map_err(|_| Error::CacheLock)?;
        if let Some(rx) = map.get(url) {
            return Ok(Claim::Follower(rx.clone()));
        }

        let (tx, rx) = watch::channel(None);
        map.insert(url.to_string(), rx);
        Ok(Claim::Leader(
            tx,
            InFlightGuard {
                in_flight: Arc::clone(&self.in_flight),
                url: url.to_string(),
            },
        ))
    }

    /// Downloads into a `.part` file and moves it into place only once the
    /// transfer is known to be complete.
    async fn fetch(&self, url: &str, path: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let part = part_path(path);

        tracing::info!("Downloading asset: {}", url);
        let report = match self.downloader.download(url, &part).await {
            Ok(report) => report,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(Error::Download(url.to_string(), download_reason(&e)));
            }
        };

        let problem = if report.bytes == 0 {
            Some("Downloaded file is empty".to_string())
        } else {
            match report.expected {
                Some(expected) if expected != report.bytes => Some(format!(
                    "Truncated transfer: got {} of {} bytes",
                    report.bytes, expected
                )),
                _ => None,
            }
        };
        if let Some(problem) = problem {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(Error::Download(url.to_string(), problem));
        }

        tokio::fs::rename(&part, path)
            .await
            .map_err(|e| Error::Download(url.to_string(), format!("Failed to store file: {}", e)))?;

        tracing::info!("Downloaded {} bytes to {:?}", report.bytes, path);
        Ok(path.to_path_buf())
    }

    fn set_status(&self, url: &str, status: DownloadStatus) {
        if let Ok(mut map) = self.status_map.write() {
            map.insert(url.to_string(), status);
        }
    }

    /// Gets the last known download status of a URL.
    pub fn get_status(&self, url: &str) -> Option<DownloadStatus> {
        self.status_map.read().ok()?.get(url).cloned()
    }

    /// Checks if a URL already has a local copy.
    pub fn is_cached(&self, url: &str) -> bool {
        self.local_path(url).map_or(false, |path| path.is_file())
    }

    /// Checks if a URL is currently being downloaded.
    pub fn is_downloading(&self, url: &str) -> bool {
        self.in_flight.lock().map_or(false, |map| map.contains_key(url))
    }

    /// Gets the number of downloads in flight.
    pub fn pending_count(&self) -> usize {
        self.in_flight.lock().map_or(0, |map| map.len())
    }

    /// Removes the cached files of `urls`, along with leftover `.part`
    /// files. Other files in the directory are left alone, as are URLs
    /// still downloading. Returns the number of files removed.
    pub fn clear_cache<'a, I>(&self, urls: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut count = 0;

        for url in urls {
            if self.is_downloading(url) {
                tracing::debug!("Not clearing in-flight asset: {}", url);
                continue;
            }
            let Ok(path) = self.local_path(url) else {
                continue;
            };
            for candidate in [part_path(&path), path] {
                if candidate.is_file() {
                    std::fs::remove_file(&candidate)?;
                    count += 1;
                }
            }
            if let Ok(mut map) = self.status_map.write() {
                map.remove(url);
            }
        }

        tracing::info!("Cleared {} cached files from {:?}", count, self.cache_dir);
        Ok(count)
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.map_or(false, |m| m.is_file())
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

fn download_reason(e: &Error) -> String {
    match e {
        Error::Download(_, reason) => reason.clone(),
        other => other.to_string(),
    }
}

/// Derives the cache file name from a URL's trailing path segment.
///
/// Query and fragment are ignored. Returns `None` when the URL has no usable
/// trailing segment.
pub fn cache_file_name(url: &str) -> Option<String> {
    let without_suffix = url.split(|c| c == '?' || c == '#').next()?;
    let after_scheme = without_suffix
        .split_once("://")
        .map_or(without_suffix, |(_, rest)| rest);
    let (_host, path) = after_scheme.split_once('/')?;
    let segment = path.rsplit('/').next()?;

    let name = sanitize_filename(segment);
    if name.is_empty() || name.chars().all(|c| c == '.') {
        None
    } else {
        Some(name)
    }
}

/// Sanitizes a string for use as a filename.
fn sanitize_filename(name: &str) -> String {
    let mut result = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | ' ' => '_',
            c => c,
        })
        .collect::<String>();

    while result.contains("__") {
        result = result.replace("__", "_");
    }

    result.trim_matches('_').to_string()
}
