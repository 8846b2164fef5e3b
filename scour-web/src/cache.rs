//! File-per-entry result caches with TTL and a background sweep.
//!
//! Each entry is one `<key>.json` file holding `{"expiresAt": <ms>, "data": ...}`.
//! Reads past `expiresAt`, missing files and unparsable files are all plain
//! misses; the sweep deletes expired and unparsable files. Writes land in a
//! temp file that is renamed over the target, so a reader sees either the
//! previous entry or the new one. Concurrent writers race and the last
//! rename wins. Temp files left behind by an interrupted write are removed
//! by the sweep once they are older than [`ABANDONED_TMP_AGE`].

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use scour_config::CacheSettings;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const MAX_SEMANTIC_KEY: usize = 80;

/// Age past which a temp file can no longer belong to a live write.
pub const ABANDONED_TMP_AGE: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cache encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// How lookup inputs become file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScheme {
    /// blake3 hex of the whole input (URLs).
    Digest,
    /// Sanitized input kept readable (`models_audi`), digested when too long.
    Semantic,
}

#[derive(Serialize)]
struct EntryOut<'a, T: Serialize> {
    #[serde(rename = "expiresAt")]
    expires_at: i64,
    data: &'a T,
}

#[derive(serde::Deserialize)]
struct EntryIn<T> {
    #[serde(rename = "expiresAt")]
    expires_at: i64,
    data: T,
}

#[derive(serde::Deserialize)]
struct EntryHeader {
    #[serde(rename = "expiresAt")]
    expires_at: i64,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// One cache instance: a directory, a TTL and a key scheme.
#[derive(Debug, Clone)]
pub struct FileCache {
    name: String,
    dir: PathBuf,
    ttl: Duration,
    scheme: KeyScheme,
}

impl FileCache {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>, ttl: Duration, scheme: KeyScheme) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            ttl,
            scheme,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// File stem for a lookup input under this instance's scheme.
    pub fn key_for(&self, input: &str) -> String {
        match self.scheme {
            KeyScheme::Digest => blake3::hash(input.as_bytes()).to_hex().to_string(),
            KeyScheme::Semantic => semantic_key(input),
        }
    }

    fn path_for(&self, input: &str) -> PathBuf {
        self.dir.join(format!("{}.json", self.key_for(input)))
    }

    /// Unexpired value for `input`, or `None` on any kind of miss.
    pub async fn read<T: DeserializeOwned>(&self, input: &str) -> Option<T> {
        let path = self.path_for(input);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::debug!(cache = %self.name, path = %path.display(), error = %e, "cache.read.io_error");
                return None;
            }
        };
        match serde_json::from_slice::<EntryIn<T>>(&raw) {
            Ok(entry) if now_ms() < entry.expires_at => {
                tracing::debug!(cache = %self.name, "cache.hit");
                Some(entry.data)
            }
            Ok(_) => {
                tracing::debug!(cache = %self.name, "cache.expired");
                None
            }
            Err(e) => {
                tracing::debug!(cache = %self.name, path = %path.display(), error = %e, "cache.read.corrupt");
                None
            }
        }
    }

    /// Store `value` under `input`, expiring one TTL from now.
    pub async fn write<T: Serialize>(&self, input: &str, value: &T) -> Result<(), CacheError> {
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        let body = serde_json::to_vec(&EntryOut {
            expires_at: now_ms().saturating_add(ttl_ms),
            data: value,
        })?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| CacheError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let target = self.path_for(input);
        let tmp = self
            .dir
            .join(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        if let Err(source) = tokio::fs::write(&tmp, &body).await {
            return Err(CacheError::Io { path: tmp, source });
        }
        if let Err(source) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CacheError::Io {
                path: target,
                source,
            });
        }
        tracing::debug!(cache = %self.name, bytes = body.len(), "cache.write");
        Ok(())
    }

    /// Delete expired and unparsable entries, plus abandoned temp files;
    /// returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return 0,
            Err(e) => {
                tracing::warn!(cache = %self.name, error = %e, "cache.sweep.failed");
                return 0;
            }
        };

        let now = now_ms();
        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(cache = %self.name, error = %e, "cache.sweep.failed");
                    break;
                }
            };
            let path = entry.path();
            if is_temp_file(&path) {
                if is_abandoned(&entry).await && tokio::fs::remove_file(&path).await.is_ok() {
                    tracing::debug!(cache = %self.name, path = %path.display(), "cache.sweep.tmp_removed");
                    removed += 1;
                }
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let stale = match tokio::fs::read(&path).await {
                Ok(raw) => match serde_json::from_slice::<EntryHeader>(&raw) {
                    Ok(header) => now >= header.expires_at,
                    Err(_) => true,
                },
                Err(_) => continue,
            };
            if stale && tokio::fs::remove_file(&path).await.is_ok() {
                removed += 1;
            }
        }
        removed
    }
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') && n.ends_with(".tmp"))
}

async fn is_abandoned(entry: &tokio::fs::DirEntry) -> bool {
    let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) else {
        return false;
    };
    SystemTime::now()
        .duration_since(modified)
        .is_ok_and(|age| age >= ABANDONED_TMP_AGE)
}

/// Replace anything outside `[A-Za-z0-9_-]` with `_`; overlong keys become
/// a 16 hex char digest prefix.
fn semantic_key(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.len() > MAX_SEMANTIC_KEY {
        let hex = blake3::hash(input.as_bytes()).to_hex();
        return hex[..16].to_string();
    }
    cleaned
}

/// The four configured cache instances.
#[derive(Debug, Clone)]
pub struct CacheSet {
    pub page: FileCache,
    pub reference: FileCache,
    pub listing: FileCache,
    pub detail: FileCache,
}

impl CacheSet {
    pub fn from_settings(settings: &CacheSettings) -> Self {
        let make = |name: &str, instance: &scour_config::CacheInstanceSettings, scheme| {
            FileCache::new(name, settings.dir_for(instance, name), instance.ttl(), scheme)
        };
        Self {
            page: make("page", &settings.page, KeyScheme::Digest),
            reference: make("reference", &settings.reference, KeyScheme::Semantic),
            listing: make("listing", &settings.listing, KeyScheme::Digest),
            detail: make("detail", &settings.detail, KeyScheme::Semantic),
        }
    }

    pub fn all(&self) -> Vec<FileCache> {
        vec![
            self.page.clone(),
            self.reference.clone(),
            self.listing.clone(),
            self.detail.clone(),
        ]
    }

    /// Sweep every instance once; returns the total removed.
    pub async fn sweep_all(&self) -> usize {
        sweep_each(&self.all()).await
    }
}

async fn sweep_each(caches: &[FileCache]) -> usize {
    let mut total = 0;
    for cache in caches {
        let removed = cache.sweep().await;
        if removed > 0 {
            tracing::info!(cache = %cache.name(), removed, "cache.sweep");
        }
        total += removed;
    }
    total
}

/// Sweep now and then once per `interval` until `cancel` fires.
pub fn spawn_sweeper(
    caches: Vec<FileCache>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("cache.sweeper.stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = sweep_each(&caches).await;
                    tracing::debug!(removed, "cache.sweep.pass");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache(dir: &TempDir, ttl: Duration, scheme: KeyScheme) -> FileCache {
        FileCache::new("test", dir.path(), ttl, scheme)
    }

    #[tokio::test]
    async fn written_value_reads_back_before_expiry() {
        let dir = TempDir::new().unwrap();
        let c = cache(&dir, Duration::from_secs(600), KeyScheme::Digest);
        let url = "https://catalog.onliner.by/mobile?page=2&sort=price";

        assert_eq!(c.read::<String>(url).await, None);
        c.write(url, &"# Смартфоны".to_string()).await.unwrap();
        assert_eq!(c.read::<String>(url).await.as_deref(), Some("# Смартфоны"));
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss_and_left_for_the_sweep() {
        let dir = TempDir::new().unwrap();
        let c = cache(&dir, Duration::ZERO, KeyScheme::Digest);
        c.write("k", &1u32).await.unwrap();

        assert_eq!(c.read::<u32>("k").await, None);
        assert!(dir.path().join(format!("{}.json", c.key_for("k"))).exists());
        assert_eq!(c.sweep().await, 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(c.sweep().await, 0);
    }

    #[tokio::test]
    async fn corrupt_entry_is_a_miss_and_swept() {
        let dir = TempDir::new().unwrap();
        let c = cache(&dir, Duration::from_secs(60), KeyScheme::Semantic);
        std::fs::write(dir.path().join("brands.json"), b"{\"expiresAt\": 12").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"untouched").unwrap();
        c.write("models_audi", &vec!["A4", "A6"]).await.unwrap();

        assert_eq!(c.read::<Vec<String>>("brands").await, None);
        assert_eq!(c.sweep().await, 1);
        assert!(dir.path().join("notes.txt").exists());
        assert_eq!(
            c.read::<Vec<String>>("models_audi").await,
            Some(vec!["A4".to_string(), "A6".to_string()])
        );
    }

    #[tokio::test]
    async fn sweep_removes_abandoned_temp_files_only() {
        let dir = TempDir::new().unwrap();
        let c = cache(&dir, Duration::from_secs(60), KeyScheme::Digest);
        c.write("live", &"kept").await.unwrap();

        let old = dir.path().join(".0f3a9c.tmp");
        std::fs::write(&old, b"{\"expiresAt\": 9").unwrap();
        std::fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(SystemTime::now() - ABANDONED_TMP_AGE - Duration::from_secs(60))
            .unwrap();
        let fresh = dir.path().join(".b71e20.tmp");
        std::fs::write(&fresh, b"{").unwrap();

        assert_eq!(c.sweep().await, 1);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert_eq!(c.read::<String>("live").await.as_deref(), Some("kept"));
        assert_eq!(c.sweep().await, 0);
    }

    #[tokio::test]
    async fn instances_sharing_a_directory_see_each_other() {
        let dir = TempDir::new().unwrap();
        let a = cache(&dir, Duration::from_secs(60), KeyScheme::Digest);
        let b = cache(&dir, Duration::from_secs(60), KeyScheme::Digest);
        a.write("u", &"first").await.unwrap();
        b.write("u", &"second").await.unwrap();
        assert_eq!(a.read::<String>("u").await.as_deref(), Some("second"));
    }

    #[test]
    fn key_schemes() {
        let c = FileCache::new("x", "/tmp", Duration::ZERO, KeyScheme::Digest);
        let key = c.key_for("https://example.com/?q=1");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|ch| ch.is_ascii_hexdigit()));

        assert_eq!(semantic_key("models_audi"), "models_audi");
        assert_eq!(semantic_key("regions/minsk obl"), "regions_minsk_obl");
        let long = semantic_key(&"x".repeat(81));
        assert_eq!(long.len(), 16);
        assert_eq!(semantic_key(&"x".repeat(80)).len(), 80);
    }

    #[test]
    fn set_uses_configured_directories_and_ttls() {
        let mut settings = CacheSettings::default();
        settings.root = PathBuf::from("/var/cache/scour");
        settings.detail.dir = Some(PathBuf::from("/srv/detail"));
        let set = CacheSet::from_settings(&settings);
        assert_eq!(set.page.dir(), Path::new("/var/cache/scour/page"));
        assert_eq!(set.detail.dir(), Path::new("/srv/detail"));
        assert_eq!(set.reference.ttl(), Duration::from_secs(30 * 24 * 60 * 60));
        assert_eq!(set.listing.ttl(), Duration::from_secs(600));
    }

    #[tokio::test]
    async fn sweeper_runs_immediately_and_stops_on_cancel() {
        let dir = TempDir::new().unwrap();
        let c = cache(&dir, Duration::ZERO, KeyScheme::Digest);
        c.write("a", &"x").await.unwrap();
        c.write("b", &"y").await.unwrap();

        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(vec![c], Duration::from_secs(3600), cancel.clone());
        for _ in 0..100 {
            if std::fs::read_dir(dir.path()).unwrap().count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        cancel.cancel();
        handle.await.unwrap();
    }
}
