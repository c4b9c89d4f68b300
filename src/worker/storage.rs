//! Named cache buckets holding request/response pairs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use super::http::{Request, Response};
use crate::error::{Error, Result};

/// Abstraction over the cache storage substrate.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Creates the named cache if it does not exist yet.
    async fn open(&self, cache: &str) -> Result<()>;

    /// Stores `response` for `request` in the named cache, creating it if needed.
    async fn put(&self, cache: &str, request: &Request, response: &Response) -> Result<()>;

    /// Looks `request` up in one named cache.
    async fn lookup(&self, cache: &str, request: &Request) -> Result<Option<Response>>;

    /// Names of all caches, oldest first.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Deletes the named cache. Returns false if it did not exist.
    async fn delete(&self, cache: &str) -> Result<bool>;

    /// Looks `request` up in every cache, returning the first hit.
    ///
    /// A cache that fails the lookup is logged and skipped.
    async fn match_request(&self, request: &Request) -> Result<Option<Response>> {
        for cache in self.keys().await? {
            match self.lookup(&cache, request).await {
                Ok(Some(response)) => return Ok(Some(response)),
                Ok(None) => {}
                Err(e) => log::warn!("Lookup in cache {cache} failed: {e}"),
            }
        }
        Ok(None)
    }
}

/// In-memory cache storage; caches are kept in creation order.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    caches: RwLock<Vec<(String, HashMap<String, Response>)>>,
}

impl MemoryCacheStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in the named cache, or `None` if it does not exist.
    pub async fn len(&self, cache: &str) -> Option<usize> {
        self.caches
            .read()
            .await
            .iter()
            .find(|(name, _)| name == cache)
            .map(|(_, entries)| entries.len())
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, cache: &str) -> Result<()> {
        let mut caches = self.caches.write().await;
        if !caches.iter().any(|(name, _)| name == cache) {
            caches.push((cache.to_string(), HashMap::new()));
        }
        Ok(())
    }

    async fn put(&self, cache: &str, request: &Request, response: &Response) -> Result<()> {
        let mut caches = self.caches.write().await;
        let index = match caches.iter().position(|(name, _)| name == cache) {
            Some(index) => index,
            None => {
                caches.push((cache.to_string(), HashMap::new()));
                caches.len() - 1
            }
        };
        caches[index]
            .1
            .insert(request.cache_key(), response.clone());
        Ok(())
    }

    async fn lookup(&self, cache: &str, request: &Request) -> Result<Option<Response>> {
        Ok(self
            .caches
            .read()
            .await
            .iter()
            .find(|(name, _)| name == cache)
            .and_then(|(_, entries)| entries.get(&request.cache_key()).cloned()))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .caches
            .read()
            .await
            .iter()
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn delete(&self, cache: &str) -> Result<bool> {
        let mut caches = self.caches.write().await;
        let before = caches.len();
        caches.retain(|(name, _)| name != cache);
        Ok(caches.len() != before)
    }
}

/// Metadata line at the head of each entry file.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    url: String,
    #[serde(flatten)]
    response: Response,
}

/// Suffix counter for in-flight entry files.
static NEXT_PART: AtomicU64 = AtomicU64::new(0);

/// Disk-backed cache storage using `tokio::fs`.
///
/// Layout: `<root>/<cache>/<sha256(url)>.entry` holds one compact JSON line
/// with the URL, status and headers, followed by the raw body. Each put
/// writes its own `.part` file and renames it over the entry, so readers see
/// either the old entry or the new one, and concurrent puts to one key
/// resolve to a single writer's complete entry.
#[derive(Debug, Clone)]
pub struct DiskCacheStorage {
    root: PathBuf,
}

impl DiskCacheStorage {
    /// Creates a storage rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this storage.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cache_dir(&self, cache: &str) -> PathBuf {
        self.root.join(urlencoding::encode(cache).as_ref())
    }

    fn entry_path(&self, cache: &str, request: &Request) -> PathBuf {
        let digest = Sha256::digest(request.cache_key().as_bytes());
        self.cache_dir(cache).join(format!("{digest:x}.entry"))
    }
}

fn part_path(entry: &Path) -> PathBuf {
    let n = NEXT_PART.fetch_add(1, Ordering::Relaxed);
    entry.with_extension(format!("{}-{n}.part", std::process::id()))
}

fn encode_entry(url: String, response: &Response) -> Result<Vec<u8>> {
    let entry = StoredEntry {
        url,
        response: response.clone(),
    };
    let mut out = serde_json::to_vec(&entry)?;
    out.push(b'\n');
    out.extend_from_slice(&response.body);
    Ok(out)
}

fn decode_entry(raw: Vec<u8>) -> Result<(String, Response)> {
    let raw = Bytes::from(raw);
    let split = raw
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| Error::Storage("entry has no metadata line".to_string()))?;
    let entry: StoredEntry = serde_json::from_slice(&raw[..split])?;
    let response = Response {
        body: raw.slice(split + 1..),
        ..entry.response
    };
    Ok((entry.url, response))
}

fn storage_error(context: &str, e: &std::io::Error) -> Error {
    Error::Storage(format!("{context}: {e}"))
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, cache: &str) -> Result<()> {
        tokio::fs::create_dir_all(self.cache_dir(cache))
            .await
            .map_err(|e| storage_error("create cache", &e))
    }

    async fn put(&self, cache: &str, request: &Request, response: &Response) -> Result<()> {
        self.open(cache).await?;
        let path = self.entry_path(cache, request);
        let data = encode_entry(request.cache_key(), response)?;

        let part = part_path(&path);
        if let Err(e) = tokio::fs::write(&part, &data).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(storage_error("write entry", &e));
        }
        if let Err(e) = tokio::fs::rename(&part, &path).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(storage_error("commit entry", &e));
        }
        Ok(())
    }

    async fn lookup(&self, cache: &str, request: &Request) -> Result<Option<Response>> {
        let raw = match tokio::fs::read(self.entry_path(cache, request)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error("read entry", &e)),
        };
        let (url, response) = decode_entry(raw)?;
        Ok((url == request.cache_key()).then_some(response))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_error("list caches", &e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| storage_error("list caches", &e))?
        {
            let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
            if !is_dir {
                continue;
            }
            let raw = entry.file_name();
            let raw = raw.to_string_lossy();
            match urlencoding::decode(&raw) {
                Ok(name) => names.push(name.into_owned()),
                Err(_) => log::warn!("Skipping undecodable cache directory {raw}"),
            }
        }
        // Generation names end in a creation timestamp, so name order is age order
        // within one prefix.
        names.sort();
        Ok(names)
    }

    async fn delete(&self, cache: &str) -> Result<bool> {
        match tokio::fs::remove_dir_all(self.cache_dir(cache)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(storage_error("delete cache", &e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(path: &str) -> Request {
        Request::parse(&format!("https://trip.example{path}")).unwrap()
    }

    fn page(body: &'static str) -> Response {
        Response::new(200, body).with_header("content-type", "text/html")
    }

    #[tokio::test]
    async fn memory_put_and_lookup() {
        let storage = MemoryCacheStorage::new();
        storage.put("gen-1", &request("/index.html"), &page("hello")).await.unwrap();

        let hit = storage.lookup("gen-1", &request("/index.html")).await.unwrap().unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"hello"));
        assert!(storage.lookup("gen-1", &request("/other.html")).await.unwrap().is_none());
        assert!(storage.lookup("gen-2", &request("/index.html")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_keys_keep_creation_order() {
        let storage = MemoryCacheStorage::new();
        storage.open("b").await.unwrap();
        storage.open("a").await.unwrap();
        storage.open("b").await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn memory_match_request_searches_all_caches() {
        let storage = MemoryCacheStorage::new();
        storage.open("old").await.unwrap();
        storage.put("new", &request("/app.js"), &page("js")).await.unwrap();
        let hit = storage.match_request(&request("/app.js")).await.unwrap();
        assert_eq!(hit.unwrap().body, Bytes::from_static(b"js"));
    }

    #[tokio::test]
    async fn memory_delete() {
        let storage = MemoryCacheStorage::new();
        storage.open("gen-1").await.unwrap();
        assert!(storage.delete("gen-1").await.unwrap());
        assert!(!storage.delete("gen-1").await.unwrap());
        assert_eq!(storage.len("gen-1").await, None);
    }

    #[tokio::test]
    async fn memory_put_overwrites_same_key() {
        let storage = MemoryCacheStorage::new();
        storage.put("gen", &request("/a.css"), &page("one")).await.unwrap();
        storage.put("gen", &request("/a.css#x"), &page("two")).await.unwrap();
        assert_eq!(storage.len("gen").await, Some(1));
    }

    #[tokio::test]
    async fn disk_put_and_lookup() {
        let dir = TempDir::new().unwrap();
        let storage = DiskCacheStorage::new(dir.path());
        storage.put("gen-1", &request("/index.html"), &page("hello")).await.unwrap();

        let hit = storage.lookup("gen-1", &request("/index.html")).await.unwrap().unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.header("content-type"), Some("text/html"));
        assert_eq!(hit.body, Bytes::from_static(b"hello"));
        assert!(storage.lookup("gen-1", &request("/nope.html")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn disk_keys_and_delete() {
        let dir = TempDir::new().unwrap();
        let storage = DiskCacheStorage::new(dir.path());
        assert!(storage.keys().await.unwrap().is_empty());

        storage.open("trip-v4-2").await.unwrap();
        storage.open("trip-v4-1").await.unwrap();
        std::fs::write(dir.path().join("stray.txt"), b"x").unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["trip-v4-1", "trip-v4-2"]);

        assert!(storage.delete("trip-v4-1").await.unwrap());
        assert!(!storage.delete("trip-v4-1").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["trip-v4-2"]);
    }

    #[tokio::test]
    async fn disk_survives_reopen() {
        let dir = TempDir::new().unwrap();
        DiskCacheStorage::new(dir.path())
            .put("gen", &request("/icon.png"), &Response::new(200, vec![1u8, 2, 3]))
            .await
            .unwrap();

        let reopened = DiskCacheStorage::new(dir.path());
        let hit = reopened.match_request(&request("/icon.png")).await.unwrap().unwrap();
        assert_eq!(hit.body.as_ref(), &[1, 2, 3]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn disk_concurrent_puts_to_one_key_keep_one_writer() {
        let dir = TempDir::new().unwrap();
        let storage = std::sync::Arc::new(DiskCacheStorage::new(dir.path()));

        for round in 0..50 {
            let puts = (0..4).map(|writer| {
                let storage = std::sync::Arc::clone(&storage);
                tokio::spawn(async move {
                    let body = format!("writer-{writer}-").repeat(4096);
                    let response = Response::new(200, body)
                        .with_header("x-writer", writer.to_string());
                    storage.put("gen", &request("/app.js"), &response).await
                })
            });
            for result in futures::future::join_all(puts).await {
                result.unwrap().unwrap();
            }

            let hit = storage.lookup("gen", &request("/app.js")).await.unwrap().unwrap();
            let writer = hit.header("x-writer").unwrap();
            let expected = format!("writer-{writer}-").repeat(4096);
            assert_eq!(hit.body, Bytes::from(expected), "round {round}");
        }

        let leftovers: Vec<_> = std::fs::read_dir(storage.cache_dir("gen"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "part"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn disk_match_request_skips_unreadable_cache() {
        let dir = TempDir::new().unwrap();
        let storage = DiskCacheStorage::new(dir.path());
        storage.put("trip-v4-2", &request("/index.html"), &page("good")).await.unwrap();

        storage.open("trip-v4-1").await.unwrap();
        std::fs::write(storage.entry_path("trip-v4-1", &request("/index.html")), b"garbage").unwrap();
        assert!(storage.lookup("trip-v4-1", &request("/index.html")).await.is_err());

        let hit = storage.match_request(&request("/index.html")).await.unwrap().unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"good"));
    }

    #[tokio::test]
    async fn disk_cache_names_are_escaped() {
        let dir = TempDir::new().unwrap();
        let storage = DiskCacheStorage::new(dir.path());
        storage.open("odd/name").await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["odd/name"]);
    }
}
