/// Mount records and the at-most-once extraction registry.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use manifest::PackageManifest;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum TarballError {
    #[error("'{url}' is not a package tarball URL: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error(transparent)]
    Archive(#[from] archive_detect::ArchiveError),
    #[error("unsupported tarball wrapper '{wrapper}': {diagnostic}")]
    UnsupportedCompression { wrapper: String, diagnostic: String },
    #[error("failed reading tar stream from {url}: {message}")]
    TarRead { url: String, message: String },
    #[error(transparent)]
    Fetch(#[from] fetch_cache::FetchError),
}

/// An extracted tarball installed into the VFS.
#[derive(Debug, Clone)]
pub struct TarballMount {
    pub created_at: SystemTime,
    /// `/__tarballs__/<key>`
    pub package_root: String,
    pub manifest: Arc<PackageManifest>,
    pub source_url: String,
}

impl TarballMount {
    /// Whether a VFS path lives inside this mount.
    pub fn contains(&self, vfs_path: &str) -> bool {
        vfs_path
            .strip_prefix(&self.package_root)
            .map(|rest| rest.is_empty() || rest.starts_with('/'))
            .unwrap_or(false)
    }
}

/// Content-address for a tarball source URL: fragment dropped, query
/// pairs sorted, sha-256 truncated to 16 hex chars.
pub fn stable_key(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);

    let mut pairs: Vec<(String, String)> = normalized
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        normalized.set_query(None);
    } else {
        pairs.sort();
        let query = pairs
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    k.clone()
                } else {
                    format!("{}={}", k, v)
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        normalized.set_query(Some(&query));
    }

    let digest = Sha256::digest(normalized.as_str().as_bytes());
    hex::encode(digest)[..16].to_string()
}

type MountResult = Result<Arc<TarballMount>, Arc<TarballError>>;
type InflightFuture = Shared<BoxFuture<'static, MountResult>>;

/// One mount per stable key; one extraction in flight per key.
#[derive(Default)]
pub struct MountRegistry {
    mounts: DashMap<String, Arc<TarballMount>>,
    inflight: Mutex<HashMap<String, InflightFuture>>,
}

impl MountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<TarballMount>> {
        self.mounts.get(key).map(|m| m.clone())
    }

    /// The mount owning a VFS path, if any.
    pub fn find_by_path(&self, vfs_path: &str) -> Option<Arc<TarballMount>> {
        self.mounts
            .iter()
            .find(|entry| entry.value().contains(vfs_path))
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    pub fn inflight_len(&self) -> usize {
        self.inflight.lock().len()
    }

    /// Returns the existing mount for `key`, or runs `create` to build
    /// it. Concurrent callers for one key await a single extraction; a
    /// failed extraction is forgotten so a later call can retry.
    pub async fn ensure<F>(&self, key: &str, create: F) -> MountResult
    where
        F: FnOnce() -> BoxFuture<'static, Result<TarballMount, TarballError>>,
    {
        if let Some(existing) = self.get(key) {
            return Ok(existing);
        }

        let pending: InflightFuture = {
            let mut inflight = self.inflight.lock();
            // somebody may have installed the mount while we waited
            if let Some(existing) = self.get(key) {
                return Ok(existing);
            }
            match inflight.get(key) {
                Some(pending) => pending.clone(),
                None => {
                    let fut: InflightFuture = create()
                        .map(|result| result.map(Arc::new).map_err(Arc::new))
                        .boxed()
                        .shared();
                    inflight.insert(key.to_string(), fut.clone());
                    fut
                }
            }
        };

        let result = pending.await;

        {
            let mut inflight = self.inflight.lock();
            if let Ok(mount) = &result {
                self.mounts
                    .entry(key.to_string())
                    .or_insert_with(|| mount.clone());
            }
            inflight.remove(key);
        }

        result
    }

    /// Drops every mount. Extractions still in flight keep running but
    /// will install nothing a future bundle can see.
    pub fn clear(&self) {
        self.mounts.clear();
        self.inflight.lock().clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn mount_named(name: &str) -> TarballMount {
        TarballMount {
            created_at: SystemTime::UNIX_EPOCH,
            package_root: format!("/__tarballs__/{}", name),
            manifest: Arc::new(PackageManifest::fallback()),
            source_url: format!("https://host/{}", name),
        }
    }

    #[test]
    fn test_stable_key_normalization() {
        let plain = stable_key(&Url::parse("https://host/pkg@1?a=1&b=2").unwrap());
        let sorted = stable_key(&Url::parse("https://host/pkg@1?b=2&a=1").unwrap());
        let fragment = stable_key(&Url::parse("https://host/pkg@1?a=1&b=2#frag").unwrap());
        assert_eq!(plain, sorted);
        assert_eq!(plain, fragment);
        assert_eq!(plain.len(), 16);

        let other = stable_key(&Url::parse("https://host/pkg@2?a=1&b=2").unwrap());
        assert_ne!(plain, other);
    }

    #[test]
    fn test_mount_contains() {
        let mount = mount_named("abc");
        assert!(mount.contains("/__tarballs__/abc"));
        assert!(mount.contains("/__tarballs__/abc/package.json"));
        assert!(!mount.contains("/__tarballs__/abcdef/x.js"));
        assert!(!mount.contains("/other"));
    }

    #[tokio::test]
    async fn test_ensure_runs_extraction_exactly_once() {
        let registry = Arc::new(MountRegistry::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let make = |registry: &Arc<MountRegistry>, runs: &Arc<AtomicUsize>| {
            let registry = registry.clone();
            let runs = runs.clone();
            async move {
                registry
                    .ensure("k", move || {
                        async move {
                            runs.fetch_add(1, Ordering::SeqCst);
                            // yield so concurrent callers pile up
                            tokio::task::yield_now().await;
                            Ok(mount_named("k"))
                        }
                        .boxed()
                    })
                    .await
            }
        };

        let (a, b, c) = tokio::join!(
            make(&registry, &runs),
            make(&registry, &runs),
            make(&registry, &runs)
        );
        let a = a.unwrap();
        assert_eq!(a.package_root, b.unwrap().package_root);
        assert_eq!(a.package_root, c.unwrap().package_root);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        // post-conditions: exactly one mount, nothing in flight
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.inflight_len(), 0);
    }

    #[tokio::test]
    async fn test_failed_extraction_permits_retry() {
        let registry = MountRegistry::new();

        let err = registry
            .ensure("k", || {
                async {
                    Err(TarballError::TarRead {
                        url: "https://host/k".to_string(),
                        message: "truncated".to_string(),
                    })
                }
                .boxed()
            })
            .await
            .unwrap_err();
        assert!(matches!(*err, TarballError::TarRead { .. }));
        assert_eq!(registry.inflight_len(), 0);
        assert!(registry.is_empty());

        // the failure was not cached
        let mount = registry
            .ensure("k", || async { Ok(mount_named("k")) }.boxed())
            .await
            .unwrap();
        assert_eq!(mount.package_root, "/__tarballs__/k");
    }

    #[tokio::test]
    async fn test_existing_mount_short_circuits() {
        let registry = MountRegistry::new();
        registry
            .ensure("k", || async { Ok(mount_named("k")) }.boxed())
            .await
            .unwrap();

        // the factory must not run again
        let mount = registry
            .ensure("k", || {
                async { panic!("extraction ran for an existing mount") }.boxed()
            })
            .await
            .unwrap();
        assert_eq!(mount.source_url, "https://host/k");
    }

    #[test]
    fn test_find_by_path() {
        let registry = MountRegistry::new();
        registry
            .mounts
            .insert("abc".to_string(), Arc::new(mount_named("abc")));
        assert!(registry.find_by_path("/__tarballs__/abc/lib/x.js").is_some());
        assert!(registry.find_by_path("/src/index.ts").is_none());
    }
}
