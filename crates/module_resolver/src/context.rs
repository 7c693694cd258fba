/// Shared state threaded into every resolver.
use std::num::NonZeroUsize;
use std::sync::Arc;

use dashmap::DashMap;
use fetch_cache::{FetchCache, ReqwestTransport};
use lru::LruCache;
use manifest::PackageManifest;
use manifest_exports::SideEffectsMatcher;
use parking_lot::Mutex;
use tarball_mount::TarballEngine;
use vfs::Vfs;

use crate::config::BundleConfig;

// package manifests kept hot per bundle
const MANIFEST_CACHE_CAPACITY: usize = 200;

/// An asset discovered while loading an HTTP module
/// (`new URL("...", import.meta.url)`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub url: String,
    pub vfs_path: String,
    pub sha256: String,
}

/// Every cache and store the resolvers share. Cloning the handle is
/// cheap and aliases the same state; [`ResolverContext::with`] narrows a
/// clone without touching siblings.
#[derive(Clone)]
pub struct ResolverContext {
    pub filesystem: Arc<Vfs>,
    pub config: Arc<BundleConfig>,
    /// Default CDN origin modules resolve against.
    pub host: String,
    pub fetch: Arc<FetchCache>,
    pub tarballs: Arc<TarballEngine>,
    /// Sink for referenced assets, keyed by source URL.
    pub assets: Arc<DashMap<String, AssetRecord>>,
    pub package_manifests: Arc<Mutex<LruCache<String, Arc<PackageManifest>>>>,
    /// Negative cache: manifest URLs that already failed this bundle.
    pub failed_manifest_urls: Arc<DashMap<String, ()>>,
    /// Compiled sideEffects matchers keyed by package identity.
    pub side_effects_matchers: Arc<DashMap<String, Arc<Option<SideEffectsMatcher>>>>,
}

/// Field overrides for [`ResolverContext::with`].
#[derive(Default)]
pub struct ContextOverrides {
    pub filesystem: Option<Arc<Vfs>>,
    pub config: Option<Arc<BundleConfig>>,
    pub host: Option<String>,
}

impl ResolverContext {
    pub fn new(config: BundleConfig) -> Self {
        let fetch = Arc::new(FetchCache::new(Arc::new(ReqwestTransport::new())));
        Self::with_fetch(config, fetch)
    }

    /// Builds a context around an existing fetch cache (tests inject a
    /// scripted transport through here).
    pub fn with_fetch(config: BundleConfig, fetch: Arc<FetchCache>) -> Self {
        let host = config
            .cdn_origin()
            .unwrap_or_else(|_| "https://unpkg.com".to_string());
        ResolverContext {
            filesystem: Arc::new(Vfs::new()),
            config: Arc::new(config),
            host,
            tarballs: Arc::new(TarballEngine::new(fetch.clone())),
            fetch,
            assets: Arc::new(DashMap::new()),
            package_manifests: Arc::new(Mutex::new(LruCache::new(
                NonZeroUsize::new(MANIFEST_CACHE_CAPACITY).unwrap(),
            ))),
            failed_manifest_urls: Arc::new(DashMap::new()),
            side_effects_matchers: Arc::new(DashMap::new()),
        }
    }

    /// A narrowed clone: the listed fields are replaced, everything else
    /// keeps aliasing the shared state.
    pub fn with(&self, overrides: ContextOverrides) -> Self {
        let mut narrowed = self.clone();
        if let Some(filesystem) = overrides.filesystem {
            narrowed.filesystem = filesystem;
        }
        if let Some(config) = overrides.config {
            narrowed.config = config;
        }
        if let Some(host) = overrides.host {
            narrowed.host = host;
        }
        narrowed
    }

    /// The side-effect hint for a file in a package, going through the
    /// per-package compiled matcher cache.
    pub fn side_effects_for(
        &self,
        pkg: &PackageManifest,
        package_relative_path: &str,
    ) -> Option<bool> {
        let matcher = self
            .side_effects_matchers
            .entry(pkg.id())
            .or_insert_with(|| {
                Arc::new(
                    pkg.side_effects
                        .as_ref()
                        .and_then(SideEffectsMatcher::compile),
                )
            })
            .clone();
        matcher
            .as_ref()
            .as_ref()
            .and_then(|m| m.evaluate(package_relative_path))
    }

    pub fn cached_manifest(&self, url: &str) -> Option<Arc<PackageManifest>> {
        self.package_manifests.lock().get(url).cloned()
    }

    pub fn store_manifest(&self, url: &str, pkg: Arc<PackageManifest>) {
        self.package_manifests.lock().put(url.to_string(), pkg);
    }

    /// Bundle teardown: the VFS and every per-bundle cache empties.
    pub fn clear(&self) {
        self.filesystem.clear();
        self.assets.clear();
        self.package_manifests.lock().clear();
        self.failed_manifest_urls.clear();
        self.side_effects_matchers.clear();
        self.tarballs.clear();
    }
}
