/// Orchestrates fetch → detect → extract → mount for tarball URLs.
use std::sync::Arc;
use std::time::SystemTime;

use archive_detect::detect_archive;
use fetch_cache::{FetchCache, FetchOptions};
use futures::FutureExt;
use url::Url;
use vfs::Vfs;

use crate::extract::{extract_tarball, package_root_for_key};
use crate::mount::{stable_key, MountRegistry, TarballError, TarballMount};
use crate::url_parse::{parse_tarball_url, TarballUrlParts};

// how many body bytes the detector peeks at
const SNIFF_BYTES: usize = 1024;

pub struct TarballEngine {
    registry: MountRegistry,
    fetch: Arc<FetchCache>,
}

impl TarballEngine {
    pub fn new(fetch: Arc<FetchCache>) -> Self {
        Self {
            registry: MountRegistry::new(),
            fetch,
        }
    }

    pub fn registry(&self) -> &MountRegistry {
        &self.registry
    }

    /// The mount owning a VFS path, for self-reference routing.
    pub fn find_mount_for_path(&self, vfs_path: &str) -> Option<Arc<TarballMount>> {
        self.registry.find_by_path(vfs_path)
    }

    /// Ensures the package behind a tarball URL is mounted, returning the
    /// mount and the parsed URL parts (whose `subpath` addresses the
    /// requested file).
    pub async fn mount(
        &self,
        raw_url: &str,
        fs: &Arc<Vfs>,
    ) -> Result<(Arc<TarballMount>, TarballUrlParts), Arc<TarballError>> {
        let url = Url::parse(raw_url).map_err(|e| {
            Arc::new(TarballError::InvalidUrl {
                url: raw_url.to_string(),
                reason: e.to_string(),
            })
        })?;
        let parts = parse_tarball_url(&url).map_err(Arc::new)?;
        if let Some(note) = &parts.heuristic {
            tracing::debug!("{}: {}", raw_url, note);
        }

        let package_url =
            Url::parse(&parts.package_url).map_err(|e| {
                Arc::new(TarballError::InvalidUrl {
                    url: parts.package_url.clone(),
                    reason: e.to_string(),
                })
            })?;
        let key = stable_key(&package_url);

        let mount = self
            .registry
            .ensure(&key, || {
                let fetch = self.fetch.clone();
                let fs = fs.clone();
                let source_url = parts.package_url.clone();
                let key = key.clone();
                async move {
                    tracing::debug!("extracting {} (key {})", source_url, key);
                    let response = fetch
                        .fetch(&source_url, FetchOptions::default())
                        .await
                        .map_err(TarballError::from)?;
                    let prefix = &response.body[..response.body.len().min(SNIFF_BYTES)];
                    let summary =
                        detect_archive(Some(&response.final_url), &response.headers, prefix);
                    let manifest =
                        extract_tarball(&response.body, &summary, &source_url, &key, &fs)?;
                    Ok(TarballMount {
                        created_at: SystemTime::now(),
                        package_root: package_root_for_key(&key),
                        manifest: Arc::new(manifest),
                        source_url,
                    })
                }
                .boxed()
            })
            .await?;

        Ok((mount, parts))
    }

    /// Forgets every mount (bundle teardown).
    pub fn clear(&self) {
        self.registry.clear();
    }
}
