/// The record threaded across resolution hops.
///
/// This is deliberately a closed set of typed fields rather than a bag:
/// each one exists to let a later hop finish what an earlier hop started
/// (relative resolution inside HTTP modules, self-reference inside
/// tarball mounts, peer-version convergence).
use std::sync::Arc;

use manifest::{DependencyMap, PackageManifest};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginData {
    /// Manifest of the package the importer belongs to.
    pub manifest: Option<Arc<PackageManifest>>,
    /// The importer's own identity path.
    pub importer: Option<String>,
    /// Final URL of the importer after redirects; relative imports inside
    /// HTTP modules resolve against this, not the address bar URL.
    pub url: Option<String>,
    /// Mount root when the importer lives inside an extracted tarball.
    pub package_root: Option<String>,
    /// Source URL of that mount.
    pub tarball_url: Option<String>,
    /// The original specifier before VFS scheme-stripping/probing.
    pub vfs_original_specifier: Option<String>,
    /// Stabilized peer-dependency versions for the subgraph below here.
    pub peer_dependencies: Option<DependencyMap>,
}

impl PluginData {
    /// Carries forward only the fields that describe the package scope,
    /// dropping per-module ones.
    pub fn scope_only(&self) -> Self {
        PluginData {
            manifest: self.manifest.clone(),
            package_root: self.package_root.clone(),
            tarball_url: self.tarball_url.clone(),
            peer_dependencies: self.peer_dependencies.clone(),
            importer: None,
            url: None,
            vfs_original_specifier: None,
        }
    }
}
