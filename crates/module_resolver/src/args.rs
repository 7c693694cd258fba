/// The typed argument/result records exchanged with resolvers.
use manifest_exports::ImportKind;

use crate::loader::Loader;
use crate::plugin_data::PluginData;

/// Disjoint identity spaces. A module's canonical identity is its
/// `(namespace, path)` pair, byte-for-byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Vfs,
    Http,
    External,
    Cdn,
    Tarball,
}

#[derive(Debug, Clone, Default)]
pub struct OnResolveArgs {
    /// The raw specifier as the importer wrote it.
    pub path: String,
    pub importer: Option<String>,
    pub kind: ImportKind,
    /// Namespace of the importing module.
    pub namespace: Option<Namespace>,
    pub resolve_dir: Option<String>,
    pub plugin_data: PluginData,
}

impl OnResolveArgs {
    pub fn entry(spec: &str) -> Self {
        OnResolveArgs {
            path: spec.to_string(),
            kind: ImportKind::EntryPoint,
            ..Default::default()
        }
    }

    /// A follow-up resolution reusing this hop's surroundings.
    pub fn rewritten(&self, spec: String) -> Self {
        let mut next = self.clone();
        next.path = spec;
        next
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolveResult {
    pub path: String,
    pub namespace: Namespace,
    pub external: bool,
    pub side_effects: Option<bool>,
    pub plugin_data: PluginData,
}

impl ResolveResult {
    pub fn new(namespace: Namespace, path: impl Into<String>) -> Self {
        ResolveResult {
            path: path.into(),
            namespace,
            external: false,
            side_effects: None,
            plugin_data: PluginData::default(),
        }
    }

    /// The canonical `(namespace, path)` identity the bundler caches by.
    pub fn identity(&self) -> (Namespace, &str) {
        (self.namespace, &self.path)
    }
}

#[derive(Debug, Clone)]
pub struct OnLoadArgs {
    pub path: String,
    pub namespace: Namespace,
    pub plugin_data: PluginData,
}

#[derive(Debug, Clone)]
pub struct LoadResult {
    pub contents: Vec<u8>,
    pub loader: Loader,
    /// Directory subsequent relative imports resolve against.
    pub resolve_dir: Option<String>,
    pub plugin_data: PluginData,
}
