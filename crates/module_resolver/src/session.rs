/// One bundle's resolution session: a configured chain plus the
/// per-bundle lifecycle of the stores behind it.
use std::sync::Arc;

use fetch_cache::FetchCache;
use manifest_exports::ImportKind;

use crate::args::{LoadResult, Namespace, OnLoadArgs, OnResolveArgs, ResolveResult};
use crate::chain::ResolverChain;
use crate::config::BundleConfig;
use crate::context::ResolverContext;
use crate::error::ResolveError;

pub struct BundleSession {
    chain: ResolverChain,
}

impl BundleSession {
    pub fn new(config: BundleConfig) -> Self {
        BundleSession {
            chain: ResolverChain::with_default_resolvers(ResolverContext::new(config)),
        }
    }

    /// A session over an existing fetch cache (shared across bundles, or
    /// scripted in tests). Only the VFS and per-bundle caches are fresh.
    pub fn with_fetch(config: BundleConfig, fetch: Arc<FetchCache>) -> Self {
        BundleSession {
            chain: ResolverChain::with_default_resolvers(ResolverContext::with_fetch(
                config, fetch,
            )),
        }
    }

    pub fn chain(&self) -> &ResolverChain {
        &self.chain
    }

    pub fn ctx(&self) -> &ResolverContext {
        self.chain.ctx()
    }

    /// Seeds a user source file into the virtual filesystem.
    pub fn add_source(&self, path: &str, contents: impl Into<Vec<u8>>) {
        self.ctx().filesystem.set(path, contents);
    }

    /// Resolves one of the bundle's entry points.
    pub async fn resolve_entry(&self, spec: &str) -> Result<ResolveResult, ResolveError> {
        self.chain.resolve(OnResolveArgs::entry(spec)).await
    }

    /// Resolves an import found while loading a module, threading the
    /// loaded module's surroundings into the next hop.
    pub async fn resolve_import(
        &self,
        spec: &str,
        kind: ImportKind,
        importer: &ResolveResult,
        loaded: &LoadResult,
    ) -> Result<ResolveResult, ResolveError> {
        self.chain
            .resolve(OnResolveArgs {
                path: spec.to_string(),
                importer: Some(importer.path.clone()),
                kind,
                namespace: Some(importer.namespace),
                resolve_dir: loaded.resolve_dir.clone(),
                plugin_data: loaded.plugin_data.clone(),
            })
            .await
    }

    pub async fn load(&self, resolved: &ResolveResult) -> Result<LoadResult, ResolveError> {
        self.chain
            .load(OnLoadArgs {
                path: resolved.path.clone(),
                namespace: resolved.namespace,
                plugin_data: resolved.plugin_data.clone(),
            })
            .await
    }

    /// Whether a result needs loading at all (externals don't).
    pub fn is_loadable(resolved: &ResolveResult) -> bool {
        !resolved.external && resolved.namespace != Namespace::External
    }

    /// Bundle teardown: empties the VFS, the mounts, and every
    /// per-bundle cache. The fetch cache survives for the next session.
    pub fn finish(&self) {
        self.ctx().clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::{gzipped_tarball, MapServer};
    use pretty_assertions::assert_eq;

    fn session_with(server: Arc<MapServer>) -> BundleSession {
        BundleSession::with_fetch(BundleConfig::default(), Arc::new(FetchCache::new(server)))
    }

    #[tokio::test]
    async fn test_source_to_import_walk() {
        let session = session_with(Arc::new(MapServer::new()));
        session.add_source("/src/index.tsx", r#"import "./app";"#);
        session.add_source("/src/app.ts", "export const app = 1;");

        let entry = session.resolve_entry("/src/index.tsx").await.unwrap();
        let loaded = session.load(&entry).await.unwrap();
        let import = session
            .resolve_import("./app", ImportKind::ImportStatement, &entry, &loaded)
            .await
            .unwrap();
        assert_eq!(import.path, "/src/app.ts");
        assert_eq!(import.namespace, Namespace::Vfs);
    }

    #[tokio::test]
    async fn test_finish_clears_the_bundle_state() {
        let server = Arc::new(MapServer::new());
        server.binary(
            "https://pkg.pr.new/demo@1",
            gzipped_tarball(&[
                (
                    "package/package.json",
                    r#"{ "name": "demo", "version": "1.0.0", "main": "./index.js" }"#,
                ),
                ("package/index.js", "x"),
            ]),
        );
        let session = session_with(server);
        session.add_source("/src/index.ts", "import 'demo';");

        session
            .resolve_entry("https://pkg.pr.new/demo@1")
            .await
            .unwrap();
        assert!(!session.ctx().filesystem.is_empty());

        session.finish();
        assert!(session.ctx().filesystem.is_empty());
        assert!(session.ctx().tarballs.registry().is_empty());
        assert_eq!(session.ctx().assets.len(), 0);
    }

    #[tokio::test]
    async fn test_externals_are_not_loadable() {
        let mut config = BundleConfig::default();
        config.polyfill = false;
        let session = BundleSession::with_fetch(
            config,
            Arc::new(FetchCache::new(Arc::new(MapServer::new()))),
        );

        let resolved = session.resolve_entry("node:fs").await.unwrap();
        assert!(resolved.external);
        assert!(!BundleSession::is_loadable(&resolved));
    }
}
