/// Resolution and loading of modules addressed by URL.
use async_trait::async_trait;
use fetch_cache::{probe_extensions, FetchOptions};
use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

use crate::args::{LoadResult, Namespace, OnLoadArgs, OnResolveArgs, ResolveResult};
use crate::chain::{ModuleResolver, ResolverChain, ResolverFilter};
use crate::context::AssetRecord;
use crate::error::ResolveError;
use crate::loader::Loader;

lazy_static! {
    // the asset reference idiom bundlers preserve:
    // `new URL("./worker.js", import.meta.url)`
    static ref ASSET_RE: Regex =
        Regex::new(r#"new\s+URL\(\s*["']([^"')]+)["']\s*,\s*import\.meta\.url\s*\)"#).unwrap();
}

pub struct HttpResolver {
    filter: ResolverFilter,
}

impl HttpResolver {
    pub fn new() -> Self {
        HttpResolver {
            filter: ResolverFilter::path(r"^(?:https?://|/|\./|\.\./)"),
        }
    }
}

impl Default for HttpResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// The VFS path HTTP module bytes are mirrored at: `/<host><pathname>`.
fn derived_vfs_path(url: &Url) -> String {
    format!("/{}{}", url.host_str().unwrap_or("unknown-host"), url.path())
}

#[async_trait]
impl ModuleResolver for HttpResolver {
    fn name(&self) -> &'static str {
        "http"
    }

    fn filter(&self) -> &ResolverFilter {
        &self.filter
    }

    fn owns_namespace(&self) -> Option<Namespace> {
        Some(Namespace::Http)
    }

    async fn on_resolve(
        &self,
        args: &OnResolveArgs,
        _chain: &ResolverChain,
    ) -> Result<Option<ResolveResult>, ResolveError> {
        // direct URLs, from anywhere
        if vpath::is_http_url(&args.path) {
            return Ok(Some(ResolveResult {
                path: args.path.clone(),
                namespace: Namespace::Http,
                external: false,
                side_effects: None,
                plugin_data: args.plugin_data.scope_only(),
            }));
        }

        // relative/absolute specifiers are only ours inside HTTP modules
        if args.namespace != Some(Namespace::Http) {
            return Ok(None);
        }

        // resolve against the importer's *final* URL, so siblings of a
        // redirected `@latest` land on the pinned version
        let base = args
            .plugin_data
            .url
            .as_deref()
            .or(args.importer.as_deref())
            .ok_or_else(|| ResolveError::Unresolved {
                spec: args.path.clone(),
                importer: args.importer.clone(),
            })?;
        let base = Url::parse(base).map_err(|_| ResolveError::Unresolved {
            spec: args.path.clone(),
            importer: args.importer.clone(),
        })?;
        let joined = vpath::url_join(&base, &args.path).map_err(|_| ResolveError::Unresolved {
            spec: args.path.clone(),
            importer: args.importer.clone(),
        })?;

        Ok(Some(ResolveResult {
            path: joined.to_string(),
            namespace: Namespace::Http,
            external: false,
            side_effects: None,
            plugin_data: args.plugin_data.scope_only(),
        }))
    }

    async fn on_load(
        &self,
        args: &OnLoadArgs,
        chain: &ResolverChain,
    ) -> Result<Option<LoadResult>, ResolveError> {
        let ctx = chain.ctx();
        let response = probe_extensions(&ctx.fetch, &args.path, FetchOptions::default()).await?;
        let final_url = Url::parse(&response.final_url).map_err(|e| ResolveError::LoadFailed {
            path: args.path.clone(),
            reason: format!("unparseable final URL '{}': {}", response.final_url, e),
        })?;

        // mirror the module into the VFS under host + pathname
        let vfs_path = derived_vfs_path(&final_url);
        ctx.filesystem.set(&vfs_path, response.body.clone());

        let loader = Loader::infer(final_url.path(), response.content_type());

        // referenced assets: fetch and pin each one
        if matches!(loader, Loader::Js | Loader::Jsx | Loader::Ts | Loader::Tsx) {
            let source = String::from_utf8_lossy(&response.body);
            for capture in ASSET_RE.captures_iter(&source) {
                let reference = &capture[1];
                let Ok(asset_url) = vpath::url_join(&final_url, reference) else {
                    continue;
                };
                let asset_key = asset_url.to_string();
                if ctx.assets.contains_key(&asset_key) {
                    continue;
                }
                match ctx.fetch.fetch(&asset_key, FetchOptions::default()).await {
                    Ok(asset) => {
                        let asset_vfs_path = derived_vfs_path(&asset_url);
                        ctx.filesystem.set(&asset_vfs_path, asset.body.clone());
                        let digest = hex::encode(Sha256::digest(&asset.body));
                        ctx.assets.insert(
                            asset_key.clone(),
                            AssetRecord {
                                url: asset_key,
                                vfs_path: asset_vfs_path,
                                sha256: digest,
                            },
                        );
                    }
                    Err(e) => {
                        // assets are best-effort; the module still loads
                        tracing::debug!("asset fetch {} failed: {}", asset_key, e);
                    }
                }
            }
        }

        let mut plugin_data = args.plugin_data.scope_only();
        plugin_data.importer = Some(args.path.clone());
        plugin_data.url = Some(response.final_url.clone());

        Ok(Some(LoadResult {
            contents: response.body.clone(),
            loader,
            resolve_dir: None,
            plugin_data,
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chain::ResolverChain;
    use crate::config::BundleConfig;
    use crate::context::ResolverContext;
    use crate::plugin_data::PluginData;
    use crate::test_support::MapServer;
    use fetch_cache::FetchCache;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn chain_with(server: Arc<MapServer>) -> ResolverChain {
        let fetch = Arc::new(FetchCache::new(server));
        let ctx = ResolverContext::with_fetch(BundleConfig::default(), fetch);
        ResolverChain::new(vec![Box::new(HttpResolver::new())], ctx)
    }

    #[tokio::test]
    async fn test_direct_url_resolves_to_http_namespace() {
        let chain = chain_with(Arc::new(MapServer::new()));
        let resolved = chain
            .resolve(OnResolveArgs::entry("https://unpkg.com/react@18/index.js"))
            .await
            .unwrap();
        assert_eq!(resolved.namespace, Namespace::Http);
        assert_eq!(resolved.path, "https://unpkg.com/react@18/index.js");
    }

    #[tokio::test]
    async fn test_relative_resolves_against_final_url() {
        let chain = chain_with(Arc::new(MapServer::new()));
        // importer was requested as @latest but redirected to @4.17.21;
        // siblings must resolve against the pinned URL
        let args = OnResolveArgs {
            path: "./fp.js".to_string(),
            importer: Some("https://unpkg.com/lodash@latest/lodash.js".to_string()),
            namespace: Some(Namespace::Http),
            plugin_data: PluginData {
                url: Some("https://unpkg.com/lodash@4.17.21/lodash.js".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let resolved = chain.resolve(args).await.unwrap();
        assert_eq!(resolved.path, "https://unpkg.com/lodash@4.17.21/fp.js");
    }

    #[tokio::test]
    async fn test_absolute_path_replaces_pathname() {
        let chain = chain_with(Arc::new(MapServer::new()));
        let args = OnResolveArgs {
            path: "/other/module.js".to_string(),
            namespace: Some(Namespace::Http),
            plugin_data: PluginData {
                url: Some("https://esm.sh/react@18.2.0/index.js".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let resolved = chain.resolve(args).await.unwrap();
        assert_eq!(resolved.path, "https://esm.sh/other/module.js");
    }

    #[tokio::test]
    async fn test_load_probes_stores_and_reports_final_url() {
        let server = Arc::new(MapServer::new());
        server.redirect(
            "https://unpkg.com/lodash@latest/lodash",
            "https://unpkg.com/lodash@4.17.21/lodash.js",
            "module.exports = _;",
        );
        let chain = chain_with(server);

        let loaded = chain
            .load(OnLoadArgs {
                path: "https://unpkg.com/lodash@latest/lodash".to_string(),
                namespace: Namespace::Http,
                plugin_data: Default::default(),
            })
            .await
            .unwrap();
        assert_eq!(loaded.loader, Loader::Js);
        assert_eq!(
            loaded.plugin_data.url.as_deref(),
            Some("https://unpkg.com/lodash@4.17.21/lodash.js")
        );
        // mirrored into the VFS under host + pathname
        assert!(chain
            .ctx()
            .filesystem
            .exists("/unpkg.com/lodash@4.17.21/lodash.js"));
    }

    #[tokio::test]
    async fn test_load_discovers_referenced_assets() {
        let server = Arc::new(MapServer::new());
        server.ok(
            "https://host/pkg/main.js",
            r#"const worker = new URL("./worker.js", import.meta.url);"#,
        );
        server.ok("https://host/pkg/worker.js", "onmessage = () => {};");
        let chain = chain_with(server);

        chain
            .load(OnLoadArgs {
                path: "https://host/pkg/main.js".to_string(),
                namespace: Namespace::Http,
                plugin_data: Default::default(),
            })
            .await
            .unwrap();

        let assets = chain.ctx().assets.clone();
        assert_eq!(assets.len(), 1);
        let record = assets.get("https://host/pkg/worker.js").unwrap().clone();
        assert_eq!(record.vfs_path, "/host/pkg/worker.js");
        assert_eq!(record.sha256.len(), 64);
        assert!(chain.ctx().filesystem.exists("/host/pkg/worker.js"));
    }
}
