/// Bare-import resolution through registry metadata and conditional
/// exports; also the home of JSR resolution and subpath imports.
use std::sync::Arc;

use async_trait::async_trait;
use fetch_cache::{probe_extensions, FetchOptions, HttpMethod};
use hashbrown::HashMap;
use indexmap::IndexMap;
use manifest::{Browser, DependencyMap, PackageManifest};
use manifest_exports::{resolve_imports, resolve_package_entry, EntryOptions, Matched};
use serde::Deserialize;
use specifier::{build_package_spec, parse_dep_spec, parse_jsr_spec, parse_package_name, DepSpec, JsrSpec};

use crate::args::{Namespace, OnResolveArgs, ResolveResult};
use crate::chain::{ModuleResolver, ResolverChain, ResolverFilter};
use crate::context::ResolverContext;
use crate::error::ResolveError;
use crate::plugin_data::PluginData;

pub struct CdnResolver {
    filter: ResolverFilter,
}

impl CdnResolver {
    pub fn new() -> Self {
        CdnResolver {
            filter: ResolverFilter::path(".*"),
        }
    }
}

impl Default for CdnResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// A module deliberately emptied out (browser-field `false`, exports
/// `null`): external and side-effect free, so it bundles to nothing.
fn disabled_result(spec: &str) -> ResolveResult {
    ResolveResult {
        path: spec.to_string(),
        namespace: Namespace::External,
        external: true,
        side_effects: Some(false),
        plugin_data: PluginData::default(),
    }
}

/// Peer versions for the subgraph below a freshly-resolved package:
/// initial peers layered over the package's own, a self-entry injected
/// for cyclic packages, and every entry pinned to the root's version
/// when the root declares one.
fn stabilize_peers(
    initial: Option<&PackageManifest>,
    resolved: &PackageManifest,
) -> DependencyMap {
    let mut merged = resolved.peer_dependencies.clone().unwrap_or_default();
    if let Some(initial) = initial {
        if let Some(initial_peers) = &initial.peer_dependencies {
            merged.extend(initial_peers.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
    merged.insert(resolved.name().to_string(), resolved.version().to_string());
    if let Some(initial) = initial {
        let pinned = initial.flattened_dependencies();
        for (name, version) in merged.iter_mut() {
            if let Some(pin) = pinned.get(name) {
                *version = pin.clone();
            }
        }
    }
    merged
}

// jsr.io meta.json
#[derive(Debug, Deserialize)]
struct JsrPackageMeta {
    versions: HashMap<String, JsrVersionInfo>,
}

#[derive(Debug, Deserialize, Default)]
struct JsrVersionInfo {
    #[serde(default)]
    yanked: bool,
}

// jsr.io <version>_meta.json
#[derive(Debug, Deserialize)]
struct JsrVersionMeta {
    exports: IndexMap<String, String>,
}

fn select_jsr_version(meta: &JsrPackageMeta, requested: Option<&str>) -> Option<String> {
    let mut versions: Vec<semver::Version> = meta
        .versions
        .iter()
        .filter(|(_, info)| !info.yanked)
        .filter_map(|(v, _)| semver::Version::parse(v).ok())
        .collect();
    versions.sort();

    match requested {
        None => versions.last().map(ToString::to_string),
        Some(requested) => {
            if let Ok(exact) = semver::Version::parse(requested) {
                if versions.contains(&exact) {
                    return Some(requested.to_string());
                }
            }
            let range = semver::VersionReq::parse(requested).ok()?;
            versions
                .iter()
                .rev()
                .find(|v| range.matches(v))
                .map(ToString::to_string)
        }
    }
}

impl CdnResolver {
    /// JSR resolution: registry metadata first, esm.sh proxy on any
    /// failure past the (strict) parse.
    async fn resolve_jsr(
        &self,
        raw: &str,
        ctx: &ResolverContext,
    ) -> Result<ResolveResult, ResolveError> {
        let spec = parse_jsr_spec(raw)?;
        match self.resolve_jsr_direct(&spec, ctx).await {
            Ok(url) => {
                let mut result = ResolveResult::new(Namespace::Http, url.clone());
                result.plugin_data.url = Some(url);
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(
                    "direct jsr resolution of '{}' failed ({}); falling back to the esm.sh proxy",
                    raw,
                    e
                );
                let proxy = cdn_urls::jsr_esm_proxy_url(
                    &spec.package_name(),
                    spec.version.as_deref(),
                    &spec.subpath,
                );
                Ok(ResolveResult::new(Namespace::Http, proxy))
            }
        }
    }

    async fn resolve_jsr_direct(
        &self,
        spec: &JsrSpec,
        ctx: &ResolverContext,
    ) -> Result<String, ResolveError> {
        let meta_url = cdn_urls::jsr_meta_url(&spec.scope, &spec.name);
        let response = ctx.fetch.fetch(&meta_url, FetchOptions::default()).await?;
        let meta: JsrPackageMeta =
            serde_json::from_slice(&response.body).map_err(|e| ResolveError::LoadFailed {
                path: meta_url.clone(),
                reason: format!("unparseable registry metadata: {}", e),
            })?;

        let version = select_jsr_version(&meta, spec.version.as_deref()).ok_or_else(|| {
            ResolveError::LoadFailed {
                path: meta_url,
                reason: format!(
                    "no published version matches '{}'",
                    spec.version.as_deref().unwrap_or("*")
                ),
            }
        })?;

        let vmeta_url = cdn_urls::jsr_version_meta_url(&spec.scope, &spec.name, &version);
        let response = ctx.fetch.fetch(&vmeta_url, FetchOptions::default()).await?;
        let vmeta: JsrVersionMeta =
            serde_json::from_slice(&response.body).map_err(|e| ResolveError::LoadFailed {
                path: vmeta_url.clone(),
                reason: format!("unparseable version metadata: {}", e),
            })?;

        let entry_subpath = spec.entry_subpath();
        let file = vmeta
            .exports
            .get(entry_subpath.as_str())
            .ok_or_else(|| ResolveError::LoadFailed {
                path: vmeta_url,
                reason: format!("version {} exports nothing at '{}'", version, entry_subpath),
            })?;

        Ok(cdn_urls::jsr_module_url(&spec.scope, &spec.name, &version, file))
    }

    /// Exact-version resolution against the configured CDN: fetch the
    /// manifest, pick the entry, construct and probe the module URL.
    async fn resolve_registry(
        &self,
        name: &str,
        version: &str,
        subpath: &str,
        args: &OnResolveArgs,
        ctx: &ResolverContext,
        initial: Option<&PackageManifest>,
    ) -> Result<Option<ResolveResult>, ResolveError> {
        let origin = &ctx.host;

        // manifest candidates: the package root, plus a directory-subpath
        // variant for extensionless subpaths that may be nested packages
        let mut candidates: Vec<(String, String, String)> = vec![(
            format!("{}/{}@{}/package.json", origin, name, version),
            subpath.to_string(),
            String::new(),
        )];
        if !subpath.is_empty() && vpath::extension(subpath).is_none() {
            candidates.push((
                format!("{}/{}@{}/{}/package.json", origin, name, version, subpath),
                String::new(),
                format!("/{}", subpath),
            ));
        }

        let mut found: Option<(Arc<PackageManifest>, String, String)> = None;
        let mut first_err: Option<ResolveError> = None;
        for (manifest_url, effective_subpath, url_prefix) in candidates {
            if ctx.failed_manifest_urls.contains_key(&manifest_url) {
                continue;
            }
            if let Some(cached) = ctx.cached_manifest(&manifest_url) {
                found = Some((cached, effective_subpath, url_prefix));
                break;
            }
            match ctx.fetch.fetch(&manifest_url, FetchOptions::default()).await {
                Ok(response) => {
                    let pkg = Arc::new(PackageManifest::parse_lenient(
                        &response.body,
                        &manifest_url,
                    ));
                    ctx.store_manifest(&manifest_url, pkg.clone());
                    found = Some((pkg, effective_subpath, url_prefix));
                    break;
                }
                Err(e) => {
                    ctx.failed_manifest_urls.insert(manifest_url, ());
                    first_err.get_or_insert(ResolveError::Fetch(e));
                }
            }
        }

        let Some((pkg, effective_subpath, url_prefix)) = found else {
            return Err(first_err.unwrap_or_else(|| ResolveError::Unresolved {
                spec: args.path.clone(),
                importer: args.importer.clone(),
            }));
        };

        // the fetched manifest pins the exact version "@latest" & friends
        // resolved to
        let resolved_version = pkg.version().to_string();

        let conditions = ctx.config.conditions_for(args.kind);
        let browser_is_string_entry = matches!(pkg.browser, Some(Browser::Str(_)));
        let legacy_fields = ctx.config.legacy_fields(&conditions, browser_is_string_entry);
        let entry = resolve_package_entry(
            &pkg,
            &effective_subpath,
            &EntryOptions {
                conditions: &conditions,
                legacy_fields: &legacy_fields,
                allow_literal_subpath: true,
            },
        )?;

        if entry.excluded {
            return Ok(Some(disabled_result(&args.path)));
        }
        let rel = entry.path.unwrap_or_else(|| "./index.js".to_string());

        let module_url = cdn_urls::cdn_module_url(
            origin,
            name,
            &resolved_version,
            &format!("{}/{}", url_prefix, rel.trim_start_matches("./")),
        );
        // existence probe only; the loader fetches the bytes later
        let probe_opts = FetchOptions {
            method: HttpMethod::Head,
            ..Default::default()
        };
        let response = probe_extensions(&ctx.fetch, &module_url, probe_opts).await?;

        let side_effects = ctx.side_effects_for(&pkg, &rel);
        let peers = stabilize_peers(initial, &pkg);

        Ok(Some(ResolveResult {
            path: response.final_url.clone(),
            namespace: Namespace::Http,
            external: false,
            side_effects,
            plugin_data: PluginData {
                manifest: Some(pkg),
                url: Some(response.final_url.clone()),
                peer_dependencies: Some(peers),
                ..Default::default()
            },
        }))
    }
}

#[async_trait]
impl ModuleResolver for CdnResolver {
    fn name(&self) -> &'static str {
        "cdn"
    }

    fn filter(&self) -> &ResolverFilter {
        &self.filter
    }

    async fn on_resolve(
        &self,
        args: &OnResolveArgs,
        chain: &ResolverChain,
    ) -> Result<Option<ResolveResult>, ResolveError> {
        let ctx = chain.ctx();
        let spec = args.path.as_str();

        // only bare-ish specifiers are ours
        if spec.starts_with('/')
            || vpath::is_relative_import(spec)
            || vpath::is_http_url(spec)
            || spec.starts_with("vfs:")
            || spec.starts_with("virtual:")
            || spec.starts_with("data:")
        {
            return Ok(None);
        }

        if spec.starts_with("jsr:") {
            return self.resolve_jsr(spec, ctx).await.map(Some);
        }

        let initial = ctx.config.package_json.as_ref();
        let inherited = args.plugin_data.manifest.clone();
        let current = inherited.as_deref().or(initial);

        let mut working = spec.strip_prefix("npm:").unwrap_or(spec).to_string();

        // subpath imports resolve against the current manifest and then
        // continue as a pinned bare specifier
        if working.starts_with('#') {
            let Some(pkg) = current else {
                return Err(ResolveError::Unresolved {
                    spec: args.path.clone(),
                    importer: args.importer.clone(),
                });
            };
            let imports = pkg.imports.as_ref().ok_or_else(|| ResolveError::Unresolved {
                spec: args.path.clone(),
                importer: args.importer.clone(),
            })?;
            let conditions = ctx.config.conditions_for(args.kind);
            let mut matched = resolve_imports(imports, &working, &conditions)?;
            if matched.is_none() && !conditions.require {
                matched = resolve_imports(imports, &working, &conditions.with_require())?;
            }
            match matched {
                Some(Matched::Path(target)) => {
                    // "./src/x.ts" -> "<name>@<version>/src/x.ts"
                    working = format!(
                        "{}@{}{}",
                        pkg.name(),
                        pkg.version(),
                        target.trim_start_matches('.')
                    );
                    tracing::debug!("subpath import '{}' -> '{}'", spec, working);
                }
                Some(Matched::Excluded) => return Ok(Some(disabled_result(spec))),
                None => {
                    return Err(ResolveError::Unresolved {
                        spec: args.path.clone(),
                        importer: args.importer.clone(),
                    })
                }
            }
        }

        if !vpath::is_bare_import(&working) {
            return Ok(None);
        }

        let parsed = parse_package_name(&working)?;

        // flattened dependency map: the importing package's entries,
        // overridden by anything the root config forces
        let mut dep_map = inherited
            .as_deref()
            .map(PackageManifest::flattened_dependencies)
            .unwrap_or_default();
        if let Some(initial) = initial {
            dep_map.extend(initial.flattened_dependencies());
        }

        let version_str = parsed
            .version
            .clone()
            .or_else(|| dep_map.get(&parsed.name).cloned())
            .or_else(|| {
                args.plugin_data
                    .peer_dependencies
                    .as_ref()
                    .and_then(|peers| peers.get(&parsed.name).cloned())
            })
            .unwrap_or_else(|| "latest".to_string());

        match parse_dep_spec(&parsed.name, &version_str) {
            DepSpec::Url { url } => {
                // hand URL dependencies back to the chain so the tarball
                // engine can intercept package-tarball hosts
                let mut result = chain
                    .resolve_skipping(Some(self.name()), args.rewritten(url))
                    .await?;
                if let Some(pkg) = result.plugin_data.manifest.clone() {
                    result.plugin_data.peer_dependencies =
                        Some(stabilize_peers(initial, &pkg));
                }
                Ok(Some(result))
            }
            DepSpec::Alias { target } => {
                let subpath = if target.path.is_empty() {
                    parsed.subpath.clone()
                } else if parsed.subpath.is_empty() {
                    target.path.clone()
                } else {
                    format!("{}/{}", target.path, parsed.subpath)
                };
                let rewritten =
                    build_package_spec(&target.name, target.version.as_deref(), &subpath);
                tracing::debug!("alias spec '{}' -> '{}'", working, rewritten);
                chain.resolve(args.rewritten(rewritten)).await.map(Some)
            }
            DepSpec::Semver | DepSpec::Version | DepSpec::Tag => {
                self.resolve_registry(&parsed.name, &version_str, &parsed.subpath, args, ctx, initial)
                    .await
            }
            unsupported => Err(ResolveError::UnsupportedSpec {
                kind: unsupported.kind(),
                package: parsed.name.clone(),
                raw: version_str,
            }),
        }
    }
}
