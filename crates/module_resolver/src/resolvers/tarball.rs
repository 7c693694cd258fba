/// Intercepts package-tarball URLs ahead of the generic HTTP resolver
/// and routes self-references inside extracted mounts.
use std::sync::Arc;

use async_trait::async_trait;
use cdn_urls::CdnStyle;
use manifest::Browser;
use manifest_exports::{resolve_package_entry, EntryOptions};
use tarball_mount::TarballMount;

use crate::args::{Namespace, OnResolveArgs, ResolveResult};
use crate::chain::{ModuleResolver, ResolverChain, ResolverFilter};
use crate::context::ResolverContext;
use crate::error::ResolveError;
use crate::plugin_data::PluginData;
use crate::resolvers::probe_vfs;

pub struct TarballResolver {
    filter: ResolverFilter,
}

impl TarballResolver {
    pub fn new() -> Self {
        TarballResolver {
            filter: ResolverFilter::path(".*"),
        }
    }
}

impl Default for TarballResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves a subpath inside a mount through the manifest's exports and
/// the VFS probe, yielding the module's VFS identity.
pub(crate) fn resolve_in_mount(
    ctx: &ResolverContext,
    mount: &Arc<TarballMount>,
    subpath: &str,
    args: &OnResolveArgs,
) -> Result<Option<ResolveResult>, ResolveError> {
    let pkg = &mount.manifest;
    let conditions = ctx.config.conditions_for(args.kind);
    let browser_is_string_entry = matches!(pkg.browser, Some(Browser::Str(_)));
    let legacy_fields = ctx.config.legacy_fields(&conditions, browser_is_string_entry);

    let entry = resolve_package_entry(
        pkg,
        subpath,
        &EntryOptions {
            conditions: &conditions,
            legacy_fields: &legacy_fields,
            allow_literal_subpath: true,
        },
    )?;

    if entry.excluded {
        return Ok(Some(ResolveResult {
            path: args.path.clone(),
            namespace: Namespace::External,
            external: true,
            side_effects: Some(false),
            plugin_data: PluginData::default(),
        }));
    }

    let Some(rel) = entry.path else {
        return Ok(None);
    };
    let candidate = vpath::join(&mount.package_root, rel.trim_start_matches("./"));
    let Some(hit) = probe_vfs(&ctx.filesystem, &ctx.config, &candidate) else {
        return Ok(None);
    };

    let side_effects = ctx.side_effects_for(pkg, &rel);
    Ok(Some(ResolveResult {
        path: hit,
        namespace: Namespace::Vfs,
        external: false,
        side_effects,
        plugin_data: PluginData {
            manifest: Some(pkg.clone()),
            package_root: Some(mount.package_root.clone()),
            tarball_url: Some(mount.source_url.clone()),
            ..Default::default()
        },
    }))
}

/// The mount the importer belongs to, if any.
fn importer_mount(ctx: &ResolverContext, args: &OnResolveArgs) -> Option<Arc<TarballMount>> {
    if let Some(root) = &args.plugin_data.package_root {
        if let Some(mount) = ctx.tarballs.find_mount_for_path(root) {
            return Some(mount);
        }
    }
    args.importer
        .as_deref()
        .and_then(|importer| ctx.tarballs.find_mount_for_path(importer))
}

#[async_trait]
impl ModuleResolver for TarballResolver {
    fn name(&self) -> &'static str {
        "tarball"
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

        // direct tarball URLs
        if vpath::is_http_url(&args.path) {
            if cdn_urls::cdn_style(&args.path) != CdnStyle::Tarball {
                return Ok(None);
            }
            let (mount, parts) = ctx
                .tarballs
                .mount(&args.path, &ctx.filesystem)
                .await
                .map_err(ResolveError::from)?;
            let subpath = if parts.subpath.is_empty() {
                ".".to_string()
            } else {
                format!("./{}", parts.subpath)
            };
            return resolve_in_mount(ctx, &mount, &subpath, args);
        }

        // self-reference: a module inside a mount importing its own
        // package by name resolves within the same mount
        if vpath::is_bare_import(&args.path) {
            if let Some(mount) = importer_mount(ctx, args) {
                let name = mount.manifest.name();
                let subpath = if args.path == name {
                    Some(".".to_string())
                } else {
                    args.path
                        .strip_prefix(name)
                        .and_then(|rest| rest.strip_prefix('/'))
                        .map(|rest| format!("./{}", rest))
                };
                if let Some(subpath) = subpath {
                    tracing::debug!(
                        "self-reference '{}' inside mount {}",
                        args.path,
                        mount.package_root
                    );
                    return resolve_in_mount(ctx, &mount, &subpath, args);
                }
            }
        }

        Ok(None)
    }
}
