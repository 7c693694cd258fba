/// Resolution and loading of in-memory modules.
use async_trait::async_trait;

use crate::args::{LoadResult, Namespace, OnLoadArgs, OnResolveArgs, ResolveResult};
use crate::chain::{ModuleResolver, ResolverChain, ResolverFilter};
use crate::error::ResolveError;
use crate::loader::Loader;
use crate::resolvers::probe_vfs;

pub struct VfsResolver {
    filter: ResolverFilter,
}

impl VfsResolver {
    pub fn new() -> Self {
        VfsResolver {
            filter: ResolverFilter::path(r"^(?:vfs:|virtual:|/|\./|\.\./)"),
        }
    }
}

impl Default for VfsResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleResolver for VfsResolver {
    fn name(&self) -> &'static str {
        "vfs"
    }

    fn filter(&self) -> &ResolverFilter {
        &self.filter
    }

    fn owns_namespace(&self) -> Option<Namespace> {
        Some(Namespace::Vfs)
    }

    async fn on_resolve(
        &self,
        args: &OnResolveArgs,
        chain: &ResolverChain,
    ) -> Result<Option<ResolveResult>, ResolveError> {
        let ctx = chain.ctx();

        let candidate = if let Some(stripped) = vpath::strip_vfs_scheme(&args.path) {
            vpath::normalize(&stripped)
        } else if args.path.starts_with('/') {
            vpath::normalize(&args.path)
        } else {
            // relative specifiers belong to us only when the importer is
            // a VFS module; inside HTTP modules they must fall through
            if args.namespace != Some(Namespace::Vfs) {
                return Ok(None);
            }
            let base_dir = args.resolve_dir.as_deref().unwrap_or("/");
            vpath::resolve(base_dir, &args.path)
        };

        let Some(hit) = probe_vfs(&ctx.filesystem, &ctx.config, &candidate) else {
            return Ok(None);
        };

        let mut plugin_data = args.plugin_data.scope_only();
        plugin_data.vfs_original_specifier = Some(args.path.clone());
        Ok(Some(ResolveResult {
            path: hit,
            namespace: Namespace::Vfs,
            external: false,
            side_effects: None,
            plugin_data,
        }))
    }

    async fn on_load(
        &self,
        args: &OnLoadArgs,
        chain: &ResolverChain,
    ) -> Result<Option<LoadResult>, ResolveError> {
        let Some(contents) = chain.ctx().filesystem.get(&args.path) else {
            return Err(ResolveError::LoadFailed {
                path: args.path.clone(),
                reason: "not present in the virtual filesystem".to_string(),
            });
        };

        // subsequent relative imports root at this file's directory;
        // this is what keeps /a/shared and /b/shared distinct
        let resolve_dir = vpath::dirname(&args.path).to_string();

        let mut plugin_data = args.plugin_data.clone();
        plugin_data.importer = Some(args.path.clone());

        Ok(Some(LoadResult {
            contents: contents.as_ref().clone(),
            loader: Loader::infer(&args.path, None),
            resolve_dir: Some(resolve_dir),
            plugin_data,
        }))
    }
}
