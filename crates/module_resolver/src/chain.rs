/// The ordered resolver chain: first non-pass answer wins, loads are
/// namespace-scoped.
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use regex::Regex;

use crate::args::{LoadResult, Namespace, OnLoadArgs, OnResolveArgs, ResolveResult};
use crate::context::ResolverContext;
use crate::error::ResolveError;
use crate::resolvers;

/// Which specifiers a resolver will even look at: a regex over the raw
/// specifier, plus an optional gate on the importer's namespace.
pub struct ResolverFilter {
    pub regex: Regex,
    pub namespace: Option<Namespace>,
}

impl ResolverFilter {
    pub fn path(pattern: &str) -> Self {
        ResolverFilter {
            // filter patterns are static strings; a bad one is a bug
            regex: Regex::new(pattern).expect("invalid resolver filter pattern"),
            namespace: None,
        }
    }

    pub fn path_in_namespace(pattern: &str, namespace: Namespace) -> Self {
        ResolverFilter {
            regex: Regex::new(pattern).expect("invalid resolver filter pattern"),
            namespace: Some(namespace),
        }
    }

    pub fn matches(&self, args: &OnResolveArgs) -> bool {
        if let Some(gate) = self.namespace {
            if args.namespace != Some(gate) {
                return false;
            }
        }
        self.regex.is_match(&args.path)
    }
}

/// One link in the chain. `on_resolve`/`on_load` return `Ok(None)` to
/// pass the question along.
#[async_trait]
pub trait ModuleResolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn filter(&self) -> &ResolverFilter;

    /// The namespace this resolver loads, if it owns one.
    fn owns_namespace(&self) -> Option<Namespace> {
        None
    }

    async fn on_resolve(
        &self,
        args: &OnResolveArgs,
        chain: &ResolverChain,
    ) -> Result<Option<ResolveResult>, ResolveError>;

    async fn on_load(
        &self,
        _args: &OnLoadArgs,
        _chain: &ResolverChain,
    ) -> Result<Option<LoadResult>, ResolveError> {
        Ok(None)
    }
}

pub struct ResolverChain {
    resolvers: Vec<Box<dyn ModuleResolver>>,
    ctx: ResolverContext,
}

impl ResolverChain {
    /// The recommended order: explicit overrides first, externals before
    /// anything network-shaped, tarball interception ahead of the generic
    /// HTTP resolver, CDN as the bare-import catch-all.
    pub fn with_default_resolvers(ctx: ResolverContext) -> Self {
        ResolverChain {
            resolvers: vec![
                Box::new(resolvers::alias::AliasResolver::new()),
                Box::new(resolvers::external::ExternalResolver::new()),
                Box::new(resolvers::tarball::TarballResolver::new()),
                Box::new(resolvers::vfs_resolver::VfsResolver::new()),
                Box::new(resolvers::http::HttpResolver::new()),
                Box::new(resolvers::cdn::CdnResolver::new()),
            ],
            ctx,
        }
    }

    pub fn new(resolvers: Vec<Box<dyn ModuleResolver>>, ctx: ResolverContext) -> Self {
        ResolverChain { resolvers, ctx }
    }

    pub fn ctx(&self) -> &ResolverContext {
        &self.ctx
    }

    /// Runs the chain for one specifier. Boxed so resolvers can re-enter
    /// the chain (alias rewrites, URL dependencies) recursively.
    pub fn resolve<'a>(
        &'a self,
        args: OnResolveArgs,
    ) -> BoxFuture<'a, Result<ResolveResult, ResolveError>> {
        self.resolve_skipping(None, args)
    }

    /// Like [`ResolverChain::resolve`], but a resolver re-entering the
    /// chain with a rewritten specifier can exclude itself by name.
    pub fn resolve_skipping<'a>(
        &'a self,
        skip: Option<&'static str>,
        args: OnResolveArgs,
    ) -> BoxFuture<'a, Result<ResolveResult, ResolveError>> {
        async move {
            for resolver in &self.resolvers {
                if skip == Some(resolver.name()) {
                    continue;
                }
                if !resolver.filter().matches(&args) {
                    continue;
                }
                tracing::trace!("trying {} for '{}'", resolver.name(), args.path);
                if let Some(result) = resolver.on_resolve(&args, self).await? {
                    tracing::debug!(
                        "{} resolved '{}' -> {:?}:{}",
                        resolver.name(),
                        args.path,
                        result.namespace,
                        result.path
                    );
                    return Ok(result);
                }
            }
            Err(ResolveError::Unresolved {
                spec: args.path,
                importer: args.importer,
            })
        }
        .boxed()
    }

    /// Loads a resolved module. Only the namespace's owner is asked.
    pub async fn load(&self, args: OnLoadArgs) -> Result<LoadResult, ResolveError> {
        for resolver in &self.resolvers {
            if resolver.owns_namespace() != Some(args.namespace) {
                continue;
            }
            if let Some(result) = resolver.on_load(&args, self).await? {
                return Ok(result);
            }
        }
        Err(ResolveError::LoadFailed {
            path: args.path,
            reason: format!("no loader owns namespace {:?}", args.namespace),
        })
    }

    /// Resolve-then-load in one step.
    pub async fn resolve_and_load(
        &self,
        args: OnResolveArgs,
    ) -> Result<(ResolveResult, LoadResult), ResolveError> {
        let resolved = self.resolve(args).await?;
        let loaded = self
            .load(OnLoadArgs {
                path: resolved.path.clone(),
                namespace: resolved.namespace,
                plugin_data: resolved.plugin_data.clone(),
            })
            .await?;
        Ok((resolved, loaded))
    }
}
