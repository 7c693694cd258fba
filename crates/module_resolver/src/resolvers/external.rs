/// Config externals and node builtins, handled before any network
/// resolver can claim them.
use async_trait::async_trait;
use manifest_exports::Platform;

use crate::args::{Namespace, OnResolveArgs, ResolveResult};
use crate::builtins::is_node_builtin;
use crate::chain::{ModuleResolver, ResolverChain, ResolverFilter};
use crate::error::ResolveError;

pub struct ExternalResolver {
    filter: ResolverFilter,
}

impl ExternalResolver {
    pub fn new() -> Self {
        ExternalResolver {
            filter: ResolverFilter::path(".*"),
        }
    }
}

impl Default for ExternalResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_external(patterns: &[String], spec: &str) -> bool {
    patterns.iter().any(|p| {
        p == spec
            || spec
                .strip_prefix(p.as_str())
                .map(|rest| rest.starts_with('/'))
                .unwrap_or(false)
    })
}

fn external_result(args: &OnResolveArgs) -> ResolveResult {
    ResolveResult {
        path: args.path.clone(),
        namespace: Namespace::External,
        external: true,
        side_effects: None,
        plugin_data: args.plugin_data.scope_only(),
    }
}

#[async_trait]
impl ModuleResolver for ExternalResolver {
    fn name(&self) -> &'static str {
        "external"
    }

    fn filter(&self) -> &ResolverFilter {
        &self.filter
    }

    async fn on_resolve(
        &self,
        args: &OnResolveArgs,
        chain: &ResolverChain,
    ) -> Result<Option<ResolveResult>, ResolveError> {
        let config = &chain.ctx().config;
        // the "node:" prefix is stripped before external matching
        let stripped = args.path.strip_prefix("node:").unwrap_or(&args.path);

        if matches_external(&config.external, &args.path)
            || matches_external(&config.external, stripped)
        {
            return Ok(Some(external_result(args)));
        }

        if is_node_builtin(stripped) {
            match config.platform {
                // node keeps its own builtins
                Platform::Node => return Ok(Some(external_result(args))),
                Platform::Browser | Platform::Neutral => {
                    if !config.polyfill {
                        return Ok(Some(external_result(args)));
                    }
                    // shim the builtin from the CDN's node compatibility
                    // layer and let the HTTP resolver take it from there
                    let shim = format!("https://esm.sh/node/{}.js", stripped.replace('/', "_"));
                    tracing::debug!("polyfilling '{}' via {}", args.path, shim);
                    return chain
                        .resolve_skipping(Some(self.name()), args.rewritten(shim))
                        .await
                        .map(Some);
                }
            }
        }

        Ok(None)
    }
}
