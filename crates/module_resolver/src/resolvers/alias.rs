/// Explicit user aliases, applied before anything else looks at the
/// specifier.
use async_trait::async_trait;

use crate::args::{OnResolveArgs, ResolveResult};
use crate::chain::{ModuleResolver, ResolverChain, ResolverFilter};
use crate::error::ResolveError;

pub struct AliasResolver {
    filter: ResolverFilter,
}

impl AliasResolver {
    pub fn new() -> Self {
        AliasResolver {
            filter: ResolverFilter::path(".*"),
        }
    }
}

impl Default for AliasResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleResolver for AliasResolver {
    fn name(&self) -> &'static str {
        "alias"
    }

    fn filter(&self) -> &ResolverFilter {
        &self.filter
    }

    async fn on_resolve(
        &self,
        args: &OnResolveArgs,
        chain: &ResolverChain,
    ) -> Result<Option<ResolveResult>, ResolveError> {
        let aliases = &chain.ctx().config.alias;
        if aliases.is_empty() {
            return Ok(None);
        }
        let Some(first) = aliases.get(&args.path) else {
            return Ok(None);
        };

        // follow transitive aliases, stopping on a cycle
        let mut seen: Vec<&str> = vec![&args.path];
        let mut target: &str = first;
        while let Some(next) = aliases.get(target) {
            if seen.contains(&next.as_str()) || next == target {
                break;
            }
            seen.push(target);
            target = next;
        }

        if target == args.path {
            return Ok(None);
        }

        tracing::debug!("alias '{}' -> '{}'", args.path, target);
        chain
            .resolve_skipping(Some(self.name()), args.rewritten(target.to_string()))
            .await
            .map(Some)
    }
}
