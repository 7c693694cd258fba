/// Extension probing for extensionless module URLs.
use std::sync::Arc;

use crate::cache::{FetchCache, FetchOptions};
use crate::transport::{FetchError, HttpMethod, HttpResponse};


// probe order is significant: ".ts" before ".cjs" reflects the
// TypeScript-first audience of the CDNs this talks to
pub static PROBE_EXTENSIONS: &[&str] = &[
    "", ".js", ".mjs", ".ts", ".tsx", ".cjs", ".jsx", ".mts", ".cts",
];
pub static PROBE_STEMS: &[&str] = &["", "/index"];

/// Tries `{"", "/index"} × {"", ".js", ...}` in order against a bare URL
/// and returns the first success.
///
/// Negative probes are remembered for the lifetime of the cache; on
/// exhaustion the first error encountered (usually the most informative)
/// is surfaced.
pub async fn probe_extensions(
    cache: &FetchCache,
    url: &str,
    opts: FetchOptions,
) -> Result<Arc<HttpResponse>, FetchError> {
    let base = url.trim_end_matches('/');
    let mut first_err: Option<FetchError> = None;

    for stem in PROBE_STEMS {
        for ext in PROBE_EXTENSIONS {
            let candidate = format!("{}{}{}", base, stem, ext);
            if cache.probe_already_failed(&candidate) {
                continue;
            }
            // HEAD probes check existence without pulling bodies; the
            // cache still answers for URLs it has already fetched
            let attempt = match opts.method {
                HttpMethod::Head => cache.fetch_head(&candidate, opts.retries).await,
                HttpMethod::Get => cache.fetch(&candidate, opts).await,
            };
            match attempt {
                Ok(response) => {
                    if response.is_html() {
                        // an HTML page where a module was expected is a
                        // miss (CDN directory listings, SPA fallbacks)
                        cache.record_failed_probe(candidate.clone());
                        first_err.get_or_insert(FetchError::HtmlPayload { url: candidate });
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    cache.record_failed_probe(candidate);
                    first_err.get_or_insert(e);
                }
            }
        }
    }

    Err(first_err.unwrap_or(FetchError::Network {
        url: url.to_string(),
        message: "every extension probe was negatively cached".to_string(),
    }))
}
