/// Redirect-aware fetch cache with stale-while-revalidate refresh.
use std::num::NonZeroUsize;
use std::sync::Arc;

use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;

use crate::transport::{FetchError, HttpMethod, HttpRequest, HttpResponse, HttpTransport};

// response cache entries, keyed by final URL
const RESPONSE_CACHE_CAPACITY: usize = 300;
// original URL -> final URL aliases
const REDIRECT_CACHE_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Serve from cache when present and refresh in the background.
    #[default]
    Normal,
    /// Serve from cache when present, never refresh.
    Force,
    /// Bypass the lookup, fetch, and store.
    Reload,
    /// Bypass the lookup and the store.
    NoStore,
}

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub mode: FetchMode,
    pub method: HttpMethod,
    pub retries: u32,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            mode: FetchMode::Normal,
            method: HttpMethod::Get,
            retries: 2,
        }
    }
}

// all shared state lives behind one Arc so detached refresh tasks can
// own a handle
struct CacheState {
    transport: Arc<dyn HttpTransport>,
    responses: Mutex<LruCache<String, Arc<HttpResponse>>>,
    redirects: Mutex<LruCache<String, String>>,
    // negative cache for extension probing
    failed_extension_checks: DashMap<String, ()>,
    // de-duplicates concurrent background refreshes per original URL
    refresh_inflight: DashMap<String, ()>,
}

pub struct FetchCache {
    state: Arc<CacheState>,
}

impl CacheState {
    /// Looks up a cached response by original or final URL.
    fn lookup(&self, url: &str) -> Option<Arc<HttpResponse>> {
        {
            let mut responses = self.responses.lock();
            if let Some(hit) = responses.get(url) {
                return Some(hit.clone());
            }
        }
        let final_url = {
            let mut redirects = self.redirects.lock();
            redirects.get(url).cloned()
        }?;
        let mut responses = self.responses.lock();
        responses.get(&final_url).cloned()
    }

    fn store(&self, original_url: &str, response: &Arc<HttpResponse>) {
        let final_url = response.final_url.as_str();
        self.responses
            .lock()
            .put(final_url.to_string(), response.clone());
        if original_url != final_url {
            self.redirects
                .lock()
                .put(original_url.to_string(), final_url.to_string());
        }
    }

    /// One network round trip with retries on network errors and 5xx.
    async fn request_with_retries(
        &self,
        url: &str,
        method: HttpMethod,
        retries: u32,
    ) -> Result<HttpResponse, FetchError> {
        let mut last_err: Option<FetchError> = None;
        for attempt in 0..=retries {
            if attempt > 0 {
                tracing::debug!("retrying {:?} {} (attempt {})", method, url, attempt + 1);
            }
            match self
                .transport
                .request(HttpRequest {
                    url: url.to_string(),
                    method,
                })
                .await
            {
                Ok(response) if response.status >= 500 => {
                    last_err = Some(FetchError::Status {
                        url: url.to_string(),
                        method,
                        status: response.status,
                    });
                }
                Ok(response) => return Ok(response),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or(FetchError::Network {
            url: url.to_string(),
            message: "no response".to_string(),
        }))
    }

    async fn fetch_network(
        &self,
        url: &str,
        opts: FetchOptions,
    ) -> Result<Arc<HttpResponse>, FetchError> {
        let response = self
            .request_with_retries(url, opts.method, opts.retries)
            .await?;

        if !response.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                method: opts.method,
                status: response.status,
            });
        }

        let response = Arc::new(response);
        // only successful GETs are cacheable; HEAD results are never stored
        if opts.method == HttpMethod::Get && opts.mode != FetchMode::NoStore {
            self.store(url, &response);
        }
        Ok(response)
    }

    /// Refreshes a cached entry: the original URL is tried first so new
    /// redirect targets (a moved `@latest`) are discovered; a 404 there
    /// falls back to the final URL, which tolerates probe-shaped
    /// originals that no longer respond.
    async fn refresh(&self, original_url: &str, final_url: &str) -> Result<(), FetchError> {
        let reload = FetchOptions {
            mode: FetchMode::Reload,
            method: HttpMethod::Get,
            retries: 0,
        };
        match self.fetch_network(original_url, reload).await {
            Ok(_) => Ok(()),
            Err(e) if e.status() == Some(404) && original_url != final_url => {
                self.fetch_network(final_url, reload).await.map(|_| ())
            }
            Err(e) => Err(e),
        }
    }
}

impl FetchCache {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            state: Arc::new(CacheState {
                transport,
                responses: Mutex::new(LruCache::new(
                    NonZeroUsize::new(RESPONSE_CACHE_CAPACITY).unwrap(),
                )),
                redirects: Mutex::new(LruCache::new(
                    NonZeroUsize::new(REDIRECT_CACHE_CAPACITY).unwrap(),
                )),
                failed_extension_checks: DashMap::new(),
                refresh_inflight: DashMap::new(),
            }),
        }
    }

    /// Fetches a URL honoring the cache mode. See [`FetchMode`].
    pub async fn fetch(
        &self,
        url: &str,
        opts: FetchOptions,
    ) -> Result<Arc<HttpResponse>, FetchError> {
        match opts.mode {
            FetchMode::Normal | FetchMode::Force => {
                if opts.method == HttpMethod::Get {
                    if let Some(hit) = self.state.lookup(url) {
                        if opts.mode == FetchMode::Normal {
                            self.spawn_refresh(url.to_string(), hit.final_url.clone());
                        }
                        return Ok(hit);
                    }
                }
                self.state.fetch_network(url, opts).await
            }
            FetchMode::Reload | FetchMode::NoStore => self.state.fetch_network(url, opts).await,
        }
    }

    /// HEAD with a GET fallback for servers that refuse HEAD; the
    /// fallback's body is discarded and nothing is stored.
    pub async fn fetch_head(
        &self,
        url: &str,
        retries: u32,
    ) -> Result<Arc<HttpResponse>, FetchError> {
        let head = self
            .state
            .fetch_network(
                url,
                FetchOptions {
                    mode: FetchMode::NoStore,
                    method: HttpMethod::Head,
                    retries,
                },
            )
            .await;
        match head {
            Ok(response) => Ok(response),
            // only refused/5xx HEADs get the GET fallback; a clean 404
            // is an answer
            Err(e) if e.status().map(|s| s >= 500).unwrap_or(true) => {
                tracing::debug!("HEAD {} failed ({}), falling back to GET", url, e);
                let mut response = self
                    .state
                    .fetch_network(
                        url,
                        FetchOptions {
                            mode: FetchMode::NoStore,
                            method: HttpMethod::Get,
                            retries,
                        },
                    )
                    .await?;
                // cancel the body: the caller asked for headers only
                Arc::make_mut(&mut response).body = Vec::new();
                Ok(response)
            }
            Err(e) => Err(e),
        }
    }

    /// Detached stale-while-revalidate refresh. Never awaited; failures
    /// are logged and swallowed.
    fn spawn_refresh(&self, original_url: String, final_url: String) {
        if self
            .state
            .refresh_inflight
            .insert(original_url.clone(), ())
            .is_some()
        {
            return;
        }
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            if let Err(e) = state.refresh(&original_url, &final_url).await {
                tracing::debug!("background refresh of {} failed: {}", original_url, e);
            }
            state.refresh_inflight.remove(&original_url);
        });
    }

    /// Synchronous refresh of one cached entry (the background task runs
    /// exactly this).
    pub async fn refresh(&self, original_url: &str, final_url: &str) -> Result<(), FetchError> {
        self.state.refresh(original_url, final_url).await
    }

    /// Whether an extension probe for this exact URL already failed.
    pub fn probe_already_failed(&self, url: &str) -> bool {
        self.state.failed_extension_checks.contains_key(url)
    }

    pub fn record_failed_probe(&self, url: String) {
        self.state.failed_extension_checks.insert(url, ());
    }

    /// Drops every cached response and alias.
    pub fn clear(&self) {
        self.state.responses.lock().clear();
        self.state.redirects.lock().clear();
        self.state.failed_extension_checks.clear();
    }
}
