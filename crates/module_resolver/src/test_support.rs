/// Shared test fixtures: a scripted HTTP transport and tarball builders.
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use fetch_cache::{FetchError, HttpRequest, HttpResponse, HttpTransport};
use flate2::write::GzEncoder;
use parking_lot::Mutex;

/// Serves a scripted URL table; everything else 404s. Counts round
/// trips.
pub struct MapServer {
    responses: Mutex<HashMap<String, HttpResponse>>,
    hits: AtomicUsize,
}

impl MapServer {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            hits: AtomicUsize::new(0),
        }
    }

    pub fn ok(&self, url: &str, body: &str) {
        self.redirect(url, url, body);
    }

    pub fn redirect(&self, url: &str, final_url: &str, body: &str) {
        self.respond(
            url,
            HttpResponse {
                status: 200,
                final_url: final_url.to_string(),
                headers: vec![(
                    "content-type".to_string(),
                    "application/javascript".to_string(),
                )],
                body: body.as_bytes().to_vec(),
            },
        );
    }

    pub fn binary(&self, url: &str, body: Vec<u8>) {
        self.respond(
            url,
            HttpResponse {
                status: 200,
                final_url: url.to_string(),
                headers: vec![(
                    "content-type".to_string(),
                    "application/octet-stream".to_string(),
                )],
                body,
            },
        );
    }

    pub fn respond(&self, url: &str, response: HttpResponse) {
        self.responses.lock().insert(url.to_string(), response);
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Default for MapServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for MapServer {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, FetchError> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().get(&req.url) {
            Some(response) => Ok(response.clone()),
            None => Ok(HttpResponse {
                status: 404,
                final_url: req.url,
                headers: vec![],
                body: vec![],
            }),
        }
    }
}

/// Builds an npm-style (gzipped, `package/`-prefixed) tarball.
pub fn gzipped_tarball(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, contents) in files {
        let mut header = tar::Header::new_ustar();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .unwrap();
    }
    let tar = builder.into_inner().unwrap();
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap()
}
