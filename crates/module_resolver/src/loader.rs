/// Loader inference from a module's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loader {
    Js,
    Jsx,
    Ts,
    Tsx,
    Json,
    Css,
    Text,
    Binary,
}

impl Loader {
    /// Infers a loader from a path's extension; `application/json` and
    /// friends let a Content-Type override extensionless URLs.
    pub fn infer(path: &str, content_type: Option<&str>) -> Loader {
        match vpath::extension(path) {
            Some("js") | Some("mjs") | Some("cjs") => Loader::Js,
            Some("jsx") => Loader::Jsx,
            Some("ts") | Some("mts") | Some("cts") => Loader::Ts,
            Some("tsx") => Loader::Tsx,
            Some("json") => Loader::Json,
            Some("css") => Loader::Css,
            Some("txt") | Some("md") => Loader::Text,
            Some("wasm") | Some("png") | Some("jpg") | Some("gif") | Some("svg") => Loader::Binary,
            _ => match content_type.map(|ct| ct.split(';').next().unwrap_or("").trim()) {
                Some("application/json") => Loader::Json,
                Some("text/css") => Loader::Css,
                Some("text/plain") => Loader::Text,
                // CDNs serve modules under a handful of JS media types
                Some(ct) if ct.contains("javascript") || ct.contains("typescript") => Loader::Js,
                _ => Loader::Js,
            },
        }
    }
}
