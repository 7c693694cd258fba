/// CDN host recognition and registry URL construction.
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdnStyle {
    Npm,
    Jsr,
    Github,
    Deno,
    Tarball,
    Other,
}

// shorthand name → canonical origin
static KNOWN_CDNS: &[(&str, &str)] = &[
    ("unpkg", "https://unpkg.com"),
    ("unpkg.com", "https://unpkg.com"),
    ("esm.sh", "https://esm.sh"),
    ("esm", "https://esm.sh"),
    ("esm.run", "https://esm.run"),
    ("jsdelivr", "https://cdn.jsdelivr.net"),
    ("cdn.jsdelivr.net", "https://cdn.jsdelivr.net"),
    ("skypack", "https://cdn.skypack.dev"),
    ("cdn.skypack.dev", "https://cdn.skypack.dev"),
    ("deno", "https://deno.land"),
    ("deno.land", "https://deno.land"),
    ("jsr", "https://jsr.io"),
    ("jsr.io", "https://jsr.io"),
    ("github", "https://raw.githubusercontent.com"),
    ("raw.githubusercontent.com", "https://raw.githubusercontent.com"),
    ("pkg.pr.new", "https://pkg.pr.new"),
];

/// Normalizes a CDN shorthand or URL to an origin string.
///
/// Unknown inputs that parse as URLs keep their own origin; anything else
/// falls back to the default host unchanged.
pub fn cdn_origin(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('/');
    let lookup = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    for (shorthand, origin) in KNOWN_CDNS {
        if lookup.eq_ignore_ascii_case(shorthand) {
            return (*origin).to_string();
        }
    }
    if let Ok(url) = Url::parse(trimmed) {
        if let Some(host) = url.host_str() {
            let mut origin = format!("{}://{}", url.scheme(), host);
            if let Some(port) = url.port() {
                origin.push(':');
                origin.push_str(&port.to_string());
            }
            return origin;
        }
    }
    trimmed.to_string()
}

/// Classifies a URL or origin by the kind of artifact it serves.
pub fn cdn_style(input: &str) -> CdnStyle {
    let origin = cdn_origin(input);
    let Ok(url) = Url::parse(&origin) else {
        return CdnStyle::Other;
    };
    let host = url.host_str().unwrap_or("");

    // jsdelivr serves both registries, split by path prefix
    if host == "cdn.jsdelivr.net" {
        if let Ok(full) = Url::parse(input) {
            if full.path().starts_with("/gh/") {
                return CdnStyle::Github;
            }
        }
        return CdnStyle::Npm;
    }

    match host {
        "unpkg.com" | "esm.sh" | "esm.run" | "cdn.skypack.dev" => CdnStyle::Npm,
        "jsr.io" => CdnStyle::Jsr,
        "raw.githubusercontent.com" => CdnStyle::Github,
        "deno.land" => CdnStyle::Deno,
        "pkg.pr.new" => CdnStyle::Tarball,
        _ => CdnStyle::Other,
    }
}

/// Escapes a package name for a registry path segment (scoped names keep
/// the '@' but escape the separator).
pub fn escape_package_name(name: &str) -> String {
    name.replace('/', "%2f")
}

/// The registry metadata document, `<host>/<escaped-name>`.
pub fn npm_manifest_url(registry_origin: &str, name: &str) -> String {
    format!(
        "{}/{}",
        registry_origin.trim_end_matches('/'),
        escape_package_name(name)
    )
}

/// One version's metadata, `<host>/<escaped-name>/<version>`.
pub fn npm_version_url(registry_origin: &str, name: &str, version: &str) -> String {
    format!(
        "{}/{}/{}",
        registry_origin.trim_end_matches('/'),
        escape_package_name(name),
        version
    )
}

/// A module file on an npm-serving CDN,
/// `<origin>/<name>@<version><subpath>`. `subpath` is empty or starts
/// with '/'.
pub fn cdn_module_url(cdn_origin: &str, name: &str, version: &str, subpath: &str) -> String {
    format!(
        "{}/{}@{}{}",
        cdn_origin.trim_end_matches('/'),
        name,
        version,
        subpath
    )
}

pub const JSR_ORIGIN: &str = "https://jsr.io";

/// `https://jsr.io/@<scope>/<name>/meta.json`
pub fn jsr_meta_url(scope: &str, name: &str) -> String {
    format!("{}/@{}/{}/meta.json", JSR_ORIGIN, scope, name)
}

/// `https://jsr.io/@<scope>/<name>/<version>_meta.json`
pub fn jsr_version_meta_url(scope: &str, name: &str, version: &str) -> String {
    format!("{}/@{}/{}/{}_meta.json", JSR_ORIGIN, scope, name, version)
}

/// `https://jsr.io/@<scope>/<name>/<version>/<file>`
pub fn jsr_module_url(scope: &str, name: &str, version: &str, file: &str) -> String {
    format!(
        "{}/@{}/{}/{}/{}",
        JSR_ORIGIN,
        scope,
        name,
        version,
        file.trim_start_matches("./").trim_start_matches('/')
    )
}

/// esm.sh proxy for a jsr package, the fallback when direct registry
/// resolution fails.
pub fn jsr_esm_proxy_url(package_name: &str, version: Option<&str>, subpath: &str) -> String {
    let mut url = String::from("https://esm.sh/jsr/");
    url.push_str(package_name);
    if let Some(version) = version {
        url.push('@');
        url.push_str(version);
    }
    if !subpath.is_empty() {
        url.push('/');
        url.push_str(subpath.trim_start_matches('/'));
    }
    url
}
