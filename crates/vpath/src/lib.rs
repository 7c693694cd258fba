/// POSIX-style path utilities for the virtual filesystem.
///
/// Every path handled here is a forward-slash string; these helpers never
/// touch the real filesystem or the platform path separator.
use std::path::PathBuf;

use lazy_static::lazy_static;
use path_clean::PathClean;
use path_slash::PathBufExt;
use regex::Regex;
use url::Url;

lazy_static! {
    // Anything of the shape "scheme:" at the front of a specifier.
    static ref SCHEME_RE: Regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*:").unwrap();
    static ref HTTP_RE: Regex = Regex::new(r"^https?://").unwrap();
}

// Cleans a slash path, removing '.' segments and resolving '..' where possible
//
// If the input is already clean, the original string is returned without
// allocating.
pub fn normalize_avoid_alloc<'a>(original: &'a str, store: &'a mut String) -> &'a str {
    if original.is_empty() {
        return ".";
    }

    let bytes = original.as_bytes();
    for (i, c) in original.chars().enumerate() {
        let is_complex_path = match c {
            // escaped chars
            '\\' => true,
            // possible part of '/.' or '..'
            '.' => i == 0 || bytes[i - 1] == b'.' || bytes[i - 1] == b'/',
            // consecutive slashes or trailing slash handling
            '/' => i > 0 && (bytes[i - 1] == b'.' || bytes[i - 1] == b'/'),
            _ => false,
        };

        if is_complex_path || original.ends_with('/') {
            store.clear();
            match PathBuf::from(original).clean().to_slash() {
                Some(cleaned) => store.push_str(&cleaned),
                None => store.push_str(original),
            }
            return store;
        }
    }

    original
}

pub fn normalize(p: &str) -> String {
    let mut store = String::new();
    normalize_avoid_alloc(p, &mut store).to_string()
}

/// Joins two slash paths and cleans the result.
pub fn join(base: &str, rel: &str) -> String {
    if base.is_empty() {
        return normalize(rel);
    }
    let mut joined = String::with_capacity(base.len() + rel.len() + 1);
    joined.push_str(base);
    if !base.ends_with('/') {
        joined.push('/');
    }
    joined.push_str(rel);
    normalize(&joined)
}

/// Resolves a specifier to an absolute slash path.
///
/// Absolute specifiers are cleaned as-is; relative specifiers are joined
/// onto `base_dir` first.
pub fn resolve(base_dir: &str, spec: &str) -> String {
    if spec.starts_with('/') {
        normalize(spec)
    } else {
        let base = if base_dir.is_empty() { "/" } else { base_dir };
        join(base, spec)
    }
}

/// Parent directory of a slash path. The root's parent is the root.
pub fn dirname(p: &str) -> &str {
    match p.trim_end_matches('/').rfind('/') {
        Some(0) => "/",
        Some(idx) => &p[..idx],
        None => ".",
    }
}

pub fn file_name(p: &str) -> &str {
    match p.trim_end_matches('/').rfind('/') {
        Some(idx) => &p[idx + 1..],
        None => p,
    }
}

/// File extension without the dot, if any.
///
/// A leading dot alone (".gitignore") is a hidden file, not an extension.
pub fn extension(p: &str) -> Option<&str> {
    let name = file_name(p);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(&name[idx + 1..]),
    }
}

/// Strips a `vfs:` or `virtual:` prefix, yielding an absolute path.
///
/// `vfs:x` is treated as `vfs:/x`.
pub fn strip_vfs_scheme(spec: &str) -> Option<String> {
    let rest = spec
        .strip_prefix("vfs:")
        .or_else(|| spec.strip_prefix("virtual:"))?;
    if rest.starts_with('/') {
        Some(rest.to_string())
    } else {
        Some(format!("/{}", rest))
    }
}

pub fn is_relative_import(spec: &str) -> bool {
    spec == "." || spec == ".." || spec.starts_with("./") || spec.starts_with("../")
}

pub fn is_http_url(spec: &str) -> bool {
    HTTP_RE.is_match(spec)
}

/// A bare import is anything that is not relative, not absolute, not a
/// URL or other scheme-prefixed specifier, and not a subpath import.
pub fn is_bare_import(spec: &str) -> bool {
    if spec.is_empty()
        || spec.starts_with('/')
        || spec.starts_with('#')
        || is_relative_import(spec)
    {
        return false;
    }
    // "@scope/pkg" contains no scheme; "data:", "node:" etc. do. Windows
    // drive letters don't occur in virtual paths so a single-letter scheme
    // is fine to reject here.
    !SCHEME_RE.is_match(spec)
}

/// RFC 3986 join of a specifier onto a base URL.
///
/// An absolute path replaces the base's pathname; relative specifiers
/// resolve against the base's directory.
pub fn url_join(base: &Url, spec: &str) -> Result<Url, url::ParseError> {
    base.join(spec)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_clean_input_is_unchanged() {
        let mut store = String::new();
        let p = "/a/b/c.ts";
        assert_eq!(normalize_avoid_alloc(p, &mut store), "/a/b/c.ts");
        assert!(store.is_empty());
    }

    #[test]
    fn test_normalize_collapses_segments() {
        assert_eq!(normalize("/a/./b/../c"), "/a/c");
        assert_eq!(normalize("/a//b/"), "/a/b");
        assert_eq!(normalize("a/../../b"), "../b");
        assert_eq!(normalize("/../b"), "/b");
        assert_eq!(normalize(""), ".");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/a/b", "c.ts"), "/a/b/c.ts");
        assert_eq!(join("/a/b", "../c.ts"), "/a/c.ts");
        assert_eq!(join("/", "c.ts"), "/c.ts");
    }

    #[test]
    fn test_resolve() {
        assert_eq!(resolve("/a", "./shared"), "/a/shared");
        assert_eq!(resolve("/b", "./shared"), "/b/shared");
        assert_eq!(resolve("/a/b", "/abs/x.ts"), "/abs/x.ts");
        assert_eq!(resolve("", "./x"), "/x");
    }

    #[test]
    fn test_dirname_and_file_name() {
        assert_eq!(dirname("/a/b/c.ts"), "/a/b");
        assert_eq!(dirname("/c.ts"), "/");
        assert_eq!(dirname("c.ts"), ".");
        assert_eq!(file_name("/a/b/c.ts"), "c.ts");
        assert_eq!(file_name("c.ts"), "c.ts");
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("/a/b.test.ts"), Some("ts"));
        assert_eq!(extension("/a/.gitignore"), None);
        assert_eq!(extension("/a/Makefile"), None);
    }

    #[test]
    fn test_strip_vfs_scheme() {
        assert_eq!(strip_vfs_scheme("vfs:/x.ts"), Some("/x.ts".to_string()));
        assert_eq!(strip_vfs_scheme("vfs:x.ts"), Some("/x.ts".to_string()));
        assert_eq!(
            strip_vfs_scheme("virtual:/a/b.ts"),
            Some("/a/b.ts".to_string())
        );
        assert_eq!(strip_vfs_scheme("./x.ts"), None);
        assert_eq!(strip_vfs_scheme("https://host/x"), None);
    }

    #[test]
    fn test_is_bare_import() {
        assert!(is_bare_import("react"));
        assert!(is_bare_import("@scope/pkg"));
        assert!(is_bare_import("lodash/get"));
        assert!(!is_bare_import("./x"));
        assert!(!is_bare_import("../x"));
        assert!(!is_bare_import("/x"));
        assert!(!is_bare_import("#internal/x"));
        assert!(!is_bare_import("https://unpkg.com/react"));
        assert!(!is_bare_import("data:text/javascript,export{}"));
        assert!(!is_bare_import("node:path"));
        assert!(!is_bare_import("npm:react@18"));
        assert!(!is_bare_import(""));
    }

    #[test]
    fn test_url_join() {
        let base = Url::parse("https://unpkg.com/lodash@4.17.21/lodash.js").unwrap();
        assert_eq!(
            url_join(&base, "./fp.js").unwrap().as_str(),
            "https://unpkg.com/lodash@4.17.21/fp.js"
        );
        assert_eq!(
            url_join(&base, "../other/x.js").unwrap().as_str(),
            "https://unpkg.com/other/x.js"
        );
        assert_eq!(
            url_join(&base, "/absolute.js").unwrap().as_str(),
            "https://unpkg.com/absolute.js"
        );
    }
}
