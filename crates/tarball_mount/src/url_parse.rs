/// Parsing of tarball-serving CDN URLs into a package address.
use url::Url;

use crate::mount::TarballError;

// routes that are never package tarballs
static NON_PACKAGE_ROUTES: &[&str] = &["api", "badge", "status", "favicon.ico", "robots.txt"];

/// A tarball URL decomposed into its package address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarballUrlParts {
    /// `name@version`
    pub pkg_spec: String,
    pub name: String,
    pub version: Option<String>,
    /// request subpath inside the package, no leading slash
    pub subpath: String,
    /// the URL addressing the tarball itself (no subpath)
    pub package_url: String,
    pub owner: Option<String>,
    pub repo: Option<String>,
    /// set when the non-compact shape was assumed from publisher
    /// convention rather than a guaranteed route shape
    pub heuristic: Option<String>,
}

fn split_spec(spec: &str) -> (String, Option<String>) {
    // a scoped spec's first '@' is the sigil, not the version separator
    let search_from = usize::from(spec.starts_with('@'));
    match spec[search_from..].find('@') {
        Some(idx) => {
            let at = search_from + idx;
            (spec[..at].to_string(), Some(spec[at + 1..].to_string()))
        }
        None => (spec.to_string(), None),
    }
}

/// Parses compact (`/<spec>/…`) and non-compact
/// (`/<owner>/<repo>/<spec>/…`) tarball URL shapes.
pub fn parse_tarball_url(url: &Url) -> Result<TarballUrlParts, TarballError> {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let invalid = |reason: &str| {
        Err(TarballError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        })
    };

    if segments.is_empty() {
        return invalid("no path segments");
    }
    if NON_PACKAGE_ROUTES.contains(&segments[0]) {
        return invalid("known non-package route");
    }

    let origin = &url[..url::Position::BeforePath];
    let query = url.query().map(|q| format!("?{}", q)).unwrap_or_default();

    // compact scoped: /@scope/name@version/subpath...
    if segments[0].starts_with('@') {
        if segments.len() < 2 {
            return invalid("scoped spec is missing its name segment");
        }
        let raw_spec = format!("{}/{}", segments[0], segments[1]);
        let (name, version) = split_spec(&raw_spec);
        let subpath = segments[2..].join("/");
        return Ok(TarballUrlParts {
            pkg_spec: raw_spec.clone(),
            package_url: format!("{}/{}{}", origin, raw_spec, query),
            name,
            version,
            subpath,
            owner: None,
            repo: None,
            heuristic: None,
        });
    }

    // compact unscoped: /name@version/subpath...
    if segments[0].contains('@') {
        let raw_spec = segments[0].to_string();
        let (name, version) = split_spec(&raw_spec);
        let subpath = segments[1..].join("/");
        return Ok(TarballUrlParts {
            pkg_spec: raw_spec.clone(),
            package_url: format!("{}/{}{}", origin, raw_spec, query),
            name,
            version,
            subpath,
            owner: None,
            repo: None,
            heuristic: None,
        });
    }

    // non-compact: /owner/repo/<spec>/subpath...; the spec segment is
    // recognized by carrying an '@', which is publisher convention
    if segments.len() >= 3 {
        let owner = segments[0];
        let repo = segments[1];
        let (raw_spec, rest) = if segments[2].starts_with('@') {
            if segments.len() < 4 {
                return invalid("scoped spec is missing its name segment");
            }
            (format!("{}/{}", segments[2], segments[3]), &segments[4..])
        } else if segments[2].contains('@') {
            (segments[2].to_string(), &segments[3..])
        } else {
            return invalid("third segment does not look like a package spec");
        };
        let (name, version) = split_spec(&raw_spec);
        return Ok(TarballUrlParts {
            pkg_spec: raw_spec.clone(),
            package_url: format!("{}/{}/{}/{}{}", origin, owner, repo, raw_spec, query),
            name,
            version,
            subpath: rest.join("/"),
            owner: Some(owner.to_string()),
            repo: Some(repo.to_string()),
            heuristic: Some(
                "assumed owner/repo form because the third segment carries '@' \
                 (publisher convention, not a guaranteed route shape)"
                    .to_string(),
            ),
        });
    }

    invalid("no segment looks like a package spec")
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(raw: &str) -> TarballUrlParts {
        parse_tarball_url(&Url::parse(raw).unwrap()).unwrap()
    }

    #[test]
    fn test_compact_scoped() {
        let parts = parse("https://pkg.pr.new/@tanstack/react-query@7988");
        assert_eq!(parts.name, "@tanstack/react-query");
        assert_eq!(parts.version.as_deref(), Some("7988"));
        assert_eq!(parts.pkg_spec, "@tanstack/react-query@7988");
        assert_eq!(parts.subpath, "");
        assert_eq!(
            parts.package_url,
            "https://pkg.pr.new/@tanstack/react-query@7988"
        );
        assert_eq!(parts.heuristic, None);
    }

    #[test]
    fn test_compact_unscoped_with_subpath() {
        let parts = parse("https://pkg.pr.new/vite@12345/dist/node/index.js");
        assert_eq!(parts.name, "vite");
        assert_eq!(parts.version.as_deref(), Some("12345"));
        assert_eq!(parts.subpath, "dist/node/index.js");
        assert_eq!(parts.package_url, "https://pkg.pr.new/vite@12345");
    }

    #[test]
    fn test_non_compact() {
        let parts = parse("https://pkg.pr.new/tanstack/query/@tanstack/react-query@7988/build/modern");
        assert_eq!(parts.owner.as_deref(), Some("tanstack"));
        assert_eq!(parts.repo.as_deref(), Some("query"));
        assert_eq!(parts.name, "@tanstack/react-query");
        assert_eq!(parts.subpath, "build/modern");
        assert_eq!(
            parts.package_url,
            "https://pkg.pr.new/tanstack/query/@tanstack/react-query@7988"
        );
        assert!(parts.heuristic.is_some());
    }

    #[test]
    fn test_non_compact_unscoped() {
        let parts = parse("https://pkg.pr.new/vitejs/vite/vite@9f1fd84");
        assert_eq!(parts.owner.as_deref(), Some("vitejs"));
        assert_eq!(parts.name, "vite");
        assert_eq!(parts.version.as_deref(), Some("9f1fd84"));
    }

    #[test]
    fn test_refuses_non_package_routes() {
        for raw in [
            "https://pkg.pr.new/api/packages",
            "https://pkg.pr.new/badge/owner/repo",
            "https://pkg.pr.new/",
            "https://pkg.pr.new/owner/repo/not-a-spec",
        ] {
            assert!(
                parse_tarball_url(&Url::parse(raw).unwrap()).is_err(),
                "{}",
                raw
            );
        }
    }

    #[test]
    fn test_trailing_slash_is_tolerated() {
        let parts = parse("https://pkg.pr.new/vite@12345/");
        assert_eq!(parts.name, "vite");
        assert_eq!(parts.subpath, "");
    }

    #[test]
    fn test_query_is_preserved_on_package_url() {
        let parts = parse("https://pkg.pr.new/vite@12345/dist/x.js?b=2&a=1");
        assert_eq!(parts.package_url, "https://pkg.pr.new/vite@12345?b=2&a=1");
    }
}
