/// Classification of the right-hand side of a dependency entry.
use lazy_static::lazy_static;
use regex::Regex;

use crate::package_name::{parse_package_name, validate_package_name};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTarget {
    pub name: String,
    pub version: Option<String>,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GitSpec {
    // "github", "gitlab", "bitbucket" for hosted shorthands
    pub hosted: Option<String>,
    pub committish: Option<String>,
    pub range: Option<String>,
    pub subdir: Option<String>,
}

/// What a dependency version string means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepSpec {
    // a range like "^1.2.0" or ">=1 <2"
    Semver,
    // an exact version like "1.2.3"
    Version,
    // a dist-tag like "latest" or "next"
    Tag,
    Alias { target: AliasTarget },
    Url { url: String },
    Git { git: GitSpec },
    File,
    Directory,
    Workspace,
    Link,
    Unknown { error: String },
}

impl DepSpec {
    /// Whether this spec can be resolved through a registry CDN.
    pub fn is_registry_resolvable(&self) -> bool {
        matches!(
            self,
            DepSpec::Semver | DepSpec::Version | DepSpec::Tag | DepSpec::Alias { .. }
        )
    }

    /// The kind tag used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            DepSpec::Semver => "semver",
            DepSpec::Version => "version",
            DepSpec::Tag => "tag",
            DepSpec::Alias { .. } => "alias",
            DepSpec::Url { .. } => "url",
            DepSpec::Git { .. } => "git",
            DepSpec::File => "file",
            DepSpec::Directory => "directory",
            DepSpec::Workspace => "workspace",
            DepSpec::Link => "link",
            DepSpec::Unknown { .. } => "unknown",
        }
    }
}

lazy_static! {
    // the github shorthand: "owner/repo", optionally "#committish"
    static ref HOSTED_SHORTHAND_RE: Regex =
        Regex::new(r"^[A-Za-z0-9\-_.]+/[A-Za-z0-9\-_.]+(#.+)?$").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"^[a-z0-9][a-z0-9\-_.]*$").unwrap();
    // npm range syntax the semver crate doesn't read (space-separated
    // comparators, hyphen ranges, "||" alternatives)
    static ref RANGE_LIKE_RE: Regex =
        Regex::new(r"^[<>=~^0-9vx*][0-9a-zA-Z\s.*^~><=|+\-]*$").unwrap();
}

fn parse_git_url(raw: &str, hosted: Option<&str>) -> DepSpec {
    let mut git = GitSpec {
        hosted: hosted.map(str::to_string),
        ..Default::default()
    };
    if let Some((_, frag)) = raw.split_once('#') {
        // "#semver:^1.0.0" carries a range, everything else a committish
        if let Some(range) = frag.strip_prefix("semver:") {
            git.range = Some(range.to_string());
        } else {
            git.committish = Some(frag.to_string());
        }
    }
    if let Some(idx) = raw.find("::path:") {
        git.subdir = Some(raw[idx + "::path:".len()..].to_string());
    }
    DepSpec::Git { git }
}

fn parse_alias(raw: &str) -> DepSpec {
    let target = &raw["npm:".len()..];
    if target.starts_with("npm:") {
        return DepSpec::Unknown {
            error: format!("nested npm: alias '{}' is not supported", raw),
        };
    }
    match parse_package_name(target) {
        Ok(spec) => DepSpec::Alias {
            target: AliasTarget {
                name: spec.name,
                version: spec.version,
                path: spec.subpath,
            },
        },
        Err(e) => DepSpec::Unknown {
            error: format!("unparseable npm: alias target '{}': {}", target, e),
        },
    }
}

/// Classifies a dependency version string.
///
/// `name` is the dependency's key in the map, used only for hosted
/// shorthand disambiguation and diagnostics.
pub fn parse_dep_spec(name: &str, raw: &str) -> DepSpec {
    let raw = raw.trim();

    if raw.starts_with("http://") || raw.starts_with("https://") {
        return DepSpec::Url {
            url: raw.to_string(),
        };
    }
    if raw.starts_with("npm:") {
        return parse_alias(raw);
    }
    if raw.starts_with("workspace:") {
        return DepSpec::Workspace;
    }
    if raw.starts_with("link:") {
        return DepSpec::Link;
    }
    if raw.starts_with("file:") {
        return DepSpec::File;
    }
    if raw.starts_with("./") || raw.starts_with("../") || raw.starts_with('/') || raw.starts_with("~/")
    {
        return DepSpec::Directory;
    }
    if raw.starts_with("git+") || raw.starts_with("git://") {
        return parse_git_url(raw, None);
    }
    for hosted in ["github", "gitlab", "bitbucket"] {
        if let Some(rest) = raw.strip_prefix(hosted).and_then(|r| r.strip_prefix(':')) {
            return parse_git_url(rest, Some(hosted));
        }
    }
    if HOSTED_SHORTHAND_RE.is_match(raw) && validate_package_name(name).is_ok() {
        return parse_git_url(raw, Some("github"));
    }

    // registry version forms
    if raw.is_empty() || raw == "*" {
        return DepSpec::Semver;
    }
    if semver::Version::parse(raw).is_ok() {
        return DepSpec::Version;
    }
    if semver::VersionReq::parse(raw).is_ok() {
        return DepSpec::Semver;
    }
    if RANGE_LIKE_RE.is_match(raw) {
        return DepSpec::Semver;
    }
    if TAG_RE.is_match(raw) {
        return DepSpec::Tag;
    }

    DepSpec::Unknown {
        error: format!("unparseable dependency spec '{}' for '{}'", raw, name),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_registry_versions() {
        assert_eq!(parse_dep_spec("a", "1.2.3"), DepSpec::Version);
        assert_eq!(parse_dep_spec("a", "1.2.3-beta.1"), DepSpec::Version);
        assert_eq!(parse_dep_spec("a", "^1.2.0"), DepSpec::Semver);
        assert_eq!(parse_dep_spec("a", "~0.4"), DepSpec::Semver);
        assert_eq!(parse_dep_spec("a", ">=1, <2"), DepSpec::Semver);
        assert_eq!(parse_dep_spec("a", "1.x"), DepSpec::Semver);
        assert_eq!(parse_dep_spec("a", "18"), DepSpec::Semver);
        // npm's space-separated comparators
        assert_eq!(parse_dep_spec("a", ">=16.8.0 <19.0.0"), DepSpec::Semver);
        assert_eq!(parse_dep_spec("a", "1.0.0 - 2.0.0"), DepSpec::Semver);
        assert_eq!(parse_dep_spec("a", "*"), DepSpec::Semver);
        assert_eq!(parse_dep_spec("a", ""), DepSpec::Semver);
        assert_eq!(parse_dep_spec("a", "latest"), DepSpec::Tag);
        assert_eq!(parse_dep_spec("a", "next"), DepSpec::Tag);
    }

    #[test]
    fn test_url_iff_http_prefix() {
        assert_eq!(
            parse_dep_spec("a", "https://pkg.pr.new/@tanstack/react-query@7988"),
            DepSpec::Url {
                url: "https://pkg.pr.new/@tanstack/react-query@7988".to_string()
            }
        );
        assert_eq!(
            parse_dep_spec("a", "http://example.com/pkg.tgz"),
            DepSpec::Url {
                url: "http://example.com/pkg.tgz".to_string()
            }
        );
        assert!(!matches!(
            parse_dep_spec("a", "git+https://github.com/o/r.git"),
            DepSpec::Url { .. }
        ));
    }

    #[test]
    fn test_alias() {
        assert_eq!(
            parse_dep_spec("my-react", "npm:react@^18.0.0"),
            DepSpec::Alias {
                target: AliasTarget {
                    name: "react".to_string(),
                    version: Some("^18.0.0".to_string()),
                    path: String::new(),
                }
            }
        );
        assert!(matches!(
            parse_dep_spec("x", "npm:npm:react"),
            DepSpec::Unknown { .. }
        ));
    }

    #[test]
    fn test_git_forms() {
        let spec = parse_dep_spec("a", "git+https://github.com/owner/repo.git#v1.2.3");
        match spec {
            DepSpec::Git { git } => {
                assert_eq!(git.committish.as_deref(), Some("v1.2.3"));
                assert_eq!(git.hosted, None);
            }
            other => panic!("expected git, got {:?}", other),
        }

        let spec = parse_dep_spec("a", "github:owner/repo#semver:^2.0.0");
        match spec {
            DepSpec::Git { git } => {
                assert_eq!(git.hosted.as_deref(), Some("github"));
                assert_eq!(git.range.as_deref(), Some("^2.0.0"));
            }
            other => panic!("expected git, got {:?}", other),
        }

        // bare "owner/repo" shorthand
        assert!(matches!(
            parse_dep_spec("a", "isaacs/minimatch"),
            DepSpec::Git { .. }
        ));
    }

    #[test]
    fn test_filesystem_forms() {
        assert_eq!(parse_dep_spec("a", "file:../local-pkg"), DepSpec::File);
        assert_eq!(parse_dep_spec("a", "./vendored"), DepSpec::Directory);
        assert_eq!(parse_dep_spec("a", "workspace:*"), DepSpec::Workspace);
        assert_eq!(parse_dep_spec("a", "link:../linked"), DepSpec::Link);
    }

    #[test]
    fn test_registry_resolvable() {
        assert!(parse_dep_spec("a", "^1.0.0").is_registry_resolvable());
        assert!(parse_dep_spec("a", "latest").is_registry_resolvable());
        assert!(!parse_dep_spec("a", "workspace:*").is_registry_resolvable());
        assert!(!parse_dep_spec("a", "git://host/x.git").is_registry_resolvable());
    }
}
