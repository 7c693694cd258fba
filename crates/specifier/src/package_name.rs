/// Parsing of `name@version/subpath` package specifiers.
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SpecError {
    #[error("invalid package name '{name}': {reason}")]
    InvalidPackageName { name: String, reason: String },
    #[error("invalid jsr specifier '{spec}': {reason}")]
    InvalidJsr { spec: String, reason: String },
    #[error("invalid npm alias target '{target}': {reason}")]
    InvalidAlias { target: String, reason: String },
}

/// A parsed `name[@version][/subpath]` specifier.
///
/// `subpath` never carries a leading slash; an empty subpath addresses the
/// package root.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageSpec {
    pub name: String,
    pub version: Option<String>,
    pub subpath: String,
}

impl PackageSpec {
    /// The subpath in `"."`/`"./rest"` form for entry resolution.
    pub fn entry_subpath(&self) -> String {
        if self.subpath.is_empty() {
            ".".to_string()
        } else {
            format!("./{}", self.subpath)
        }
    }
}

lazy_static! {
    // conservative form of the npm name grammar; legacy uppercase names
    // are rejected like new publishes are
    static ref NAME_RE: Regex =
        Regex::new(r"^(?:@[a-z0-9\-_.~!*'()]+/)?[a-z0-9\-_.~!*'()][a-z0-9\-_.~!*'()]*$").unwrap();
}

/// Validates a package name per the npm registry rules.
pub fn validate_package_name(name: &str) -> Result<(), SpecError> {
    let fail = |reason: &str| {
        Err(SpecError::InvalidPackageName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.is_empty() {
        return fail("name is empty");
    }
    if name.len() > 214 {
        return fail("name exceeds 214 characters");
    }
    let bare = name.strip_prefix('@').map(|rest| {
        // the scope separator splits exactly once
        rest.split_once('/').map(|(_, n)| n).unwrap_or(rest)
    });
    if let Some(bare) = bare {
        if !name.contains('/') {
            return fail("scoped name is missing its '/name' part");
        }
        if bare.is_empty() {
            return fail("scoped name is empty");
        }
    }
    let inner = bare.unwrap_or(name);
    if inner.starts_with('.') || inner.starts_with('_') {
        return fail("name may not start with '.' or '_'");
    }
    if name != name.to_lowercase() {
        return fail("name must be lowercase");
    }
    if !NAME_RE.is_match(name) {
        return fail("name contains non-URL-safe characters");
    }
    Ok(())
}

/// Parses `name@version/subpath`, validating the name.
///
/// Handles scoped names (`@scope/pkg@1.0.0/sub`) and all omission forms
/// (`pkg`, `pkg/sub`, `pkg@1.0.0`).
pub fn parse_package_name(raw: &str) -> Result<PackageSpec, SpecError> {
    let (name_and_version, subpath) = split_name_and_subpath(raw);

    let (name, version) = match name_and_version
        .strip_prefix('@')
        .map(|rest| rest.find('@').map(|i| i + 1))
        .unwrap_or_else(|| name_and_version.find('@'))
    {
        Some(at_idx) => {
            let (n, v) = name_and_version.split_at(at_idx);
            (n, Some(v[1..].to_string()))
        }
        None => (name_and_version, None),
    };

    if version.as_deref() == Some("") {
        return Err(SpecError::InvalidPackageName {
            name: raw.to_string(),
            reason: "empty version after '@'".to_string(),
        });
    }

    validate_package_name(name)?;

    Ok(PackageSpec {
        name: name.to_string(),
        version,
        subpath: subpath.to_string(),
    })
}

fn split_name_and_subpath(raw: &str) -> (&str, &str) {
    // a scoped name owns its first slash
    let search_from = if raw.starts_with('@') {
        raw.find('/').map(|i| i + 1).unwrap_or(raw.len())
    } else {
        0
    };
    match raw[search_from..].find('/') {
        Some(idx) => {
            let split = search_from + idx;
            (&raw[..split], &raw[split + 1..])
        }
        None => (raw, ""),
    }
}

/// Formats `name@version/subpath`, the inverse of [`parse_package_name`].
pub fn build_package_spec(name: &str, version: Option<&str>, subpath: &str) -> String {
    let mut spec = String::with_capacity(
        name.len() + version.map(|v| v.len() + 1).unwrap_or(0) + subpath.len() + 1,
    );
    spec.push_str(name);
    if let Some(version) = version {
        spec.push('@');
        spec.push_str(version);
    }
    if !subpath.is_empty() {
        spec.push('/');
        spec.push_str(subpath.trim_start_matches('/'));
    }
    spec
}
