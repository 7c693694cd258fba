/// Parsing of `jsr:@scope/name@version/subpath` specifiers.
use lazy_static::lazy_static;
use regex::Regex;

use crate::package_name::SpecError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsrSpec {
    // without the '@' sigil
    pub scope: String,
    pub name: String,
    pub version: Option<String>,
    pub subpath: String,
}

impl JsrSpec {
    /// `@scope/name`, the registry-facing package name.
    pub fn package_name(&self) -> String {
        format!("@{}/{}", self.scope, self.name)
    }

    /// The subpath in `"."`/`"./rest"` form.
    pub fn entry_subpath(&self) -> String {
        if self.subpath.is_empty() {
            ".".to_string()
        } else {
            format!("./{}", self.subpath)
        }
    }
}

lazy_static! {
    // scope: 2-20 chars, name: 2-58; lowercase alphanumeric with
    // non-leading hyphens
    static ref SCOPE_RE: Regex = Regex::new(r"^[a-z0-9][a-z0-9\-]{1,19}$").unwrap();
    static ref NAME_RE: Regex = Regex::new(r"^[a-z0-9][a-z0-9\-]{1,57}$").unwrap();
}

/// Parses a `jsr:` specifier. The scope sigil and separator shapes are
/// strict; anything else is an input-level error.
pub fn parse_jsr_spec(raw: &str) -> Result<JsrSpec, SpecError> {
    let fail = |reason: &str| {
        Err(SpecError::InvalidJsr {
            spec: raw.to_string(),
            reason: reason.to_string(),
        })
    };

    let Some(rest) = raw.strip_prefix("jsr:") else {
        return fail("missing 'jsr:' prefix");
    };
    // tolerate the "jsr:/@scope/..." form some tools emit
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    let Some(rest) = rest.strip_prefix('@') else {
        return fail("jsr packages are always scoped ('jsr:@scope/name')");
    };

    let Some((scope, rest)) = rest.split_once('/') else {
        return fail("missing '/name' after the scope");
    };
    if !SCOPE_RE.is_match(scope) {
        return fail("scope must be 2-20 lowercase alphanumeric/hyphen characters, hyphen not leading");
    }

    let (name_and_version, subpath) = match rest.split_once('/') {
        Some((nv, sub)) => (nv, sub),
        None => (rest, ""),
    };
    let (name, version) = match name_and_version.split_once('@') {
        Some((_, v)) if v.is_empty() => return fail("empty version after '@'"),
        Some((n, v)) => (n, Some(v.to_string())),
        None => (name_and_version, None),
    };
    if !NAME_RE.is_match(name) {
        return fail("name must be 2-58 lowercase alphanumeric/hyphen characters, hyphen not leading");
    }

    Ok(JsrSpec {
        scope: scope.to_string(),
        name: name.to_string(),
        version,
        subpath: subpath.to_string(),
    })
}
