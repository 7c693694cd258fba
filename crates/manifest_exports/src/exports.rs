/// Recursive interpreter for the "exports"/"imports" target trees.
use std::path::PathBuf;
use std::str::FromStr;

use indexmap::IndexMap;
use manifest::ExportTarget;
use path_clean::PathClean;
use path_slash::PathBufExt;
use thiserror::Error;

use crate::conditions::ResolutionConditions;

#[derive(Debug, Error)]
pub enum ExportsError {
    #[error("invalid star pattern '{0}': star patterns may contain at most a single star match")]
    InvalidStarPattern(String),
    #[error("exports keys must either be '.' or start with './' (got '{0}')")]
    InvalidExportKey(String),
}

/// Outcome of a successful pattern match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matched {
    Path(String),
    // matched a `null` target: the subpath exists but is private
    Excluded,
}

// Cleans a relative path, removing any unnecessary characters and
// normalizing it
//
// If the path is already clean, this will return the original path
pub(crate) fn clean_path_avoid_alloc<'a>(original: &'a str, store: &'a mut String) -> &'a str {
    let mut o: &'a str = original;
    if o.starts_with("./") {
        o = &original[2..]
    } else if o == "." {
        return o;
    }

    let bytes = o.as_bytes();
    for (i, c) in o.chars().enumerate() {
        // if we encounter anything that could be a character in an unclean
        // path, just fall back to path.Clean
        let is_complex_path = match c {
            // escaped chars
            '\\' => true,
            // possible part of '/.' or '..'
            '.' => i > 0 && (bytes[i - 1] == b'.' || bytes[i - 1] == b'/'),
            // consecutive slashes or './'
            '/' => i > 0 && (bytes[i - 1] == b'.' || bytes[i - 1] == b'/'),
            _ => false,
        };

        if is_complex_path {
            store.clear();
            store.push_str("./");
            match PathBuf::from_str(o) {
                Ok(buf) => match buf.clean().to_slash() {
                    Some(cleaned) => store.push_str(&cleaned),
                    None => store.push_str(o),
                },
                Err(_) => store.push_str(o),
            }
            return store;
        }
    }

    original
}

pub(crate) fn clean_path(p: &str) -> String {
    let mut store = String::new();
    String::from(clean_path_avoid_alloc(p, &mut store))
}

fn match_star_pattern<'a>(star_pattern: &str, specifier: &'a str) -> Option<&'a str> {
    let (prefix, star_suffix) = star_pattern.split_once('*')?;

    if let Some(remainder) = specifier.strip_prefix(prefix) {
        // the pattern ends with the star, so the star match is the whole
        // remainder of the specifier
        if star_suffix.is_empty() {
            return Some(remainder);
        } else if let Some(star_match) = remainder.strip_suffix(star_suffix) {
            return Some(star_match);
        }
    }

    None
}

fn rewrite_star_target(star_match: &str, resolved_to: &str, out: &mut String) {
    out.clear();
    for c in resolved_to.chars() {
        if c == '*' {
            out.push_str(star_match);
        } else {
            out.push(c);
        }
    }
}

/// Evaluates one target node against the active conditions.
///
/// Condition maps are walked in key order; a key participates when it is
/// `"default"` or a member of the active condition set. Fallback arrays
/// take their first resolvable member.
fn evaluate_target(
    target: &ExportTarget,
    star_match: Option<&str>,
    conditions: &ResolutionConditions,
) -> Result<Option<Matched>, ExportsError> {
    match target {
        ExportTarget::Path(p) => {
            let resolved = match star_match {
                Some(star) => {
                    let mut out = String::with_capacity(p.len() + star.len());
                    rewrite_star_target(star, p, &mut out);
                    out
                }
                None => p.clone(),
            };
            Ok(Some(Matched::Path(clean_path(&resolved))))
        }
        ExportTarget::Unset => Ok(Some(Matched::Excluded)),
        ExportTarget::Map(map) => {
            for (condition, nested) in map.iter() {
                if condition == "default" || conditions.contains(condition) {
                    if let Some(matched) = evaluate_target(nested, star_match, conditions)? {
                        return Ok(Some(matched));
                    }
                }
            }
            Ok(None)
        }
        ExportTarget::Fallback(alternatives) => {
            for alternative in alternatives {
                // a malformed alternative doesn't poison the whole array
                match evaluate_target(alternative, star_match, conditions) {
                    Ok(Some(matched)) => return Ok(Some(matched)),
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::debug!("skipping malformed exports fallback member: {}", e);
                        continue;
                    }
                }
            }
            Ok(None)
        }
    }
}

fn validate_star_count(pattern: &str) -> Result<(), ExportsError> {
    if pattern.chars().filter(|c| *c == '*').count() > 1 {
        return Err(ExportsError::InvalidStarPattern(pattern.to_string()));
    }
    Ok(())
}

/// Resolves a specifier against a pattern-keyed map (the dot-keyed
/// "exports" form, or the '#'-keyed "imports" map).
///
/// Literal keys are tried before patterns; among patterns the longest
/// prefix (then longest suffix) wins; deprecated node 14 directory keys
/// (trailing '/') are supported for exports maps.
fn resolve_pattern_map(
    map: &IndexMap<String, ExportTarget>,
    specifier: &str,
    conditions: &ResolutionConditions,
    allow_directory_keys: bool,
) -> Result<Option<Matched>, ExportsError> {
    // literal match
    if let Some(target) = map.get(specifier) {
        if !specifier.contains('*') {
            return evaluate_target(target, None, conditions);
        }
    }
    let mut store = String::new();
    let cleaned = clean_path_avoid_alloc(specifier, &mut store);
    for (key, target) in map.iter() {
        if !key.contains('*') && !key.ends_with('/') && clean_path(key) == cleaned {
            return evaluate_target(target, None, conditions);
        }
    }

    // star patterns: most specific (longest prefix, then suffix) first
    let mut star_keys: Vec<&String> = map.keys().filter(|k| k.contains('*')).collect();
    star_keys.sort_by_key(|k| {
        let (prefix, suffix) = k.split_once('*').unwrap_or((k.as_str(), ""));
        std::cmp::Reverse((prefix.len(), suffix.len()))
    });
    for key in star_keys {
        validate_star_count(key)?;
        if let Some(star_match) = match_star_pattern(&clean_path(key), cleaned) {
            return evaluate_target(&map[key.as_str()], Some(star_match), conditions);
        }
    }

    // deprecated node 14.x directory patterns
    if allow_directory_keys {
        let mut dir_keys: Vec<&String> = map
            .keys()
            .filter(|k| k.ends_with('/') && !k.contains('*'))
            .collect();
        dir_keys.sort_by_key(|k| std::cmp::Reverse(k.len()));
        for key in dir_keys {
            if let Some(remainder) = cleaned.strip_prefix(key.as_str()) {
                let resolved = evaluate_target(&map[key.as_str()], None, conditions)?;
                return Ok(resolved.map(|matched| match matched {
                    Matched::Path(dir) => {
                        let mut out = String::with_capacity(dir.len() + remainder.len());
                        out.push_str(&dir);
                        out.push_str(remainder);
                        Matched::Path(out)
                    }
                    Matched::Excluded => Matched::Excluded,
                }));
            }
        }
    }

    Ok(None)
}

/// Resolves a package-relative subpath (`"."` or `"./x"`) against an
/// "exports" field value.
pub fn resolve_exports(
    exports: &ExportTarget,
    subpath: &str,
    conditions: &ResolutionConditions,
) -> Result<Option<Matched>, ExportsError> {
    let mut store = String::new();
    let subpath = clean_path_avoid_alloc(subpath, &mut store);

    match exports {
        ExportTarget::Map(map) => {
            let is_subpath_map = map.keys().any(|k| k.starts_with('.'));
            if is_subpath_map {
                for key in map.keys() {
                    if !key.starts_with('.') {
                        return Err(ExportsError::InvalidExportKey(key.clone()));
                    }
                }
                resolve_pattern_map(map, subpath, conditions, true)
            } else {
                // a bare condition map is sugar for { ".": {...} }
                if subpath == "." {
                    evaluate_target(exports, None, conditions)
                } else {
                    Ok(None)
                }
            }
        }
        // string/array/null sugar only exports the root
        _ => {
            if subpath == "." {
                evaluate_target(exports, None, conditions)
            } else {
                Ok(None)
            }
        }
    }
}

/// Resolves a `#`-prefixed specifier against an "imports" map.
pub fn resolve_imports(
    imports: &IndexMap<String, ExportTarget>,
    specifier: &str,
    conditions: &ResolutionConditions,
) -> Result<Option<Matched>, ExportsError> {
    if !specifier.starts_with('#') {
        return Ok(None);
    }
    resolve_pattern_map(imports, specifier, conditions, false)
}
