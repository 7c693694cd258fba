/// Evaluation of the package.json "sideEffects" field into tree-shaking
/// hints.
use manifest::SideEffects;
use regex::Regex;

// Extensions the evaluator makes claims about; anything else is assumed
// to have side effects (stylesheets, assets, ...).
static JS_LIKE_EXTENSIONS: &[&str] = &[
    "js", "mjs", "cjs", "jsx", "ts", "tsx", "mts", "cts",
];

fn is_js_like(path: &str) -> bool {
    vpath_extension(path)
        .map(|ext| JS_LIKE_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

fn vpath_extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(&name[idx + 1..]),
    }
}

/// Compiled matcher for a package's "sideEffects" globs.
#[derive(Debug)]
pub enum SideEffectsMatcher {
    // sideEffects: false
    None,
    // sideEffects: [globs]
    Globs(Vec<Regex>),
}

// Translates one glob into an anchored regex with globstar semantics.
//
// A pattern without '/' is treated as "**/<pattern>" so "*.css" matches
// at any depth, mirroring how bundlers interpret the field.
fn compile_glob(pattern: &str) -> Option<Regex> {
    let normalized = if pattern.contains('/') {
        pattern.trim_start_matches("./").to_string()
    } else {
        format!("**/{}", pattern)
    };

    let mut re = String::with_capacity(normalized.len() * 2 + 2);
    re.push('^');
    let mut chars = normalized.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // "**/" matches zero or more whole segments
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        re.push_str("(?:[^/]*/)*");
                    } else {
                        re.push_str(".*");
                    }
                } else {
                    re.push_str("[^/]*");
                }
            }
            '?' => re.push_str("[^/]"),
            '{' => re.push_str("(?:"),
            '}' => re.push(')'),
            ',' => re.push('|'),
            '.' | '+' | '(' | ')' | '[' | ']' | '^' | '$' | '|' | '\\' => {
                re.push('\\');
                re.push(c);
            }
            other => re.push(other),
        }
    }
    re.push('$');

    match Regex::new(&re) {
        Ok(compiled) => Some(compiled),
        Err(e) => {
            tracing::warn!("unusable sideEffects glob '{}': {}", pattern, e);
            None
        }
    }
}

impl SideEffectsMatcher {
    /// Compiles a "sideEffects" field value.
    ///
    /// Returns `None` for `true`/absent: the package makes no claim and
    /// every file is assumed effectful.
    pub fn compile(field: &SideEffects) -> Option<SideEffectsMatcher> {
        match field {
            SideEffects::Flag(true) => None,
            SideEffects::Flag(false) => Some(SideEffectsMatcher::None),
            SideEffects::Globs(globs) => Some(SideEffectsMatcher::Globs(
                globs.iter().filter_map(|g| compile_glob(g)).collect(),
            )),
        }
    }

    /// The side-effect hint for a package-relative path.
    ///
    /// `Some(false)` marks the file safe to drop when unused; `None`
    /// means no claim is made.
    pub fn evaluate(&self, package_relative_path: &str) -> Option<bool> {
        let path = package_relative_path.trim_start_matches("./");
        if !is_js_like(path) {
            return None;
        }
        match self {
            SideEffectsMatcher::None => Some(false),
            SideEffectsMatcher::Globs(globs) => {
                if globs.iter().any(|g| g.is_match(path)) {
                    // listed files keep their side effects
                    None
                } else {
                    Some(false)
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flag_true_makes_no_claim() {
        assert!(SideEffectsMatcher::compile(&SideEffects::Flag(true)).is_none());
    }

    #[test]
    fn test_flag_false_marks_js_files_free() {
        let matcher = SideEffectsMatcher::compile(&SideEffects::Flag(false)).unwrap();
        assert_eq!(matcher.evaluate("./lib/index.js"), Some(false));
        assert_eq!(matcher.evaluate("src/deep/mod.ts"), Some(false));
        // non-JS files are out of scope for the hint
        assert_eq!(matcher.evaluate("./styles/site.css"), None);
        assert_eq!(matcher.evaluate("./data.json"), None);
    }

    #[test]
    fn test_bare_glob_matches_any_depth() {
        let matcher = SideEffectsMatcher::compile(&SideEffects::Globs(vec![
            "*.global.js".to_string(),
        ]))
        .unwrap();
        assert_eq!(matcher.evaluate("./boot.global.js"), None);
        assert_eq!(matcher.evaluate("./nested/deep/boot.global.js"), None);
        assert_eq!(matcher.evaluate("./lib/pure.js"), Some(false));
    }

    #[test]
    fn test_pathed_glob_is_anchored() {
        let matcher = SideEffectsMatcher::compile(&SideEffects::Globs(vec![
            "./src/polyfills/*.js".to_string(),
        ]))
        .unwrap();
        assert_eq!(matcher.evaluate("./src/polyfills/url.js"), None);
        assert_eq!(matcher.evaluate("./src/other/url.js"), Some(false));
        // single star doesn't cross segments
        assert_eq!(matcher.evaluate("./src/polyfills/deep/url.js"), Some(false));
    }

    #[test]
    fn test_globstar_crosses_segments() {
        let matcher = SideEffectsMatcher::compile(&SideEffects::Globs(vec![
            "dist/**/*.effect.js".to_string(),
        ]))
        .unwrap();
        assert_eq!(matcher.evaluate("./dist/a/b/c/x.effect.js"), None);
        assert_eq!(matcher.evaluate("./dist/x.effect.js"), None);
        assert_eq!(matcher.evaluate("./other/x.effect.js"), Some(false));
    }

    #[test]
    fn test_brace_alternation() {
        let matcher = SideEffectsMatcher::compile(&SideEffects::Globs(vec![
            "./src/boot.{js,ts}".to_string(),
        ]))
        .unwrap();
        assert_eq!(matcher.evaluate("./src/boot.js"), None);
        assert_eq!(matcher.evaluate("./src/boot.ts"), None);
        assert_eq!(matcher.evaluate("./src/boot.mjs"), Some(false));
    }
}
