/// Package entry-point selection: modern "exports" first, then the
/// legacy main/module/browser fields.
use indexmap::IndexMap;
use manifest::{Browser, PackageManifest, StringOrBool};

use crate::conditions::{Platform, ResolutionConditions, RuntimeOverlay};
use crate::exports::{clean_path, resolve_exports, ExportsError, Matched};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyField {
    Browser,
    Module,
    Main,
    // runtime-distinguished fields like "react-native" or "electron"
    Custom(String),
}

impl LegacyField {
    /// The platform-default field order.
    ///
    /// On the browser platform the order flips to main-before-module in
    /// require context when the browser field is not a string entry,
    /// matching how cjs consumers historically read these packages.
    pub fn default_order(
        platform: Platform,
        require: bool,
        browser_is_string_entry: bool,
        runtime: Option<&RuntimeOverlay>,
    ) -> Vec<LegacyField> {
        let mut fields = match platform {
            Platform::Browser => {
                if require && !browser_is_string_entry {
                    vec![LegacyField::Browser, LegacyField::Main, LegacyField::Module]
                } else {
                    vec![LegacyField::Browser, LegacyField::Module, LegacyField::Main]
                }
            }
            Platform::Node => vec![LegacyField::Main, LegacyField::Module],
            Platform::Neutral => vec![],
        };

        if let Some(overlay) = runtime {
            if let Some(main_field) = overlay.main_field {
                fields.insert(0, LegacyField::Custom(main_field.to_string()));
            }
        }

        fields
    }

    /// Parses user-configured main field names.
    pub fn from_name(name: &str) -> LegacyField {
        match name {
            "browser" => LegacyField::Browser,
            "module" => LegacyField::Module,
            "main" => LegacyField::Main,
            other => LegacyField::Custom(other.to_string()),
        }
    }
}

/// Remapping table from a browser-field object form.
///
/// Keys are either package-relative paths or bare module names; a `false`
/// value excludes the source from browser builds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrowserRemappings {
    map: IndexMap<String, Option<String>>,
}

impl BrowserRemappings {
    fn from_browser_map(map: &IndexMap<String, StringOrBool>) -> Self {
        let mut remapped = IndexMap::with_capacity(map.len());
        for (source, target) in map.iter() {
            let key = if source.starts_with("./") || source == "." {
                clean_path(source)
            } else {
                source.clone()
            };
            let value = match target {
                StringOrBool::Str(dest) => Some(clean_path(dest)),
                // `true` is an invalid value we just ignore
                StringOrBool::Bool(true) => continue,
                StringOrBool::Bool(false) => None,
            };
            remapped.insert(key, value);
        }
        Self { map: remapped }
    }

    /// Looks up a remap for a package-relative path or module name.
    ///
    /// `Some(None)` means excluded; `Some(Some(p))` means rewritten.
    pub fn remap(&self, source: &str) -> Option<&Option<String>> {
        if let Some(hit) = self.map.get(source) {
            return Some(hit);
        }
        if source.starts_with("./") || source == "." {
            return self.map.get(clean_path(source).as_str());
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedEntry {
    /// Package-relative path of the selected entry, if any.
    pub path: Option<String>,
    /// Whether the modern "exports" field produced the entry.
    pub used_modern: bool,
    /// Whether the subpath is deliberately excluded (null export, or a
    /// browser-field `false`).
    pub excluded: bool,
    /// Remapping table captured from a browser-field object form.
    pub browser_remappings: Option<BrowserRemappings>,
}

#[derive(Debug, Clone)]
pub struct EntryOptions<'a> {
    pub conditions: &'a ResolutionConditions,
    pub legacy_fields: &'a [LegacyField],
    /// When set, a non-root subpath that nothing resolved is used
    /// verbatim as the package-relative path.
    pub allow_literal_subpath: bool,
}

fn normalize_subpath(subpath: &str) -> String {
    let trimmed = subpath.trim_start_matches('/');
    if trimmed.is_empty() || trimmed == "." {
        return ".".to_string();
    }
    if trimmed.starts_with("./") {
        clean_path(trimmed)
    } else {
        let mut prefixed = String::with_capacity(trimmed.len() + 2);
        prefixed.push_str("./");
        prefixed.push_str(trimmed);
        clean_path(&prefixed)
    }
}

fn legacy_entry_candidate(
    pkg: &PackageManifest,
    fields: &[LegacyField],
) -> (Option<String>, bool, Option<BrowserRemappings>) {
    let mut entry: Option<String> = None;
    let mut excluded = false;
    let mut remappings: Option<BrowserRemappings> = None;

    for field in fields {
        match field {
            LegacyField::Browser => match &pkg.browser {
                Some(Browser::Str(path)) => {
                    if entry.is_none() {
                        entry = Some(path.clone());
                    }
                }
                Some(Browser::Arr(paths)) => {
                    if entry.is_none() {
                        entry = paths.first().cloned();
                    }
                }
                Some(Browser::Obj(map)) => {
                    // object form is a remapping table, not an entry point
                    if remappings.is_none() {
                        remappings = Some(BrowserRemappings::from_browser_map(map));
                    }
                }
                Some(Browser::Flag(false)) => {
                    excluded = true;
                }
                Some(Browser::Flag(true)) | None => {}
            },
            LegacyField::Module => {
                if entry.is_none() {
                    entry = pkg.module.clone();
                }
            }
            LegacyField::Main => {
                if entry.is_none() {
                    entry = pkg.main.clone();
                }
            }
            LegacyField::Custom(name) => {
                if entry.is_none() {
                    entry = pkg.string_field(name).map(str::to_string);
                }
            }
        }
    }

    (entry, excluded, remappings)
}

/// Selects the file a package subpath maps to.
///
/// 1. normalize the subpath to `"."`/`"./rest"`;
/// 2. modern "exports", retrying with `require` appended when the first
///    pass misses outside require context;
/// 3. legacy fields in order (root subpath only), with the browser-field
///    object form consulted as a remap over the chosen entry;
/// 4. the literal subpath when allowed;
/// 5. `./index.js`.
pub fn resolve_package_entry(
    pkg: &PackageManifest,
    subpath: &str,
    opts: &EntryOptions,
) -> Result<ResolvedEntry, ExportsError> {
    let subpath = normalize_subpath(subpath);
    let is_root = subpath == ".";

    // modern exports
    if let Some(exports) = &pkg.exports {
        let mut matched = resolve_exports(exports, &subpath, opts.conditions)?;
        if matched.is_none() && !opts.conditions.require {
            matched = resolve_exports(exports, &subpath, &opts.conditions.with_require())?;
        }
        match matched {
            Some(Matched::Path(path)) => {
                return Ok(ResolvedEntry {
                    path: Some(path),
                    used_modern: true,
                    excluded: false,
                    browser_remappings: None,
                })
            }
            Some(Matched::Excluded) => {
                return Ok(ResolvedEntry {
                    path: None,
                    used_modern: true,
                    excluded: true,
                    browser_remappings: None,
                })
            }
            None => {}
        }
    }

    // legacy fields only ever describe the package root
    if is_root {
        // strip the browser field when the active runtime disabled it
        let filtered: Vec<LegacyField>;
        let fields: &[LegacyField] = if opts.conditions.browser_field {
            opts.legacy_fields
        } else {
            filtered = opts
                .legacy_fields
                .iter()
                .filter(|f| **f != LegacyField::Browser)
                .cloned()
                .collect();
            &filtered
        };
        let (entry, excluded, remappings) = legacy_entry_candidate(pkg, fields);

        if excluded {
            return Ok(ResolvedEntry {
                path: None,
                used_modern: false,
                excluded: true,
                browser_remappings: remappings,
            });
        }

        if let Some(raw_entry) = entry {
            let cleaned = normalize_subpath(&raw_entry);
            // route the chosen entry back through the remap table
            if let Some(table) = &remappings {
                match table.remap(&cleaned) {
                    Some(None) => {
                        return Ok(ResolvedEntry {
                            path: None,
                            used_modern: false,
                            excluded: true,
                            browser_remappings: remappings,
                        })
                    }
                    Some(Some(rewritten)) => {
                        return Ok(ResolvedEntry {
                            path: Some(rewritten.clone()),
                            used_modern: false,
                            excluded: false,
                            browser_remappings: remappings,
                        })
                    }
                    None => {}
                }
            }
            return Ok(ResolvedEntry {
                path: Some(cleaned),
                used_modern: false,
                excluded: false,
                browser_remappings: remappings,
            });
        }

        if remappings.is_some() {
            // no entry field, but keep the table for later lookups
            return Ok(ResolvedEntry {
                path: Some("./index.js".to_string()),
                used_modern: false,
                excluded: false,
                browser_remappings: remappings,
            });
        }
    }

    if opts.allow_literal_subpath && !is_root {
        return Ok(ResolvedEntry {
            path: Some(subpath),
            used_modern: false,
            excluded: false,
            browser_remappings: None,
        });
    }

    if is_root {
        return Ok(ResolvedEntry {
            path: Some("./index.js".to_string()),
            used_modern: false,
            excluded: false,
            browser_remappings: None,
        });
    }

    Ok(ResolvedEntry::default())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::conditions::{ConditionOptions, ImportKind, Platform};
    use pretty_assertions::assert_eq;

    fn browser_conditions() -> ResolutionConditions {
        ResolutionConditions::compute(&ConditionOptions {
            platform: Platform::Browser,
            kind: ImportKind::ImportStatement,
            ..Default::default()
        })
    }

    fn browser_fields() -> Vec<LegacyField> {
        LegacyField::default_order(Platform::Browser, false, false, None)
    }

    fn parse(raw: &str) -> PackageManifest {
        PackageManifest::parse(raw.as_bytes()).unwrap()
    }

    #[test]
    fn test_modern_exports_win() {
        let pkg = parse(
            r#"{
                "main": "./lib/index.js",
                "exports": { ".": { "import": "./esm/index.js", "default": "./lib/index.js" } }
            }"#,
        );
        let c = browser_conditions();
        let fields = browser_fields();
        let resolved = resolve_package_entry(
            &pkg,
            ".",
            &EntryOptions {
                conditions: &c,
                legacy_fields: &fields,
                allow_literal_subpath: true,
            },
        )
        .unwrap();
        assert_eq!(resolved.path.as_deref(), Some("./esm/index.js"));
        assert!(resolved.used_modern);
    }

    #[test]
    fn test_require_retry_on_modern_miss() {
        let pkg = parse(r#"{ "exports": { ".": { "require": "./cjs/index.js" } } }"#);
        let c = browser_conditions();
        let fields = browser_fields();
        let resolved = resolve_package_entry(
            &pkg,
            ".",
            &EntryOptions {
                conditions: &c,
                legacy_fields: &fields,
                allow_literal_subpath: true,
            },
        )
        .unwrap();
        assert_eq!(resolved.path.as_deref(), Some("./cjs/index.js"));
        assert!(resolved.used_modern);
    }

    #[test]
    fn test_browser_string_entry_beats_main() {
        let pkg = parse(r#"{ "main": "./lib/node.js", "browser": "./lib/browser.js" }"#);
        let c = browser_conditions();
        let fields = browser_fields();
        let resolved = resolve_package_entry(
            &pkg,
            ".",
            &EntryOptions {
                conditions: &c,
                legacy_fields: &fields,
                allow_literal_subpath: true,
            },
        )
        .unwrap();
        assert_eq!(resolved.path.as_deref(), Some("./lib/browser.js"));
        assert!(!resolved.used_modern);
    }

    #[test]
    fn test_browser_object_is_remap_not_entry() {
        let pkg = parse(
            r#"{
                "main": "./lib/index.js",
                "browser": { "./lib/node.js": "./lib/browser.js", "fs": false }
            }"#,
        );
        let c = browser_conditions();
        let fields = browser_fields();
        let resolved = resolve_package_entry(
            &pkg,
            ".",
            &EntryOptions {
                conditions: &c,
                legacy_fields: &fields,
                allow_literal_subpath: true,
            },
        )
        .unwrap();
        // entry comes from "main"; the object form only remaps
        assert_eq!(resolved.path.as_deref(), Some("./lib/index.js"));
        let table = resolved.browser_remappings.expect("remap table recorded");
        assert_eq!(table.remap("fs"), Some(&None));
        assert_eq!(
            table.remap("./lib/node.js"),
            Some(&Some("./lib/browser.js".to_string()))
        );
        assert_eq!(table.remap("./lib/other.js"), None);
    }

    #[test]
    fn test_browser_remap_rewrites_chosen_entry() {
        let pkg = parse(
            r#"{
                "main": "./lib/node.js",
                "browser": { "./lib/node.js": "./lib/browser.js" }
            }"#,
        );
        let c = browser_conditions();
        let fields = browser_fields();
        let resolved = resolve_package_entry(
            &pkg,
            ".",
            &EntryOptions {
                conditions: &c,
                legacy_fields: &fields,
                allow_literal_subpath: true,
            },
        )
        .unwrap();
        assert_eq!(resolved.path.as_deref(), Some("./lib/browser.js"));
    }

    #[test]
    fn test_browser_false_excludes_package() {
        let pkg = parse(r#"{ "main": "./lib/index.js", "browser": false }"#);
        let c = browser_conditions();
        let fields = browser_fields();
        let resolved = resolve_package_entry(
            &pkg,
            ".",
            &EntryOptions {
                conditions: &c,
                legacy_fields: &fields,
                allow_literal_subpath: true,
            },
        )
        .unwrap();
        assert!(resolved.excluded);
        assert_eq!(resolved.path, None);
    }

    #[test]
    fn test_literal_subpath_passthrough() {
        let pkg = parse(r#"{ "main": "./lib/index.js" }"#);
        let c = browser_conditions();
        let fields = browser_fields();
        let resolved = resolve_package_entry(
            &pkg,
            "lib/util.js",
            &EntryOptions {
                conditions: &c,
                legacy_fields: &fields,
                allow_literal_subpath: true,
            },
        )
        .unwrap();
        assert_eq!(resolved.path.as_deref(), Some("./lib/util.js"));
        assert!(!resolved.used_modern);
    }

    #[test]
    fn test_index_js_fallback() {
        let pkg = parse(r#"{ "name": "empty" }"#);
        let c = browser_conditions();
        let fields = browser_fields();
        let resolved = resolve_package_entry(
            &pkg,
            ".",
            &EntryOptions {
                conditions: &c,
                legacy_fields: &fields,
                allow_literal_subpath: true,
            },
        )
        .unwrap();
        assert_eq!(resolved.path.as_deref(), Some("./index.js"));
    }

    #[test]
    fn test_null_export_subpath_is_excluded() {
        let pkg = parse(
            r#"{ "exports": { ".": "./index.js", "./internal": null } }"#,
        );
        let c = browser_conditions();
        let fields = browser_fields();
        let resolved = resolve_package_entry(
            &pkg,
            "./internal",
            &EntryOptions {
                conditions: &c,
                legacy_fields: &fields,
                allow_literal_subpath: true,
            },
        )
        .unwrap();
        assert!(resolved.excluded);
        assert!(resolved.used_modern);
        assert_eq!(resolved.path, None);
    }

    #[test]
    fn test_neutral_platform_has_no_legacy_fields() {
        let pkg = parse(r#"{ "main": "./lib/index.js" }"#);
        let c = ResolutionConditions::compute(&ConditionOptions {
            platform: Platform::Neutral,
            kind: ImportKind::ImportStatement,
            ..Default::default()
        });
        let fields = LegacyField::default_order(Platform::Neutral, false, false, None);
        assert!(fields.is_empty());
        let resolved = resolve_package_entry(
            &pkg,
            ".",
            &EntryOptions {
                conditions: &c,
                legacy_fields: &fields,
                allow_literal_subpath: true,
            },
        )
        .unwrap();
        // nothing legacy applies, so the last resort wins
        assert_eq!(resolved.path.as_deref(), Some("./index.js"));
    }

    #[test]
    fn test_runtime_main_field_prepended() {
        let pkg = parse(r#"{ "main": "./lib/index.js", "react-native": "./lib/rn.js" }"#);
        let overlay = RuntimeOverlay::lookup("react-native").unwrap();
        let c = ResolutionConditions::compute(&ConditionOptions {
            platform: Platform::Browser,
            kind: ImportKind::ImportStatement,
            runtime: Some(overlay),
            ..Default::default()
        });
        let fields = LegacyField::default_order(Platform::Browser, false, false, Some(overlay));
        let resolved = resolve_package_entry(
            &pkg,
            ".",
            &EntryOptions {
                conditions: &c,
                legacy_fields: &fields,
                allow_literal_subpath: true,
            },
        )
        .unwrap();
        assert_eq!(resolved.path.as_deref(), Some("./lib/rn.js"));
    }
}
