/// Computation of the active condition set used to evaluate
/// "exports"/"imports" trees.
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Browser,
    Node,
    Neutral,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Esm,
    Cjs,
    Iife,
}

// How an import site referenced the module, esbuild-style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportKind {
    #[default]
    EntryPoint,
    ImportStatement,
    DynamicImport,
    RequireCall,
    RequireResolve,
    ImportRule,
    UrlToken,
}

impl ImportKind {
    /// Whether this kind evaluates in require context, given the output
    /// format (a cjs entry point is a require).
    pub fn is_require(&self, format: OutputFormat) -> bool {
        match self {
            ImportKind::RequireCall | ImportKind::RequireResolve => true,
            ImportKind::EntryPoint => format == OutputFormat::Cjs,
            _ => false,
        }
    }
}

/// Per-runtime adjustments layered on top of the platform defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeOverlay {
    pub name: &'static str,
    pub conditions: &'static [&'static str],
    // whether the package.json "browser" field participates
    pub browser_field: bool,
    // distinguished legacy main field, prepended to the field order
    pub main_field: Option<&'static str>,
}

static RUNTIME_OVERLAYS: &[RuntimeOverlay] = &[
    RuntimeOverlay {
        name: "react-native",
        conditions: &["react-native"],
        browser_field: false,
        main_field: Some("react-native"),
    },
    RuntimeOverlay {
        name: "electron-main",
        conditions: &["electron", "node"],
        browser_field: false,
        main_field: Some("electron"),
    },
    RuntimeOverlay {
        name: "electron-renderer",
        conditions: &["electron", "browser"],
        browser_field: true,
        main_field: Some("electron"),
    },
    RuntimeOverlay {
        name: "deno",
        conditions: &["deno", "node"],
        browser_field: false,
        main_field: None,
    },
    RuntimeOverlay {
        name: "bun",
        conditions: &["bun", "node"],
        browser_field: false,
        main_field: None,
    },
    RuntimeOverlay {
        name: "workerd",
        conditions: &["workerd", "worker", "browser"],
        browser_field: false,
        main_field: None,
    },
    RuntimeOverlay {
        name: "edge-light",
        conditions: &["edge-light", "worker", "browser"],
        browser_field: true,
        main_field: None,
    },
];

impl RuntimeOverlay {
    pub fn lookup(name: &str) -> Option<&'static RuntimeOverlay> {
        RUNTIME_OVERLAYS.iter().find(|o| o.name == name)
    }
}

/// Inputs to the condition computation.
#[derive(Debug, Clone, Default)]
pub struct ConditionOptions {
    pub platform: Platform,
    pub format: OutputFormat,
    pub kind: ImportKind,
    pub user_conditions: Option<Vec<String>>,
    pub runtime: Option<&'static RuntimeOverlay>,
}

/// The active condition set, ordered, always ending with "default".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionConditions {
    pub browser_field: bool,
    pub require: bool,
    pub conditions: Vec<String>,
}

impl ResolutionConditions {
    pub fn compute(opts: &ConditionOptions) -> Self {
        let require = opts.kind.is_require(opts.format);
        let mut conditions: Vec<String> = Vec::with_capacity(8);

        conditions.push(if require { "require" } else { "import" }.to_string());

        match opts.platform {
            Platform::Browser => conditions.push("browser".to_string()),
            Platform::Node => conditions.push("node".to_string()),
            Platform::Neutral => {}
        }

        // "module" is only implied when the user didn't pin conditions
        if opts.user_conditions.is_none() && opts.platform != Platform::Neutral {
            conditions.push("module".to_string());
        }

        if let Some(overlay) = opts.runtime {
            for c in overlay.conditions {
                push_unique(&mut conditions, c);
            }
        }

        if let Some(user) = &opts.user_conditions {
            for c in user {
                push_unique(&mut conditions, c);
            }
        }

        conditions.push("default".to_string());

        let browser_field = match opts.runtime {
            Some(overlay) => overlay.browser_field,
            None => opts.platform == Platform::Browser,
        };

        ResolutionConditions {
            browser_field,
            require,
            conditions,
        }
    }

    pub fn contains(&self, condition: &str) -> bool {
        self.conditions.iter().any(|c| c == condition)
    }

    /// The same set with "require" active, for the retry path.
    pub fn with_require(&self) -> Self {
        let mut clone = self.clone();
        clone.require = true;
        if !clone.contains("require") {
            // keep "default" last
            let insert_at = clone.conditions.len().saturating_sub(1);
            clone.conditions.insert(insert_at, "require".to_string());
        }
        clone
    }
}

fn push_unique(conditions: &mut Vec<String>, c: &str) {
    if !conditions.iter().any(|existing| existing == c) {
        conditions.push(c.to_string());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn condition_names(c: &ResolutionConditions) -> Vec<&str> {
        c.conditions.iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn test_browser_esm_defaults() {
        let c = ResolutionConditions::compute(&ConditionOptions {
            platform: Platform::Browser,
            format: OutputFormat::Esm,
            kind: ImportKind::ImportStatement,
            user_conditions: None,
            runtime: None,
        });
        assert_eq!(
            condition_names(&c),
            vec!["import", "browser", "module", "default"]
        );
        assert!(c.browser_field);
        assert!(!c.require);
    }

    #[test]
    fn test_cjs_entry_is_require() {
        let c = ResolutionConditions::compute(&ConditionOptions {
            platform: Platform::Node,
            format: OutputFormat::Cjs,
            kind: ImportKind::EntryPoint,
            user_conditions: None,
            runtime: None,
        });
        assert_eq!(
            condition_names(&c),
            vec!["require", "node", "module", "default"]
        );
        assert!(c.require);
        assert!(!c.browser_field);
    }

    #[test]
    fn test_user_conditions_suppress_module() {
        let c = ResolutionConditions::compute(&ConditionOptions {
            platform: Platform::Browser,
            format: OutputFormat::Esm,
            kind: ImportKind::ImportStatement,
            user_conditions: Some(vec!["development".to_string()]),
            runtime: None,
        });
        assert_eq!(
            condition_names(&c),
            vec!["import", "browser", "development", "default"]
        );
    }

    #[test]
    fn test_neutral_platform_adds_nothing() {
        let c = ResolutionConditions::compute(&ConditionOptions {
            platform: Platform::Neutral,
            format: OutputFormat::Esm,
            kind: ImportKind::ImportStatement,
            user_conditions: None,
            runtime: None,
        });
        assert_eq!(condition_names(&c), vec!["import", "default"]);
    }

    #[test]
    fn test_runtime_overlay_conditions_and_browser_flag() {
        let c = ResolutionConditions::compute(&ConditionOptions {
            platform: Platform::Browser,
            format: OutputFormat::Esm,
            kind: ImportKind::ImportStatement,
            user_conditions: None,
            runtime: RuntimeOverlay::lookup("workerd"),
        });
        assert_eq!(
            condition_names(&c),
            vec!["import", "browser", "module", "workerd", "worker", "default"]
        );
        // workerd disables the browser field even on the browser platform
        assert!(!c.browser_field);

        let c = ResolutionConditions::compute(&ConditionOptions {
            platform: Platform::Browser,
            format: OutputFormat::Esm,
            kind: ImportKind::ImportStatement,
            user_conditions: None,
            runtime: RuntimeOverlay::lookup("edge-light"),
        });
        assert!(c.browser_field);
        assert!(c.contains("edge-light"));
        assert_eq!(c.conditions.last().map(String::as_str), Some("default"));
    }

    #[test]
    fn test_electron_overlays() {
        let main = ResolutionConditions::compute(&ConditionOptions {
            platform: Platform::Browser,
            format: OutputFormat::Cjs,
            kind: ImportKind::RequireCall,
            user_conditions: None,
            runtime: RuntimeOverlay::lookup("electron-main"),
        });
        assert!(main.contains("electron"));
        assert!(main.contains("node"));
        assert!(!main.browser_field);
        assert!(main.require);

        let renderer = ResolutionConditions::compute(&ConditionOptions {
            platform: Platform::Browser,
            format: OutputFormat::Esm,
            kind: ImportKind::ImportStatement,
            user_conditions: None,
            runtime: RuntimeOverlay::lookup("electron-renderer"),
        });
        assert!(renderer.contains("electron"));
        assert!(renderer.browser_field);
        // "browser" appears once even though the overlay repeats it
        assert_eq!(
            renderer.conditions.iter().filter(|c| *c == "browser").count(),
            1
        );
    }

    #[test]
    fn test_unknown_runtime_is_ignored() {
        assert!(RuntimeOverlay::lookup("not-a-runtime").is_none());
    }

    #[test]
    fn test_with_require_keeps_default_last() {
        let c = ResolutionConditions::compute(&ConditionOptions {
            platform: Platform::Browser,
            format: OutputFormat::Esm,
            kind: ImportKind::ImportStatement,
            user_conditions: None,
            runtime: None,
        });
        let retried = c.with_require();
        assert_eq!(
            condition_names(&retried),
            vec!["import", "browser", "module", "require", "default"]
        );
        assert!(retried.require);
        // already-require sets are unchanged
        assert_eq!(retried.with_require().conditions, retried.conditions);
    }
}
