/// The bundler-facing configuration surface.
use hashbrown::HashMap;
use manifest::PackageManifest;
use manifest_exports::{
    ConditionOptions, ImportKind, LegacyField, OutputFormat, Platform, ResolutionConditions,
    RuntimeOverlay,
};
use serde::Deserialize;

use crate::error::ResolveError;

fn default_cdn() -> String {
    "https://unpkg.com".to_string()
}

fn default_resolve_extensions() -> Vec<String> {
    [".tsx", ".ts", ".jsx", ".js", ".css", ".json"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_polyfill() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    pub platform: Platform,
    pub format: OutputFormat,
    /// User conditions; their presence suppresses the implied "module".
    pub conditions: Option<Vec<String>>,
    /// Overrides the platform-default legacy field order.
    #[serde(rename = "mainFields")]
    pub main_fields: Option<Vec<String>>,
    /// Runtime overlay name ("deno", "react-native", ...).
    pub runtime: Option<String>,
    pub cdn: String,
    pub alias: HashMap<String, String>,
    pub external: Vec<String>,
    pub polyfill: bool,
    /// Root manifest driving bare-import version lookup.
    #[serde(rename = "package.json")]
    pub package_json: Option<PackageManifest>,
    #[serde(rename = "entryPoints")]
    pub entry_points: Vec<String>,
    #[serde(rename = "resolveExtensions")]
    pub resolve_extensions: Vec<String>,
}

impl Default for BundleConfig {
    fn default() -> Self {
        BundleConfig {
            platform: Platform::Browser,
            format: OutputFormat::Esm,
            conditions: None,
            main_fields: None,
            runtime: None,
            cdn: default_cdn(),
            alias: HashMap::new(),
            external: Vec::new(),
            polyfill: default_polyfill(),
            package_json: None,
            entry_points: Vec::new(),
            resolve_extensions: default_resolve_extensions(),
        }
    }
}

impl BundleConfig {
    /// The configured runtime overlay, when recognized.
    pub fn runtime_overlay(&self) -> Option<&'static RuntimeOverlay> {
        self.runtime.as_deref().and_then(RuntimeOverlay::lookup)
    }

    /// The canonical CDN origin, validated against the known styles.
    pub fn cdn_origin(&self) -> Result<String, ResolveError> {
        let origin = cdn_urls::cdn_origin(&self.cdn);
        match cdn_urls::cdn_style(&origin) {
            cdn_urls::CdnStyle::Other => Err(ResolveError::Config(format!(
                "unrecognized cdn '{}'",
                self.cdn
            ))),
            _ => Ok(origin),
        }
    }

    /// Active conditions for one import site.
    pub fn conditions_for(&self, kind: ImportKind) -> ResolutionConditions {
        ResolutionConditions::compute(&ConditionOptions {
            platform: self.platform,
            format: self.format,
            kind,
            user_conditions: self.conditions.clone(),
            runtime: self.runtime_overlay(),
        })
    }

    /// Legacy entry-field order for one import site.
    pub fn legacy_fields(
        &self,
        conditions: &ResolutionConditions,
        browser_is_string_entry: bool,
    ) -> Vec<LegacyField> {
        match &self.main_fields {
            Some(fields) => fields
                .iter()
                .map(|name| LegacyField::from_name(name))
                .collect(),
            None => LegacyField::default_order(
                self.platform,
                conditions.require,
                browser_is_string_entry,
                self.runtime_overlay(),
            ),
        }
    }

    /// Extensions probed for extensionless VFS specifiers.
    pub fn probe_extensions(&self) -> impl Iterator<Item = &str> {
        self.resolve_extensions.iter().map(|e| e.as_str())
    }
}
