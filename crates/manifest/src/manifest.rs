use hashbrown::HashMap;
use indexmap::IndexMap;
use serde::Deserialize;

// Either a json string or a boolean
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum StringOrBool {
    Str(String),
    Bool(bool),
}

// package.json .browser field
//
// A string names the browser entry point; an array is treated as its first
// element; an object is a remapping table (not an entry point); `false`
// excludes the package entirely in browser builds.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Browser {
    Str(String),
    Arr(Vec<String>),
    Obj(BrowserMap),
    Flag(bool),
}

pub type BrowserMap = IndexMap<String, StringOrBool>;

// package.json .sideEffects field
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum SideEffects {
    Flag(bool),
    Globs(Vec<String>),
}

/// One node of the "exports"/"imports" target tree.
///
/// Condition maps and subpath maps share this shape; which one a map is
/// gets decided during evaluation by whether its keys start with '.'.
/// Key order is semantic, so maps preserve insertion order.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ExportTarget {
    Path(String),
    Map(IndexMap<String, ExportTarget>),
    Fallback(Vec<ExportTarget>),
    // JSON null: the subpath exists but is private
    Unset,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PackageType {
    #[serde(rename = "module")]
    Module,
    #[serde(rename = "commonjs")]
    CommonJs,
}

pub type DependencyMap = HashMap<String, String>;

// Subset of package.json used during module resolution
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct PackageManifest {
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub browser: Option<Browser>,
    #[serde(default)]
    pub exports: Option<ExportTarget>,
    #[serde(default)]
    pub imports: Option<IndexMap<String, ExportTarget>>,
    #[serde(default, rename = "sideEffects")]
    pub side_effects: Option<SideEffects>,
    #[serde(default, rename = "type")]
    pub package_type: Option<PackageType>,
    #[serde(default)]
    pub dependencies: Option<DependencyMap>,
    #[serde(default, rename = "devDependencies")]
    pub dev_dependencies: Option<DependencyMap>,
    #[serde(default, rename = "peerDependencies")]
    pub peer_dependencies: Option<DependencyMap>,
    // everything else, kept for runtime-distinguished entry fields
    // ("react-native", "electron", ...)
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl PackageManifest {
    /// The manifest used when a package ships no readable package.json.
    pub fn fallback() -> Self {
        PackageManifest {
            name: Some("unknown".to_string()),
            version: Some("0.0.0".to_string()),
            ..Default::default()
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Parses a manifest, downgrading malformed JSON to a warning and the
    /// fallback manifest.
    pub fn parse_lenient(bytes: &[u8], origin: &str) -> Self {
        match Self::parse(bytes) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("malformed package.json from {}: {}", origin, e);
                Self::fallback()
            }
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("unknown")
    }

    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or("0.0.0")
    }

    /// Package identity of the form `name@version`.
    pub fn id(&self) -> String {
        format!("{}@{}", self.name(), self.version())
    }

    /// A string-valued field by name, covering the runtime-distinguished
    /// entry fields that have no dedicated slot in this struct.
    pub fn string_field(&self, field: &str) -> Option<&str> {
        match field {
            "main" => self.main.as_deref(),
            "module" => self.module.as_deref(),
            _ => self.extra.get(field).and_then(|v| v.as_str()),
        }
    }

    /// The flattened dependency map used for bare-import version lookup.
    ///
    /// Regular dependencies shadow peers, peers shadow dev dependencies.
    pub fn flattened_dependencies(&self) -> DependencyMap {
        let mut flat = DependencyMap::new();
        if let Some(dev) = &self.dev_dependencies {
            flat.extend(dev.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        if let Some(peer) = &self.peer_dependencies {
            flat.extend(peer.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        if let Some(deps) = &self.dependencies {
            flat.extend(deps.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        flat
    }
}
