pub mod manifest;

pub use manifest::{
    Browser, BrowserMap, DependencyMap, ExportTarget, PackageManifest, PackageType, SideEffects,
    StringOrBool,
};
