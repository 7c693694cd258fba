pub mod conditions;
pub mod entry;
pub mod exports;
pub mod side_effects;

pub use conditions::{
    ConditionOptions, ImportKind, OutputFormat, Platform, ResolutionConditions, RuntimeOverlay,
};
pub use entry::{resolve_package_entry, BrowserRemappings, EntryOptions, LegacyField, ResolvedEntry};
pub use exports::{resolve_exports, resolve_imports, ExportsError, Matched};
pub use side_effects::SideEffectsMatcher;
