pub mod dep_spec;
pub mod jsr;
pub mod package_name;

pub use dep_spec::{parse_dep_spec, AliasTarget, DepSpec, GitSpec};
pub use jsr::{parse_jsr_spec, JsrSpec};
pub use package_name::{build_package_spec, parse_package_name, PackageSpec, SpecError};
