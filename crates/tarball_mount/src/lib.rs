pub mod engine;
pub mod extract;
pub mod mount;
pub mod url_parse;

pub use engine::TarballEngine;
pub use extract::{extract_tarball, TARBALL_ROOT};
pub use mount::{stable_key, MountRegistry, TarballError, TarballMount};
pub use url_parse::{parse_tarball_url, TarballUrlParts};
