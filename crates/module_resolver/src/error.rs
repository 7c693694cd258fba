use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("could not resolve '{spec}'{}", importer_note(.importer))]
    Unresolved {
        spec: String,
        importer: Option<String>,
    },
    #[error("unsupported dependency spec ({kind}) '{raw}' for package '{package}'")]
    UnsupportedSpec {
        kind: &'static str,
        package: String,
        raw: String,
    },
    #[error("failed loading '{path}': {reason}")]
    LoadFailed { path: String, reason: String },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Spec(#[from] specifier::SpecError),
    #[error(transparent)]
    Exports(#[from] manifest_exports::ExportsError),
    #[error(transparent)]
    Fetch(#[from] fetch_cache::FetchError),
    #[error(transparent)]
    Tarball(#[from] Arc<tarball_mount::TarballError>),
}

fn importer_note(importer: &Option<String>) -> String {
    match importer {
        Some(importer) => format!(" (imported by '{}')", importer),
        None => String::new(),
    }
}
