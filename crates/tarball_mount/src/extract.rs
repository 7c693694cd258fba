/// Extraction of a detected tarball into the VFS.
use std::io::Read;

use archive_detect::{ArchiveSummary, Compression, Container};
use flate2::read::GzDecoder;
use manifest::PackageManifest;
use vfs::Vfs;

use crate::mount::TarballError;

pub const TARBALL_ROOT: &str = "/__tarballs__";

/// Where a key's files land in the VFS.
pub fn package_root_for_key(key: &str) -> String {
    format!("{}/{}", TARBALL_ROOT, key)
}

fn entry_rel_path(raw: &str) -> Option<String> {
    // npm-style tarballs nest everything under "package/"
    let stripped = raw.strip_prefix("package/").unwrap_or(raw);
    if stripped.is_empty() {
        return None;
    }
    let normalized = vpath::normalize(stripped);
    // refuse names that escape the mount or collapse to nothing
    if normalized.is_empty()
        || normalized == "."
        || normalized.starts_with("..")
        || normalized.starts_with('/')
    {
        return None;
    }
    Some(normalized)
}

fn read_entries<R: Read>(
    reader: R,
    source_url: &str,
    key: &str,
    fs: &Vfs,
) -> Result<Option<PackageManifest>, TarballError> {
    let tar_err = |e: std::io::Error| TarballError::TarRead {
        url: source_url.to_string(),
        message: e.to_string(),
    };

    let package_root = package_root_for_key(key);
    let mut found_manifest: Option<PackageManifest> = None;

    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries().map_err(tar_err)? {
        let mut entry = entry.map_err(tar_err)?;

        if entry.header().entry_type().is_dir() {
            continue;
        }
        let raw_path = entry.path().map_err(tar_err)?;
        let Some(rel) = raw_path.to_str().and_then(entry_rel_path) else {
            continue;
        };

        let mut contents = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut contents).map_err(tar_err)?;

        if rel == "package.json" && found_manifest.is_none() {
            found_manifest = Some(PackageManifest::parse_lenient(&contents, source_url));
        }

        fs.set(&format!("{}/{}", package_root, rel), contents);
    }

    Ok(found_manifest)
}

/// Unwraps and untars `body` under `/__tarballs__/<key>/` in the VFS,
/// returning the package manifest.
///
/// Requires a tar container per the detector; gzip is the only supported
/// wrapper. The manifest falls back to `{unknown, 0.0.0}` when the
/// tarball ships none.
pub fn extract_tarball(
    body: &[u8],
    summary: &ArchiveSummary,
    source_url: &str,
    key: &str,
    fs: &Vfs,
) -> Result<PackageManifest, TarballError> {
    if !summary.is_tarball_like || summary.container != Container::Tar {
        return Err(TarballError::Archive(archive_detect::ArchiveError {
            summary: format!("response from {} is not tarball-like", source_url),
            details: format!(
                "container={:?} compression={} confidence={:?}, first bytes [{}]",
                summary.container,
                summary.compression.label(),
                summary.confidence,
                archive_detect::hex_preview(body, 16),
            ),
            reasons: summary.reasons.clone(),
        }));
    }

    let manifest = match summary.compression {
        Compression::Gzip => read_entries(GzDecoder::new(body), source_url, key, fs)?,
        Compression::None | Compression::Unknown => read_entries(body, source_url, key, fs)?,
        other => {
            return Err(TarballError::UnsupportedCompression {
                wrapper: other.label().to_string(),
                diagnostic: format!(
                    "{} advertises a {} wrapper; only gzip (or none) can be unwrapped here",
                    source_url,
                    other.label()
                ),
            })
        }
    };

    let manifest = match manifest {
        Some(found) => found,
        None => {
            // maybe a racing write landed it; otherwise fall back
            let candidate = format!("{}/package.json", package_root_for_key(key));
            match fs.get(&candidate) {
                Some(bytes) => PackageManifest::parse_lenient(&bytes, source_url),
                None => {
                    tracing::warn!("{} shipped no package.json; using fallback", source_url);
                    PackageManifest::fallback()
                }
            }
        }
    };

    tracing::debug!(
        "extracted {} as {} under {}",
        source_url,
        manifest.id(),
        package_root_for_key(key)
    );
    Ok(manifest)
}
