/// Stage 1: extension-based hints from a URL path or attachment name.
use crate::{Compression, Container, FormatHint};

// multi-extension and short-form tarball spellings
static TAR_EXTENSIONS: &[(&str, Compression)] = &[
    (".tar.gz", Compression::Gzip),
    (".tar.bz2", Compression::Bzip2),
    (".tar.xz", Compression::Xz),
    (".tar.zst", Compression::Zstd),
    (".tar.lz4", Compression::Lz4),
    (".tar.br", Compression::Brotli),
    (".tar.z", Compression::Compress),
    // ".tar.lz" means different things across ecosystems; stay agnostic
    (".tar.lz", Compression::Unknown),
    (".tgz", Compression::Gzip),
    (".tbz2", Compression::Bzip2),
    (".txz", Compression::Xz),
    (".tzst", Compression::Zstd),
    (".tbr", Compression::Brotli),
    (".tlz4", Compression::Lz4),
    (".tar", Compression::None),
];

// bare compression wrappers with no container claim
static WRAPPER_EXTENSIONS: &[(&str, Compression)] = &[
    (".gz", Compression::Gzip),
    (".bz2", Compression::Bzip2),
    (".xz", Compression::Xz),
    (".zst", Compression::Zstd),
    (".lz4", Compression::Lz4),
    (".br", Compression::Brotli),
];

/// Classifies a filename (or URL path) by its extension.
pub fn classify_filename(name: &str) -> Option<FormatHint> {
    let lower = name.to_ascii_lowercase();

    for (ext, compression) in TAR_EXTENSIONS {
        if lower.ends_with(ext) {
            return Some(FormatHint {
                container: Container::Tar,
                compression: *compression,
            });
        }
    }

    if lower.ends_with(".zip") {
        return Some(FormatHint {
            container: Container::Zip,
            compression: Compression::None,
        });
    }

    for (ext, compression) in WRAPPER_EXTENSIONS {
        if lower.ends_with(ext) {
            return Some(FormatHint {
                container: Container::Unknown,
                compression: *compression,
            });
        }
    }

    None
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_multi_extensions() {
        assert_eq!(
            classify_filename("pkg-1.0.0.tar.gz"),
            Some(FormatHint {
                container: Container::Tar,
                compression: Compression::Gzip,
            })
        );
        assert_eq!(
            classify_filename("/downloads/archive.TAR.ZST"),
            Some(FormatHint {
                container: Container::Tar,
                compression: Compression::Zstd,
            })
        );
    }

    #[test]
    fn test_short_forms() {
        for (name, compression) in [
            ("a.tgz", Compression::Gzip),
            ("a.tbz2", Compression::Bzip2),
            ("a.txz", Compression::Xz),
            ("a.tzst", Compression::Zstd),
            ("a.tbr", Compression::Brotli),
            ("a.tlz4", Compression::Lz4),
        ] {
            assert_eq!(
                classify_filename(name),
                Some(FormatHint {
                    container: Container::Tar,
                    compression,
                }),
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_tar_lz_stays_unknown_wrapper() {
        assert_eq!(
            classify_filename("a.tar.lz"),
            Some(FormatHint {
                container: Container::Tar,
                compression: Compression::Unknown,
            })
        );
    }

    #[test]
    fn test_isolated_wrappers() {
        assert_eq!(
            classify_filename("data.gz"),
            Some(FormatHint {
                container: Container::Unknown,
                compression: Compression::Gzip,
            })
        );
        assert_eq!(
            classify_filename("data.zst"),
            Some(FormatHint {
                container: Container::Unknown,
                compression: Compression::Zstd,
            })
        );
    }

    #[test]
    fn test_unrelated_names() {
        assert_eq!(classify_filename("index.js"), None);
        assert_eq!(classify_filename("no-extension"), None);
    }
}
