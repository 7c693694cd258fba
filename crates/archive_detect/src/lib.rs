/// Archive-format detection for possibly-mislabeled CDN responses.
///
/// Three layered stages: filename/URL hints, response-header hints, and a
/// magic-byte sniff of the body prefix. The sniff always wins where it
/// disagrees with a hint.
pub mod filename;
pub mod headers;
pub mod sniff;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Container {
    Tar,
    Zip,
    /// Definitely not a recognized container.
    None,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    Gzip,
    Bzip2,
    Xz,
    Zstd,
    Lz4,
    Lzip,
    Brotli,
    Compress,
    None,
    #[default]
    Unknown,
}

impl Compression {
    pub fn label(&self) -> &'static str {
        match self {
            Compression::Gzip => "gzip",
            Compression::Bzip2 => "bzip2",
            Compression::Xz => "xz",
            Compression::Zstd => "zstd",
            Compression::Lz4 => "lz4",
            Compression::Lzip => "lzip",
            Compression::Brotli => "brotli",
            Compression::Compress => "compress",
            Compression::None => "none",
            Compression::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// What the detector concluded, with the evidence trail.
#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    pub container: Container,
    pub compression: Compression,
    pub is_tarball_like: bool,
    pub confidence: Confidence,
    pub reasons: Vec<String>,
}

#[derive(Debug, Error)]
#[error("{summary}: {details}")]
pub struct ArchiveError {
    pub summary: String,
    pub details: String,
    pub reasons: Vec<String>,
}

/// Hex preview of sniffed bytes for diagnostics.
pub fn hex_preview(bytes: &[u8], limit: usize) -> String {
    let shown = &bytes[..bytes.len().min(limit)];
    let mut out = String::with_capacity(shown.len() * 3);
    for (i, b) in shown.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{:02x}", b));
    }
    if bytes.len() > limit {
        out.push_str(" ...");
    }
    out
}

/// Runs all three stages over a response.
///
/// `headers` are (lowercased-name, value) pairs; `body_prefix` is the
/// first kilobyte or so of the payload.
pub fn detect_archive(
    url: Option<&str>,
    headers: &[(String, String)],
    body_prefix: &[u8],
) -> ArchiveSummary {
    let mut reasons: Vec<String> = Vec::new();
    let mut container = Container::Unknown;
    let mut compression = Compression::Unknown;
    let mut confidence = Confidence::Low;

    // stage 1: filename hint from the URL path
    if let Some(url) = url {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if let Some(hint) = filename::classify_filename(path) {
            reasons.push(format!("url suggests {}", hint.describe()));
            container = hint.container;
            compression = hint.compression;
            if hint.container == Container::Tar {
                confidence = Confidence::Medium;
            }
        }
    }

    // stage 2: header hints
    let header_hint = headers::classify_headers(headers, &mut reasons);
    if container == Container::Unknown {
        container = header_hint.container;
    }
    if compression == Compression::Unknown {
        compression = header_hint.compression;
    }
    if header_hint.container == Container::Tar && confidence < Confidence::Medium {
        confidence = Confidence::Medium;
    }

    // stage 3: the bytes themselves outrank any label
    let sniffed = sniff::sniff_bytes(body_prefix, &mut reasons);
    if sniffed.compression != Compression::Unknown {
        compression = sniffed.compression;
        if confidence < Confidence::Medium {
            confidence = Confidence::Medium;
        }
    }
    match sniffed.container {
        Container::Tar => {
            // ustar confirmation is the only path to high confidence
            container = Container::Tar;
            confidence = Confidence::High;
        }
        Container::Zip => {
            container = Container::Zip;
            if confidence < Confidence::Medium {
                confidence = Confidence::Medium;
            }
        }
        _ => {}
    }

    if confidence == Confidence::High && container != Container::Tar {
        // invariant: high confidence implies a confirmed tar container
        confidence = Confidence::Medium;
    }

    let is_tarball_like = container == Container::Tar;

    ArchiveSummary {
        container,
        compression,
        is_tarball_like,
        confidence,
        reasons,
    }
}

/// Hint produced by the filename and header stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatHint {
    pub container: Container,
    pub compression: Compression,
}

impl FormatHint {
    pub fn describe(&self) -> String {
        format!(
            "container={:?} compression={}",
            self.container,
            self.compression.label()
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use flate2::write::GzEncoder;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    pub(crate) fn fake_tar_prefix() -> Vec<u8> {
        // one 512-byte POSIX header block with the ustar magic at 257
        let mut block = vec![0u8; 512];
        block[..7].copy_from_slice(b"package");
        block[257..262].copy_from_slice(b"ustar");
        block
    }

    pub(crate) fn gzipped(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_gzipped_tar_with_ustar_is_high_confidence() {
        let body = gzipped(&fake_tar_prefix());
        let summary = detect_archive(
            Some("https://registry.example/pkg/-/pkg-1.0.0.tgz"),
            &[],
            &body,
        );
        assert_eq!(summary.container, Container::Tar);
        assert_eq!(summary.compression, Compression::Gzip);
        assert_eq!(summary.confidence, Confidence::High);
        assert!(summary.is_tarball_like);
    }

    #[test]
    fn test_high_confidence_implies_tar() {
        // a zip payload can never report high confidence
        let summary = detect_archive(
            Some("https://host/file.tar.gz"),
            &[],
            b"PK\x03\x04rest-of-zip",
        );
        assert_eq!(summary.container, Container::Zip);
        assert!(summary.confidence < Confidence::High);
    }

    #[test]
    fn test_hints_alone_are_at_most_medium() {
        let summary = detect_archive(Some("https://host/pkg.tar.zst"), &[], b"");
        assert_eq!(summary.container, Container::Tar);
        assert_eq!(summary.compression, Compression::Zstd);
        assert_eq!(summary.confidence, Confidence::Medium);
    }

    #[test]
    fn test_mislabeled_response_trusts_bytes() {
        // served as JSON, is actually a gzipped tar
        let body = gzipped(&fake_tar_prefix());
        let summary = detect_archive(
            Some("https://host/download"),
            &[(
                "content-type".to_string(),
                "application/json; charset=utf-8".to_string(),
            )],
            &body,
        );
        assert_eq!(summary.container, Container::Tar);
        assert_eq!(summary.compression, Compression::Gzip);
        assert_eq!(summary.confidence, Confidence::High);
    }

    #[test]
    fn test_isolated_gz_is_compression_only() {
        let summary = detect_archive(Some("https://host/data.gz"), &[], b"");
        assert_eq!(summary.container, Container::Unknown);
        assert_eq!(summary.compression, Compression::Gzip);
        assert!(!summary.is_tarball_like);
        assert_eq!(summary.confidence, Confidence::Low);
    }

    #[test]
    fn test_hex_preview() {
        assert_eq!(hex_preview(&[0x1f, 0x8b, 0x08], 16), "1f 8b 08");
        assert_eq!(hex_preview(&[0xab; 4], 2), "ab ab ...");
    }
}
