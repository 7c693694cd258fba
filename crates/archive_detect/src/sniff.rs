/// Stage 3: magic-byte sniffing, with gzip unwrap + ustar confirmation.
use std::io::Read;

use flate2::read::GzDecoder;

use crate::{hex_preview, Compression, Container, FormatHint};

// how much decompressed gzip prefix to inspect for the tar header
const GZIP_PEEK_BYTES: usize = 512;
// POSIX ustar magic offset within the first header block
const USTAR_OFFSET: usize = 257;

fn has_ustar_magic(block: &[u8]) -> bool {
    block.len() >= USTAR_OFFSET + 5 && &block[USTAR_OFFSET..USTAR_OFFSET + 5] == b"ustar"
}

fn compression_magic(bytes: &[u8]) -> Option<Compression> {
    if bytes.starts_with(&[0x1f, 0x8b]) {
        return Some(Compression::Gzip);
    }
    if bytes.starts_with(b"BZh") {
        return Some(Compression::Bzip2);
    }
    if bytes.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
        return Some(Compression::Xz);
    }
    if bytes.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
        return Some(Compression::Zstd);
    }
    if bytes.starts_with(&[0x04, 0x22, 0x4d, 0x18]) {
        return Some(Compression::Lz4);
    }
    if bytes.starts_with(b"LZIP") {
        return Some(Compression::Lzip);
    }
    if bytes.starts_with(&[0x1f, 0x9d]) || bytes.starts_with(&[0x1f, 0xa0]) {
        return Some(Compression::Compress);
    }
    None
}

/// Identifies the payload from its first bytes.
///
/// A gzip wrapper gets a second look: the prefix is decompressed and the
/// inner bytes checked for the ustar magic, which is the only way the
/// container is *confirmed* rather than guessed.
pub fn sniff_bytes(bytes: &[u8], reasons: &mut Vec<String>) -> FormatHint {
    if bytes.is_empty() {
        return FormatHint::default();
    }

    if let Some(compression) = compression_magic(bytes) {
        reasons.push(format!(
            "magic bytes [{}] are {}",
            hex_preview(bytes, 6),
            compression.label()
        ));

        let mut hint = FormatHint {
            container: Container::Unknown,
            compression,
        };

        if compression == Compression::Gzip {
            let mut inner = vec![0u8; GZIP_PEEK_BYTES];
            let mut decoder = GzDecoder::new(bytes);
            // a short or errored read is fine; we only need the prefix
            let read = read_up_to(&mut decoder, &mut inner);
            if has_ustar_magic(&inner[..read]) {
                reasons.push("gzip payload carries the ustar magic at offset 257".to_string());
                hint.container = Container::Tar;
            }
        }

        return hint;
    }

    if bytes.starts_with(b"PK") && bytes.len() >= 4 {
        reasons.push(format!("magic bytes [{}] are zip", hex_preview(bytes, 4)));
        return FormatHint {
            container: Container::Zip,
            compression: Compression::None,
        };
    }

    if has_ustar_magic(bytes) {
        reasons.push("uncompressed payload carries the ustar magic at offset 257".to_string());
        return FormatHint {
            container: Container::Tar,
            compression: Compression::None,
        };
    }

    FormatHint::default()
}

// reads until the buffer is full, EOF, or a decode error
fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(_) => break,
        }
    }
    filled
}
