/// Stage 2: hints from Content-Type, Content-Encoding, and
/// Content-Disposition.
use crate::{filename, Compression, Container, FormatHint};

/// Normalizes a Content-Type value to lowercase `type/subtype`.
pub fn normalize_content_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn content_type_hint(media_type: &str) -> Option<FormatHint> {
    let (container, compression) = match media_type {
        "application/x-tar" | "application/tar" => (Container::Tar, Compression::None),
        "application/gzip" | "application/x-gzip" => (Container::Unknown, Compression::Gzip),
        "application/x-bzip2" => (Container::Unknown, Compression::Bzip2),
        "application/x-xz" => (Container::Unknown, Compression::Xz),
        "application/zstd" => (Container::Unknown, Compression::Zstd),
        "application/x-lz4" => (Container::Unknown, Compression::Lz4),
        "application/zip" | "application/x-zip-compressed" => {
            (Container::Zip, Compression::None)
        }
        _ => return None,
    };
    Some(FormatHint {
        container,
        compression,
    })
}

/// The outermost coding from a Content-Encoding value ("gzip, br" was
/// applied left-to-right, so the last token is what the bytes start as).
pub fn outermost_encoding(value: &str) -> Option<Compression> {
    let coding = value.split(',').next_back()?.trim().to_ascii_lowercase();
    match coding.as_str() {
        "gzip" | "x-gzip" => Some(Compression::Gzip),
        "br" => Some(Compression::Brotli),
        "zstd" => Some(Compression::Zstd),
        "compress" => Some(Compression::Compress),
        "identity" | "" => None,
        _ => None,
    }
}

// pct-decodes an RFC 8187 ext-value payload
fn pct_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16)),
                bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16)),
            ) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Extracts the attachment filename from a Content-Disposition value.
///
/// `filename*` (RFC 8187 ext-value: `charset'lang'pct-encoded`) wins over
/// a plain `filename`; a lenient scan covers servers that quote loosely.
pub fn content_disposition_filename(value: &str) -> Option<String> {
    let mut plain: Option<String> = None;

    for param in value.split(';').skip(1) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let raw = raw.trim();

        if key == "filename*" {
            // charset'language'value-chars
            let mut parts = raw.splitn(3, '\'');
            let charset = parts.next().unwrap_or("");
            let _language = parts.next();
            let encoded = parts.next();
            match encoded {
                Some(encoded)
                    if charset.eq_ignore_ascii_case("utf-8")
                        || charset.eq_ignore_ascii_case("iso-8859-1") =>
                {
                    return Some(pct_decode(encoded));
                }
                _ => {
                    // lenient: servers that skip the charset production
                    return Some(pct_decode(raw.trim_matches('"')));
                }
            }
        }

        if key == "filename" && plain.is_none() {
            plain = Some(raw.trim_matches('"').to_string());
        }
    }

    plain
}

/// Combines every header hint; appends human-readable evidence to
/// `reasons`.
pub fn classify_headers(headers: &[(String, String)], reasons: &mut Vec<String>) -> FormatHint {
    let mut hint = FormatHint::default();

    let get = |name: &str| {
        headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    };

    if let Some(ct) = get("content-type") {
        let media_type = normalize_content_type(ct);
        if let Some(ct_hint) = content_type_hint(&media_type) {
            reasons.push(format!("content-type {} suggests {}", media_type, ct_hint.describe()));
            hint = ct_hint;
        }
    }

    if let Some(cd) = get("content-disposition") {
        if let Some(name) = content_disposition_filename(cd) {
            if let Some(name_hint) = filename::classify_filename(&name) {
                reasons.push(format!(
                    "content-disposition filename '{}' suggests {}",
                    name,
                    name_hint.describe()
                ));
                if hint.container == Container::Unknown {
                    hint.container = name_hint.container;
                }
                if hint.compression == Compression::Unknown {
                    hint.compression = name_hint.compression;
                }
            }
        }
    }

    if hint.compression == Compression::Unknown {
        if let Some(encoding) = get("content-encoding").and_then(outermost_encoding) {
            reasons.push(format!(
                "content-encoding suggests wrapper {}",
                encoding.label()
            ));
            hint.compression = encoding;
        }
    }

    hint
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_content_type() {
        assert_eq!(
            normalize_content_type("Application/GZIP; charset=binary"),
            "application/gzip"
        );
        assert_eq!(normalize_content_type("  text/html "), "text/html");
    }

    #[test]
    fn test_outermost_encoding() {
        assert_eq!(outermost_encoding("gzip"), Some(Compression::Gzip));
        assert_eq!(outermost_encoding("identity, gzip"), Some(Compression::Gzip));
        assert_eq!(outermost_encoding("gzip, br"), Some(Compression::Brotli));
        assert_eq!(outermost_encoding("identity"), None);
    }

    #[test]
    fn test_disposition_plain_filename() {
        assert_eq!(
            content_disposition_filename(r#"attachment; filename="pkg-1.0.0.tgz""#),
            Some("pkg-1.0.0.tgz".to_string())
        );
        assert_eq!(
            content_disposition_filename("attachment; filename=loose.tar.gz"),
            Some("loose.tar.gz".to_string())
        );
    }

    #[test]
    fn test_disposition_ext_value_wins() {
        assert_eq!(
            content_disposition_filename(
                r#"attachment; filename="fallback.bin"; filename*=UTF-8''pkg%201.0.0.tgz"#
            ),
            Some("pkg 1.0.0.tgz".to_string())
        );
    }

    #[test]
    fn test_disposition_lenient_ext_value() {
        // no charset production at all
        assert_eq!(
            content_disposition_filename(r#"attachment; filename*="plain.tgz""#),
            Some("plain.tgz".to_string())
        );
    }

    #[test]
    fn test_disposition_without_filename() {
        assert_eq!(content_disposition_filename("inline"), None);
    }

    #[test]
    fn test_classify_headers_combines() {
        let mut reasons = vec![];
        let headers = vec![
            (
                "content-type".to_string(),
                "application/octet-stream".to_string(),
            ),
            (
                "content-disposition".to_string(),
                r#"attachment; filename="x.tar.zst""#.to_string(),
            ),
        ];
        let hint = classify_headers(&headers, &mut reasons);
        assert_eq!(hint.container, Container::Tar);
        assert_eq!(hint.compression, Compression::Zstd);
        assert_eq!(reasons.len(), 1);
    }
}
