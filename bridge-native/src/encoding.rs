//! Byte and text conversions the host applies.

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Normalizes a media type: lowercased, or empty if any character falls
/// outside U+0020..=U+007E.
pub fn normalize_type(media_type: &str) -> String {
    if media_type.chars().all(|c| ('\u{20}'..='\u{7e}').contains(&c)) {
        media_type.to_ascii_lowercase()
    } else {
        String::new()
    }
}

/// The line ending `endings: "native"` converts to.
pub fn native_line_ending() -> &'static str {
    if cfg!(windows) {
        "\r\n"
    } else {
        "\n"
    }
}

/// Replaces every CRLF, lone CR and lone LF with `ending`.
pub fn convert_line_endings(text: &str, ending: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str(ending);
            }
            '\n' => out.push_str(ending),
            other => out.push(other),
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
}

impl TextEncoding {
    /// Resolves an encoding label, falling back to UTF-8 for unknown labels.
    fn from_label(label: Option<&str>) -> Self {
        let Some(label) = label else {
            return TextEncoding::Utf8;
        };
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-16" | "utf-16le" | "unicode" | "ucs-2" => TextEncoding::Utf16Le,
            "utf-16be" | "unicodefffe" => TextEncoding::Utf16Be,
            "iso-8859-1" | "latin1" | "l1" | "ascii" | "us-ascii" | "windows-1252" => {
                TextEncoding::Latin1
            }
            _ => TextEncoding::Utf8,
        }
    }
}

/// Decodes `bytes` as `readAsText` does: a byte order mark wins over the
/// label, invalid sequences become U+FFFD.
pub fn decode_text(bytes: &[u8], label: Option<&str>) -> String {
    let (encoding, body) = match bytes {
        [0xEF, 0xBB, 0xBF, rest @ ..] => (TextEncoding::Utf8, rest),
        [0xFF, 0xFE, rest @ ..] => (TextEncoding::Utf16Le, rest),
        [0xFE, 0xFF, rest @ ..] => (TextEncoding::Utf16Be, rest),
        _ => (TextEncoding::from_label(label), bytes),
    };

    match encoding {
        TextEncoding::Utf8 => String::from_utf8_lossy(body).into_owned(),
        TextEncoding::Utf16Le => decode_utf16(body, u16::from_le_bytes),
        TextEncoding::Utf16Be => decode_utf16(body, u16::from_be_bytes),
        TextEncoding::Latin1 => binary_string(body),
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    let mut text = String::from_utf16_lossy(&units);
    if bytes.len() % 2 == 1 {
        text.push(char::REPLACEMENT_CHARACTER);
    }
    text
}

/// One character per byte, U+0000..=U+00FF.
pub fn binary_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// `data:<type>;base64,<payload>`.
pub fn data_url(media_type: &str, bytes: &[u8]) -> String {
    let media_type = if media_type.is_empty() {
        "application/octet-stream"
    } else {
        media_type
    };
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_type() {
        assert_eq!(normalize_type("Text/Plain"), "text/plain");
        assert_eq!(normalize_type("text/plain\u{7f}"), "");
        assert_eq!(normalize_type("caf\u{e9}/x"), "");
    }

    #[test]
    fn test_convert_line_endings() {
        assert_eq!(convert_line_endings("a\r\nb\rc\nd", "\n"), "a\nb\nc\nd");
        assert_eq!(convert_line_endings("a\nb", "\r\n"), "a\r\nb");
    }

    #[test]
    fn test_decode_text_labels_and_bom() {
        assert_eq!(decode_text(b"\xEF\xBB\xBFhi", None), "hi");
        assert_eq!(decode_text(&[0x68, 0x00, 0x69, 0x00], Some("UTF-16LE")), "hi");
        assert_eq!(decode_text(&[0xFE, 0xFF, 0x00, 0x68], Some("latin1")), "h");
        assert_eq!(decode_text(&[0xE9], Some("iso-8859-1")), "\u{e9}");
        assert_eq!(decode_text(b"ok", Some("no-such-encoding")), "ok");
        assert_eq!(decode_text(&[0xFF], None), "\u{fffd}");
    }

    #[test]
    fn test_binary_string_maps_bytes() {
        assert_eq!(binary_string(&[0x00, 0x41, 0xFF]), "\u{0}A\u{ff}");
    }

    #[test]
    fn test_data_url() {
        assert_eq!(data_url("text/plain", b"hello"), "data:text/plain;base64,aGVsbG8=");
        assert_eq!(data_url("", &[]), "data:application/octet-stream;base64,");
    }
}
