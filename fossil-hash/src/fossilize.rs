//! "Fossilize" escaping: embeds arbitrary bytes inside a single card line
//! by backslash-escaping the bytes that would otherwise break the
//! single-line, space-delimited card format (backslash itself, space, and
//! control bytes including NUL and newline).

/// Escape `raw` so it can be written as one card-value token.
pub fn fossilize(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    for &b in raw {
        match b {
            b'\\' => out.extend_from_slice(br"\\"),
            b' ' => out.extend_from_slice(br"\s"),
            b'\n' => out.extend_from_slice(br"\n"),
            b'\r' => out.extend_from_slice(br"\r"),
            b'\t' => out.extend_from_slice(br"\t"),
            0 => out.extend_from_slice(br"\0"),
            0x01..=0x1f | 0x7f => {
                out.push(b'\\');
                out.push(b'x');
                out.extend_from_slice(format!("{b:02x}").as_bytes());
            }
            _ => out.push(b),
        }
    }
    out
}

/// Inverse of [`fossilize`]. Safe to call on already-plain text: a lone
/// backslash that doesn't start a recognized escape is passed through
/// unchanged, so the transform is idempotent on non-escaped input.
pub fn defossilize(escaped: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(escaped.len());
    let mut i = 0;
    while i < escaped.len() {
        if escaped[i] == b'\\' && i + 1 < escaped.len() {
            match escaped[i + 1] {
                b'\\' => {
                    out.push(b'\\');
                    i += 2;
                }
                b's' => {
                    out.push(b' ');
                    i += 2;
                }
                b'n' => {
                    out.push(b'\n');
                    i += 2;
                }
                b'r' => {
                    out.push(b'\r');
                    i += 2;
                }
                b't' => {
                    out.push(b'\t');
                    i += 2;
                }
                b'0' => {
                    out.push(0);
                    i += 2;
                }
                b'x' if i + 3 < escaped.len() => {
                    let hex = &escaped[i + 2..i + 4];
                    if let Ok(s) = std::str::from_utf8(hex) {
                        if let Ok(byte) = u8::from_str_radix(s, 16) {
                            out.push(byte);
                            i += 4;
                            continue;
                        }
                    }
                    out.push(escaped[i]);
                    i += 1;
                }
                _ => {
                    out.push(escaped[i]);
                    i += 1;
                }
            }
        } else {
            out.push(escaped[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_space_and_backslash() {
        let raw = b"hello world\\backslash";
        let escaped = fossilize(raw);
        assert_eq!(defossilize(&escaped), raw);
        assert!(!escaped.contains(&b' '));
    }

    #[test]
    fn round_trips_nul_and_control_bytes() {
        let raw = b"a\0b\nc\td\re\x01f";
        let escaped = fossilize(raw);
        assert_eq!(defossilize(&escaped), raw);
    }

    #[test]
    fn defossilize_is_idempotent_on_plain_text() {
        let plain = b"already plain text with no escapes except trailing backslash\\";
        // first pass turns the lone trailing backslash into an escaped pair
        let once = defossilize(plain);
        let twice = defossilize(&once);
        assert_eq!(once, twice);
    }

    proptest::proptest! {
        #[test]
        fn round_trip_any_bytes(raw in proptest::collection::vec(proptest::num::u8::ANY, 0..256)) {
            let escaped = fossilize(&raw);
            proptest::prop_assert_eq!(defossilize(&escaped), raw);
        }
    }
}
