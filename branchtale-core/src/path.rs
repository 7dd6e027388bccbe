//! Path codec: a viewer's A/B choices as a compact, URL-safe string.
//!
//! `["A", "B", "A"]` <-> `"A,B,A"`. Decoding is tolerant: it trims tokens and
//! drops empty ones but does not check that symbols are `A`/`B`. Symbol validity
//! is decided when the path is resolved against a story tree.

const SEPARATOR: &str = ",";

/// Join the non-empty, trimmed symbols with commas. Empty input encodes to `""`.
pub fn encode<S: AsRef<str>>(path: &[S]) -> String {
    path.iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

/// `encode` for a path that may be absent.
pub fn encode_optional<S: AsRef<str>>(path: Option<&[S]>) -> String {
    path.map(|p| encode(p)).unwrap_or_default()
}

/// Split on commas, trim, drop empties. Absent or blank input decodes to `[]`.
pub fn decode(raw: Option<&str>) -> Vec<String> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => raw
            .split(SEPARATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Canonical form of a path: what `decode(encode(path))` yields.
pub fn normalize<S: AsRef<str>>(path: &[S]) -> Vec<String> {
    decode(Some(encode(path).as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_joins_with_commas() {
        assert_eq!(encode(&["A", "B", "A"]), "A,B,A");
    }

    #[test]
    fn test_empty_and_absent_inputs() {
        let empty: [&str; 0] = [];
        assert_eq!(encode(&empty), "");
        assert_eq!(encode_optional::<String>(None), "");
        assert!(decode(Some("")).is_empty());
        assert!(decode(None).is_empty());
        assert!(decode(Some("   ")).is_empty());
    }

    #[test]
    fn test_decode_trims_and_drops_empty_tokens() {
        assert_eq!(decode(Some(" A, ,B ,,A")), vec!["A", "B", "A"]);
    }

    #[test]
    fn test_decode_is_tolerant_of_unknown_symbols() {
        assert_eq!(decode(Some("A,X")), vec!["A", "X"]);
    }

    #[test]
    fn test_encode_drops_blank_symbols() {
        assert_eq!(encode(&[" A ", "", "B"]), "A,B");
        assert_eq!(normalize(&[" A ", "", "B"]), vec!["A", "B"]);
    }

    #[test]
    fn test_decode_inverts_encode_for_ab_paths() {
        // every A/B path up to depth 6
        for depth in 0..=6u32 {
            for bits in 0..(1u32 << depth) {
                let path: Vec<String> = (0..depth)
                    .map(|i| if bits & (1 << i) == 0 { "A" } else { "B" }.to_string())
                    .collect();
                assert_eq!(decode(Some(encode(&path).as_str())), path);
            }
        }
    }
}
