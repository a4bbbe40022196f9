//! Closed facility-name vocabulary
//!
//! Signage recognition is restricted to a small set of known campus
//! buildings. The recognizer's character whitelist is derived from this set,
//! and recognized text is resolved back to a facility with a fuzzy match
//! tolerant of the character drops and substitutions OCR produces.

use strsim::normalized_levenshtein;

/// Facility names readable on campus signage.
pub const FACILITY_NAMES: [&str; 5] = ["天地館", "万有館", "本館", "雄飛館", "心理館"];

/// Alphanumeric disambiguators kept alongside the facility characters
/// (wing letters and floor numbers printed on the same signs).
const EXTRA_CHARS: &str = "sagtbSAGRTB1234567890";

/// Minimum similarity for a fuzzy facility match.
const MATCH_THRESHOLD: f32 = 0.6;

/// Build the recognizer character whitelist: every distinct character of the
/// facility names, in first-appearance order, plus the disambiguators.
pub fn char_whitelist() -> String {
    let mut chars: Vec<char> = Vec::new();
    for name in FACILITY_NAMES {
        for c in name.chars() {
            if !chars.contains(&c) {
                chars.push(c);
            }
        }
    }
    let mut whitelist: String = chars.into_iter().collect();
    whitelist.push_str(EXTRA_CHARS);
    whitelist
}

/// Resolve recognized text to a known facility name.
///
/// Exact containment wins; otherwise the best fuzzy match at or above the
/// threshold. Returns `None` when nothing on the sign resembles a known
/// facility.
pub fn resolve(text: &str) -> Option<&'static str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    for name in FACILITY_NAMES {
        if trimmed.contains(name) {
            return Some(name);
        }
    }

    let mut best: Option<(&'static str, f32)> = None;
    for name in FACILITY_NAMES {
        let score = similarity(trimmed, name);
        if score >= MATCH_THRESHOLD && best.map_or(true, |(_, s)| score > s) {
            best = Some((name, score));
        }
    }
    best.map(|(name, _)| name)
}

/// Similarity tolerant of punctuation and whitespace dropped or invented by
/// OCR: compares both the raw strings and their alphanumeric-only forms and
/// keeps the better score.
fn similarity(a: &str, b: &str) -> f32 {
    let a_normalized = a.to_lowercase();
    let b_normalized = b.to_lowercase();

    let base = normalized_levenshtein(&a_normalized, &b_normalized) as f32;

    let a_stripped: String = a_normalized.chars().filter(|c| c.is_alphanumeric()).collect();
    let b_stripped: String = b_normalized.chars().filter(|c| c.is_alphanumeric()).collect();

    let stripped = if !a_stripped.is_empty() && !b_stripped.is_empty() {
        normalized_levenshtein(&a_stripped, &b_stripped) as f32
    } else {
        0.0
    };

    base.max(stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitelist_contains_every_facility_char_once() {
        let whitelist = char_whitelist();
        for name in FACILITY_NAMES {
            for c in name.chars() {
                assert_eq!(
                    whitelist.chars().filter(|&w| w == c).count(),
                    1,
                    "expected exactly one '{c}'"
                );
            }
        }
    }

    #[test]
    fn test_whitelist_keeps_disambiguators() {
        let whitelist = char_whitelist();
        for c in "sagtbSAGRTB1234567890".chars() {
            assert!(whitelist.contains(c), "missing '{c}'");
        }
    }

    #[test]
    fn test_exact_name_resolves() {
        assert_eq!(resolve("本館"), Some("本館"));
        assert_eq!(resolve("雄飛館"), Some("雄飛館"));
    }

    #[test]
    fn test_name_embedded_in_noise_resolves() {
        assert_eq!(resolve("A1 天地館 3F"), Some("天地館"));
    }

    #[test]
    fn test_whitespace_split_name_resolves_fuzzily() {
        // OCR often inserts whitespace between glyphs.
        assert_eq!(resolve("心理 館"), Some("心理館"));
    }

    #[test]
    fn test_partial_read_resolves_to_closest_name() {
        // Two of three glyphs survive.
        assert_eq!(resolve("万有"), Some("万有館"));
    }

    #[test]
    fn test_unrelated_text_does_not_resolve() {
        assert_eq!(resolve("exit"), None);
        assert_eq!(resolve("1234"), None);
        assert_eq!(resolve(""), None);
        assert_eq!(resolve("   "), None);
    }
}
