//! Media types and `Accept` header precedence.
//!
//! Matching follows RFC 7231 with the same rules for parameters and
//! wildcards on both sides that are used for renderer negotiation:
//!
//! - `*/*` has specificity 0, `type/*` has 1, `type/sub` has 2, and
//!   `type/sub; param=value` has 3;
//! - `q` is not a range parameter, invalid or out-of-range values count as 1;
//! - accepted types with `q=0` are never acceptable.

use indexmap::IndexMap;
use std::cmp::Ordering;
use std::fmt;

/// A parsed media type such as `application/json; charset=utf-8`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    main_type: String,
    sub_type: String,
    params: IndexMap<String, String>,
}

impl MediaType {
    /// Parses a media type. Parsing never fails; malformed input yields
    /// empty parts that never match anything.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.split(';');
        let full_type = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        let (main_type, sub_type) = match full_type.split_once('/') {
            Some((main, sub)) => (main.trim().to_string(), sub.trim().to_string()),
            None => (full_type.clone(), String::new()),
        };

        let mut params = IndexMap::new();
        for part in parts {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            if key.is_empty() {
                continue;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            params.insert(key, value.to_string());
        }

        Self {
            main_type,
            sub_type,
            params,
        }
    }

    /// Main type, like `application`.
    pub fn main_type(&self) -> &str {
        &self.main_type
    }

    /// Sub type, like `json`.
    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    /// All parameters, including `q`.
    pub fn params(&self) -> &IndexMap<String, String> {
        &self.params
    }

    /// `main/sub` without parameters.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Returns `true` for `*/*`.
    pub fn is_all_types(&self) -> bool {
        self.main_type == "*" && self.sub_type == "*"
    }

    /// The `q` parameter, defaulting to 1.
    pub fn quality(&self) -> f64 {
        self.params
            .get("q")
            .and_then(|q| q.parse::<f64>().ok())
            .filter(|q| (0.0..=1.0).contains(q))
            .unwrap_or(1.0)
    }

    /// Parameters other than `q`.
    pub fn range_params(&self) -> IndexMap<&str, &str> {
        self.params
            .iter()
            .filter(|(key, _)| key.as_str() != "q")
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect()
    }

    /// How specific this type is, from 0 (`*/*`) to 3 (with parameters).
    pub fn specificity(&self) -> u8 {
        if self.main_type == "*" {
            0
        } else if self.sub_type == "*" {
            1
        } else if self.range_params().is_empty() {
            2
        } else {
            3
        }
    }

    /// Returns `true` if `self` and `other` describe compatible types.
    ///
    /// A pattern with parameters matches a value without them, but not the
    /// other way around.
    pub fn matches(&self, other: &MediaType) -> bool {
        if [
            &self.main_type,
            &other.main_type,
            &self.sub_type,
            &other.sub_type,
        ]
        .iter()
        .any(|part| part.is_empty())
        {
            return false;
        }
        let compatible = |this: &str, that: &str| this == that || this == "*" || that == "*";
        if !compatible(&self.main_type, &other.main_type)
            || !compatible(&self.sub_type, &other.sub_type)
        {
            return false;
        }

        let mine = self.range_params();
        let theirs = other.range_params();
        if mine.is_empty() == theirs.is_empty() {
            mine == theirs
        } else {
            !mine.is_empty()
        }
    }

    /// Parses `other` and checks [`MediaType::matches`].
    pub fn matches_str(&self, other: &str) -> bool {
        !other.is_empty() && self.matches(&MediaType::parse(other))
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)?;
        for (key, value) in &self.params {
            write!(f, "; {key}={value}")?;
        }
        Ok(())
    }
}

/// Sorts media types by precedence: specificity, then quality, both
/// descending. Equal entries keep their original order; `q=0` is dropped.
pub fn media_by_precedence<I, S>(types: I) -> Vec<MediaType>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parsed: Vec<MediaType> = types
        .into_iter()
        .map(|raw| MediaType::parse(raw.as_ref()))
        .filter(|media| media.quality() > 0.0)
        .collect();
    parsed.sort_by(|a, b| {
        b.specificity()
            .cmp(&a.specificity())
            .then_with(|| b.quality().partial_cmp(&a.quality()).unwrap_or(Ordering::Equal))
    });
    parsed
}

/// Parses an `Accept` header into types ordered by precedence.
pub fn parse_accept(header: &str) -> Vec<MediaType> {
    media_by_precedence(header.split(',').filter(|token| !token.trim().is_empty()))
}

/// Picks the candidate preferred by `accepted`.
///
/// Every candidate is mapped to the first accepted type it matches. The
/// candidate whose accepted type comes earliest wins; ties go to the
/// earlier candidate.
pub fn preferred_type<'a, S: AsRef<str>>(
    accepted: &[MediaType],
    candidates: &'a [S],
) -> Option<&'a S> {
    candidates
        .iter()
        .filter_map(|candidate| {
            let media = MediaType::parse(candidate.as_ref());
            accepted
                .iter()
                .position(|accepted_type| media.matches(accepted_type))
                .map(|index| (index, candidate))
        })
        .min_by_key(|(index, _)| *index)
        .map(|(_, candidate)| candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_media_type() {
        let media = MediaType::parse("Application/JSON; charset=\"utf-8\"; q=0.5");
        assert_eq!(media.main_type(), "application");
        assert_eq!(media.sub_type(), "json");
        assert_eq!(media.essence(), "application/json");
        assert_eq!(media.params()["charset"], "utf-8");
        assert!((media.quality() - 0.5).abs() < f64::EPSILON);
        assert_eq!(media.range_params().len(), 1);
    }

    #[test]
    fn test_invalid_quality_counts_as_one() {
        for raw in ["text/html;q=abc", "text/html;q=2", "text/html;q=-1", "text/html"] {
            assert!((MediaType::parse(raw).quality() - 1.0).abs() < f64::EPSILON, "{raw}");
        }
    }

    #[test]
    fn test_specificity() {
        assert_eq!(MediaType::parse("*/*").specificity(), 0);
        assert_eq!(MediaType::parse("text/*").specificity(), 1);
        assert_eq!(MediaType::parse("text/plain;q=0.3").specificity(), 2);
        assert_eq!(MediaType::parse("text/plain;format=flowed").specificity(), 3);
    }

    #[test]
    fn test_matches_wildcards() {
        let json = MediaType::parse("application/json");
        assert!(MediaType::parse("*/*").matches(&json));
        assert!(MediaType::parse("application/*").matches(&json));
        assert!(json.matches(&MediaType::parse("application/*")));
        assert!(!MediaType::parse("text/*").matches(&json));
        assert!(!MediaType::parse("").matches(&json));
        assert!(!MediaType::parse("application").matches(&json));
    }

    #[test]
    fn test_matches_params() {
        let plain = MediaType::parse("text/plain");
        let flowed = MediaType::parse("text/plain; format=flowed");
        assert!(flowed.matches(&plain));
        assert!(!plain.matches(&flowed));
        assert!(flowed.matches(&MediaType::parse("text/plain;format=flowed;q=0.1")));
        assert!(!flowed.matches(&MediaType::parse("text/plain;format=fixed")));
    }

    #[test]
    fn test_precedence_drops_zero_quality() {
        let sorted = media_by_precedence(["*/*", "text/*;q=0", "application/json;q=0.5", "text/html"]);
        let names: Vec<String> = sorted.iter().map(MediaType::essence).collect();
        assert_eq!(names, vec!["text/html", "application/json", "*/*"]);
    }

    #[test]
    fn test_preferred_type_uses_quality() {
        let accepted = parse_accept("application/json;q=0.9,application/xml;q=0.95");
        let candidates = ["application/xml", "application/json"];
        assert_eq!(preferred_type(&accepted, &candidates), Some(&"application/xml"));
        let candidates = ["application/json", "application/xml"];
        assert_eq!(preferred_type(&accepted, &candidates), Some(&"application/xml"));
    }

    #[test]
    fn test_preferred_type_wildcard_tie_goes_to_first_candidate() {
        let accepted = parse_accept("*/*");
        let candidates = ["application/json", "application/xml"];
        assert_eq!(preferred_type(&accepted, &candidates), Some(&"application/json"));
    }

    #[test]
    fn test_preferred_type_none() {
        let accepted = parse_accept("text/html");
        assert_eq!(preferred_type(&accepted, &["application/json"]), None);
        assert_eq!(preferred_type(&[], &["application/json"]), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            MediaType::parse("text/plain; q=0.5").to_string(),
            "text/plain; q=0.5"
        );
    }

    proptest! {
        #[test]
        fn test_precedence_is_ordered_for_any_input_order(
            types in Just(vec![
                "*/*",
                "text/*;q=0.8",
                "text/html",
                "text/plain;format=flowed",
                "application/json;q=0.5",
                "application/xml;q=0",
            ])
            .prop_shuffle()
        ) {
            let sorted = media_by_precedence(&types);
            prop_assert_eq!(sorted.len(), 5);
            for pair in sorted.windows(2) {
                prop_assert!(pair[0].specificity() >= pair[1].specificity());
                if pair[0].specificity() == pair[1].specificity() {
                    prop_assert!(pair[0].quality() >= pair[1].quality());
                }
            }
            prop_assert_eq!(sorted[0].essence(), "text/plain");
            prop_assert_eq!(sorted[4].essence(), "*/*");
        }

        #[test]
        fn test_preferred_type_ignores_accept_order(
            accept in Just(vec!["application/json;q=0.9", "application/xml;q=0.95", "*/*;q=0.1"])
                .prop_shuffle()
        ) {
            let accepted = parse_accept(&accept.join(","));
            let candidates = ["application/json", "application/xml", "text/csv"];
            prop_assert_eq!(preferred_type(&accepted, &candidates), Some(&"application/xml"));
        }
    }
}
