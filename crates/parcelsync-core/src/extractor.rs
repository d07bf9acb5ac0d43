//! Best-effort extraction of a property identifier from uploaded content.
//!
//! Extraction never fails: content that is not UTF-8 or carries no marker
//! yields the `UNKNOWN` sentinel together with the reason, which the workflow
//! turns into a risk flag. Format-specific strategies implement
//! [`IdentifierExtractor`] and can be swapped without touching the workflow.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::RiskReason;

/// Sentinel stored when no identifier could be extracted.
pub const UNKNOWN_PROPERTY_ID: &str = "UNKNOWN";

/// Label tokens that mark a property identifier (matched case-insensitively).
const IDENTIFIER_LABELS: [&str; 4] = ["prop_id", "property_id", "propertyid", "propid"];

static LEAF_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"<(?P<open>[A-Za-z_][\w.:-]*)(?:\s[^<>]*)?>(?P<text>[^<]*)</(?P<close>[A-Za-z_][\w.:-]*)\s*>",
    )
    .expect("leaf tag pattern is valid")
});

static KEY_VALUE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<key>[A-Za-z_][A-Za-z0-9_ .-]*?)\s*[:=]\s*(?P<value>.*?)\s*$")
        .expect("key/value pattern is valid")
});

/// Outcome of an extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Found(String),
    /// Decoded fine, but no marker present
    Missing,
    /// Content is not valid UTF-8
    Undecodable,
}

impl Extraction {
    /// The identifier to record, `UNKNOWN` when nothing was found.
    pub fn property_id(&self) -> &str {
        match self {
            Extraction::Found(id) => id,
            Extraction::Missing | Extraction::Undecodable => UNKNOWN_PROPERTY_ID,
        }
    }

    pub fn risk_reason(&self) -> Option<RiskReason> {
        match self {
            Extraction::Found(_) => None,
            Extraction::Missing => Some(RiskReason::MissingIdentifier),
            Extraction::Undecodable => Some(RiskReason::UndecodableContent),
        }
    }
}

/// Pluggable identifier extraction strategy.
pub trait IdentifierExtractor: Send + Sync {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Find an identifier in decoded text.
    fn extract_text(&self, text: &str) -> Option<String>;

    /// Decode `content` as UTF-8 and look for an identifier.
    fn extract(&self, content: &[u8]) -> Extraction {
        let content = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content);
        match std::str::from_utf8(content) {
            Ok(text) => match self.extract_text(text) {
                Some(id) => Extraction::Found(id),
                None => Extraction::Missing,
            },
            Err(e) => {
                tracing::debug!(
                    extractor = self.name(),
                    error = %e,
                    "Content is not UTF-8, identifier extraction skipped"
                );
                Extraction::Undecodable
            }
        }
    }
}

/// Whether a field name is one of the identifier labels.
pub fn is_identifier_label(key: &str) -> bool {
    let key = normalize_key(key);
    IDENTIFIER_LABELS.iter().any(|label| key == *label)
}

fn find_label(haystack_lower: &str) -> Option<usize> {
    IDENTIFIER_LABELS
        .iter()
        .filter_map(|label| haystack_lower.find(label).map(|pos| pos + label.len()))
        .min()
}

/// Canonical form of a field name: namespace dropped, lowercased, separators as `_`.
pub fn normalize_key(key: &str) -> String {
    key.trim()
        .rsplit(':')
        .next()
        .unwrap_or_default()
        .to_lowercase()
        .replace([' ', '-', '.'], "_")
}

/// Line-oriented markers such as `prop_id: 4500` or `PropertyID = 4500`.
///
/// The value is whatever follows the first `:` or `=` after the label.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineMarkerExtractor;

impl IdentifierExtractor for LineMarkerExtractor {
    fn name(&self) -> &'static str {
        "line-marker"
    }

    fn extract_text(&self, text: &str) -> Option<String> {
        text.lines().find_map(|line| {
            // ASCII lowercasing keeps byte offsets aligned with `line`.
            let lower = line.to_ascii_lowercase();
            let after_label = find_label(&lower)?;
            let sep = line[after_label..].find([':', '='])?;
            let value = line[after_label + sep + 1..].trim();
            (!value.is_empty()).then(|| value.to_string())
        })
    }
}

/// Tag-oriented markers such as `<PropertyID>4500</PropertyID>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlTagExtractor;

impl IdentifierExtractor for XmlTagExtractor {
    fn name(&self) -> &'static str {
        "xml-tag"
    }

    fn extract_text(&self, text: &str) -> Option<String> {
        LEAF_TAG.captures_iter(text).find_map(|caps| {
            let open = caps.name("open")?.as_str();
            let close = caps.name("close")?.as_str();
            if open != close || find_label(&open.to_ascii_lowercase()).is_none() {
                return None;
            }
            let value = caps.name("text")?.as_str().trim();
            (!value.is_empty()).then(|| value.to_string())
        })
    }
}

/// Tries each extractor in order and keeps the first hit.
pub struct ChainExtractor {
    extractors: Vec<Box<dyn IdentifierExtractor>>,
}

impl ChainExtractor {
    pub fn new(extractors: Vec<Box<dyn IdentifierExtractor>>) -> Self {
        Self { extractors }
    }
}

impl Default for ChainExtractor {
    fn default() -> Self {
        Self::new(vec![Box::new(XmlTagExtractor), Box::new(LineMarkerExtractor)])
    }
}

impl IdentifierExtractor for ChainExtractor {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn extract_text(&self, text: &str) -> Option<String> {
        self.extractors.iter().find_map(|e| e.extract_text(text))
    }
}

/// Collect `field: value`, `field = value` and `<field>value</field>` pairs.
///
/// Keys are lowercased with namespace prefixes dropped and separators folded
/// to `_`. The first occurrence of a key wins. Used to read the values an
/// upload proposes.
pub fn parse_fields(text: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();

    for caps in LEAF_TAG.captures_iter(text) {
        let (Some(open), Some(close), Some(value)) =
            (caps.name("open"), caps.name("close"), caps.name("text"))
        else {
            continue;
        };
        let value = value.as_str().trim();
        if open.as_str() != close.as_str() || value.is_empty() {
            continue;
        }
        fields
            .entry(normalize_key(open.as_str()))
            .or_insert_with(|| value.to_string());
    }

    for line in text.lines() {
        if line.trim_start().starts_with('<') {
            continue;
        }
        let Some(caps) = KEY_VALUE_LINE.captures(line) else {
            continue;
        };
        let (Some(key), Some(value)) = (caps.name("key"), caps.name("value")) else {
            continue;
        };
        if value.as_str().is_empty() {
            continue;
        }
        fields
            .entry(normalize_key(key.as_str()))
            .or_insert_with(|| value.as_str().to_string());
    }

    fields
}
