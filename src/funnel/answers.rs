use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::definition::FunnelDefinition;

/// Scalar answer captured from a step: free text, a selected option's text,
/// or a checkbox flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(String),
    Flag(bool),
}

impl AnswerValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_text(&self) -> String {
        match self {
            Self::Text(value) => value.clone(),
            Self::Flag(value) => value.to_string(),
        }
    }

    /// Non-empty after trimming. Flags always render as `"true"`/`"false"`
    /// and therefore count as present.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(value) => value.trim().is_empty(),
            Self::Flag(_) => false,
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

pub type AnswerMap = BTreeMap<String, AnswerValue>;

/// Single source of truth for user-provided data across all step types.
///
/// Keys are question step ids or form field names. Entries are upserted and
/// never removed during a session; revisiting a step via "back" overwrites
/// the previous value.
#[derive(Debug, Clone, Default)]
pub struct AnswerAggregator {
    raw: AnswerMap,
}

impl AnswerAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: impl Into<String>, value: AnswerValue) {
        self.raw.insert(key.into(), value);
    }

    pub fn raw(&self) -> &AnswerMap {
        &self.raw
    }

    pub fn get(&self, key: &str) -> Option<&AnswerValue> {
        self.raw.get(key)
    }

    /// Human-readable remapping for outbound payloads: question step ids are
    /// replaced by the step's title, form field names pass through as-is.
    /// Two steps sharing a title collide in the output; the later entry in
    /// iteration order wins, which is accepted rather than defended against.
    pub fn mapped_view(&self, definition: &FunnelDefinition) -> AnswerMap {
        self.raw
            .iter()
            .map(|(key, value)| {
                let label = definition
                    .step_title(key)
                    .map(str::to_string)
                    .unwrap_or_else(|| key.clone());
                (label, value.clone())
            })
            .collect()
    }
}

/// Normalized contact fields pulled out of arbitrarily labeled answers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
}

const NAME_KEYS: &[&str] = &["name", "nome", "full_name", "nome_completo", "seu nome"];
const EMAIL_KEYS: &[&str] = &["email", "e-mail", "e_mail", "correio", "mail"];
const PHONE_KEYS: &[&str] = &[
    "phone",
    "telefone",
    "whatsapp",
    "celular",
    "tel",
    "mobile",
];

/// Best-effort extraction of name/email/phone from the raw and mapped answer
/// maps.
///
/// For each contact field an ordered list of key variants (English and
/// Portuguese synonyms) is tried; the first variant contained in a
/// normalized answer key wins, raw map first. Keys are lowercased and
/// accent-folded before matching, so `Telefone/WhatsApp` or `E-mail` are
/// picked up. Fields with no match come back as empty strings.
pub fn extract_contact(raw: &AnswerMap, mapped: &AnswerMap) -> ContactDetails {
    ContactDetails {
        name: find_variant(NAME_KEYS, raw, mapped),
        email: find_variant(EMAIL_KEYS, raw, mapped),
        phone: find_variant(PHONE_KEYS, raw, mapped),
    }
}

fn find_variant(variants: &[&str], raw: &AnswerMap, mapped: &AnswerMap) -> String {
    for variant in variants {
        for map in [raw, mapped] {
            let hit = map
                .iter()
                .find(|(key, value)| normalize_key(key).contains(variant) && !value.is_blank());
            if let Some((_, value)) = hit {
                return value.as_text();
            }
        }
    }
    String::new()
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().chars().map(fold_accent).collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' => 'a',
        'é' | 'ê' => 'e',
        'í' => 'i',
        'ó' | 'ô' | 'õ' => 'o',
        'ú' | 'ü' => 'u',
        'ç' => 'c',
        other => other,
    }
}
