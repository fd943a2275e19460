use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use super::answers::{AnswerMap, ContactDetails};
use super::definition::{FieldDefinition, FunnelDefinition};

/// Browser context captured alongside a submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageContext {
    #[serde(default)]
    pub page_url: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Campaign attribution parameters lifted from the landing page URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmParameters {
    #[serde(rename = "utm_source", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "utm_medium", skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(rename = "utm_campaign", skip_serializing_if = "Option::is_none")]
    pub campaign: Option<String>,
    #[serde(rename = "utm_term", skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(rename = "utm_content", skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl UtmParameters {
    /// Parse `utm_*` query parameters from the page URL. Unparseable URLs
    /// yield empty attribution, never an error.
    pub fn from_page_url(raw: &str) -> Self {
        let Ok(url) = Url::parse(raw) else {
            return Self::default();
        };

        let mut utm = Self::default();
        for (key, value) in url.query_pairs() {
            let slot = match key.as_ref() {
                "utm_source" => &mut utm.source,
                "utm_medium" => &mut utm.medium,
                "utm_campaign" => &mut utm.campaign,
                "utm_term" => &mut utm.term,
                "utm_content" => &mut utm.content,
                _ => continue,
            };
            *slot = Some(value.into_owned());
        }
        utm
    }

    pub fn from_page_context(page: &PageContext) -> Self {
        page.page_url
            .as_deref()
            .map(Self::from_page_url)
            .unwrap_or_default()
    }
}

/// Write-once snapshot assembled at submit time, after the validation gate
/// and before any dispatch sub-step runs. Never mutated after dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionPayload {
    pub session_id: String,
    pub visitor_id: String,
    pub submitted_at: DateTime<Utc>,
    pub raw_answers: AnswerMap,
    pub mapped_answers: AnswerMap,
    pub contact: ContactDetails,
    pub completion_percentage: f64,
    pub utm: UtmParameters,
    pub page: PageContext,
}

impl SubmissionPayload {
    pub fn generate_session_id() -> String {
        Uuid::new_v4().to_string()
    }
}

/// Share of the funnel completed when the submission fires, as a percentage.
pub fn completion_percentage(definition: &FunnelDefinition, current_step: &str) -> f64 {
    let total = definition.steps.len();
    if total == 0 {
        return 0.0;
    }
    let index = definition.step_index(current_step).unwrap_or(0);
    (index + 1) as f64 / total as f64 * 100.0
}

/// First required field with no usable answer, if any.
///
/// A field counts as answered when the raw map holds a non-blank value under
/// the field's name. The first miss (in field definition order) aborts the
/// whole submission; callers must not dispatch anything when this returns
/// `Some`.
pub fn first_missing_required<'a>(
    fields: &'a [FieldDefinition],
    answers: &AnswerMap,
) -> Option<&'a str> {
    fields
        .iter()
        .filter(|field| field.required)
        .find(|field| {
            answers
                .get(&field.name)
                .map(|value| value.is_blank())
                .unwrap_or(true)
        })
        .map(|field| field.name.as_str())
}
