use serde::{Deserialize, Serialize};

/// Immutable description of a published step-form funnel.
///
/// Loaded once per session from the funnel directory and shared read-only by
/// the navigator, aggregator, and dispatcher. Steps and edges come straight
/// from the visual builder; referential integrity between them is *not*
/// enforced at load time — an edge pointing at a missing step surfaces as a
/// navigation dead-end, never as a load error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelDefinition {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    pub steps: Vec<StepDefinition>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub styling: Option<serde_json::Value>,
    #[serde(default)]
    pub seo: Option<serde_json::Value>,
    #[serde(default)]
    pub footer: Option<serde_json::Value>,
}

fn default_active() -> bool {
    true
}

impl FunnelDefinition {
    pub fn step(&self, id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|step| step.id == id)
    }

    pub fn step_index(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.id == id)
    }

    /// Title of a step by id, used when remapping answer keys for outbound
    /// payloads.
    pub fn step_title(&self, id: &str) -> Option<&str> {
        self.step(id).map(StepDefinition::title)
    }
}

/// One screen of the funnel wizard.
///
/// The step kind is a tagged union: each kind carries only the payload it
/// actually uses, and unknown kinds are rejected when the definition is
/// deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub id: String,
    #[serde(flatten)]
    pub kind: StepKind,
}

impl StepDefinition {
    pub fn title(&self) -> &str {
        match &self.kind {
            StepKind::Question { title, .. }
            | StepKind::Form { title, .. }
            | StepKind::Content { title, .. }
            | StepKind::Offer { title, .. }
            | StepKind::Timer { title, .. }
            | StepKind::SocialProof { title, .. } => title,
        }
    }

    pub fn is_question(&self) -> bool {
        matches!(self.kind, StepKind::Question { .. })
    }

    pub fn is_form(&self) -> bool {
        matches!(self.kind, StepKind::Form { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    Question {
        title: String,
        #[serde(default)]
        options: Vec<StepOption>,
    },
    Form {
        title: String,
        #[serde(default)]
        fields: Vec<FieldDefinition>,
    },
    Content {
        title: String,
        #[serde(default)]
        media: Option<MediaReference>,
    },
    Offer {
        title: String,
        #[serde(default)]
        headline: Option<String>,
        #[serde(default)]
        cta_label: Option<String>,
        #[serde(default)]
        cta_url: Option<String>,
    },
    Timer {
        title: String,
        #[serde(default = "default_timer_seconds")]
        duration_seconds: u64,
    },
    SocialProof {
        title: String,
        #[serde(default)]
        testimonials: Vec<Testimonial>,
    },
}

fn default_timer_seconds() -> u64 {
    60
}

/// Selectable answer of a `question` step. Option order matters: edges refer
/// to options positionally through the `option-<index>` handle convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOption {
    pub text: String,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Email,
    Phone,
    Checkbox,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MediaReference {
    pub url: String,
    #[serde(default)]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Testimonial {
    pub author: String,
    pub quote: String,
}

/// Directed connection between two steps.
///
/// `source_handle` optionally scopes the edge to one option of a question
/// step (`option-<index>`). Several edges may share a source; precedence is
/// resolved by the navigator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDefinition {
    pub source: String,
    pub target: String,
    #[serde(default, alias = "sourceHandle")]
    pub source_handle: Option<String>,
}
