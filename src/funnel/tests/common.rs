use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::funnel::broadcast::InMemoryMarketingBus;
use crate::funnel::definition::{
    EdgeDefinition, FieldDefinition, FieldType, FunnelDefinition, StepDefinition, StepKind,
    StepOption,
};
use crate::funnel::dispatch::{
    ConfirmationMailer, ConfirmationRequest, ConversionEvent, ConversionEventStore,
    DispatchSettings, LeadRecord, LeadStore, MailerError, StoreError, SubmissionDispatcher,
    WebhookBody, WebhookError, WebhookTransport,
};

pub(crate) fn question_step(id: &str, title: &str, options: &[&str]) -> StepDefinition {
    StepDefinition {
        id: id.to_string(),
        kind: StepKind::Question {
            title: title.to_string(),
            options: options
                .iter()
                .map(|text| StepOption {
                    text: text.to_string(),
                    icon: None,
                })
                .collect(),
        },
    }
}

pub(crate) fn form_step(id: &str, title: &str, fields: Vec<FieldDefinition>) -> StepDefinition {
    StepDefinition {
        id: id.to_string(),
        kind: StepKind::Form {
            title: title.to_string(),
            fields,
        },
    }
}

pub(crate) fn content_step(id: &str, title: &str) -> StepDefinition {
    StepDefinition {
        id: id.to_string(),
        kind: StepKind::Content {
            title: title.to_string(),
            media: None,
        },
    }
}

pub(crate) fn field(name: &str, required: bool) -> FieldDefinition {
    FieldDefinition {
        name: name.to_string(),
        label: None,
        field_type: FieldType::Text,
        required,
        placeholder: None,
    }
}

pub(crate) fn edge(source: &str, target: &str, handle: Option<&str>) -> EdgeDefinition {
    EdgeDefinition {
        source: source.to_string(),
        target: target.to_string(),
        source_handle: handle.map(str::to_string),
    }
}

pub(crate) fn funnel(steps: Vec<StepDefinition>, edges: Vec<EdgeDefinition>) -> FunnelDefinition {
    FunnelDefinition {
        id: "funnel-1".to_string(),
        slug: "trabalhista".to_string(),
        name: "Consulta Trabalhista".to_string(),
        active: true,
        steps,
        edges,
        webhook_url: None,
        redirect_url: None,
        styling: None,
        seo: None,
        footer: None,
    }
}

/// The spec-level two-step funnel: one routed question into a form with a
/// required email field.
pub(crate) fn two_step_funnel() -> FunnelDefinition {
    funnel(
        vec![
            question_step("q1", "Qual sua situação?", &["Fui demitido", "Pedi demissão"]),
            form_step(
                "f1",
                "Receba a análise",
                vec![field("email", true), field("phone", false)],
            ),
        ],
        vec![edge("q1", "f1", Some("option-0"))],
    )
}

#[derive(Debug, Default)]
pub(crate) struct MemoryLeads {
    pub(crate) fail: bool,
    records: Mutex<Vec<LeadRecord>>,
    sequence: AtomicU64,
}

impl MemoryLeads {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn records(&self) -> Vec<LeadRecord> {
        self.records.lock().expect("lead store poisoned").clone()
    }
}

#[async_trait]
impl LeadStore for MemoryLeads {
    async fn insert_lead(&self, lead: LeadRecord) -> Result<String, StoreError> {
        if self.fail {
            return Err(StoreError::Unavailable("lead store offline".to_string()));
        }
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        self.records.lock().expect("lead store poisoned").push(lead);
        Ok(format!("lead-{id}"))
    }
}

#[derive(Debug, Default)]
pub(crate) struct MemoryConversions {
    pub(crate) fail: bool,
    events: Mutex<Vec<ConversionEvent>>,
}

impl MemoryConversions {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn events(&self) -> Vec<ConversionEvent> {
        self.events.lock().expect("conversion store poisoned").clone()
    }
}

#[async_trait]
impl ConversionEventStore for MemoryConversions {
    async fn insert_event(&self, event: ConversionEvent) -> Result<(), StoreError> {
        if self.fail {
            return Err(StoreError::Unavailable(
                "conversion store offline".to_string(),
            ));
        }
        self.events
            .lock()
            .expect("conversion store poisoned")
            .push(event);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingWebhook {
    pub(crate) fail: bool,
    deliveries: Mutex<Vec<(String, WebhookBody)>>,
}

impl RecordingWebhook {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn deliveries(&self) -> Vec<(String, WebhookBody)> {
        self.deliveries.lock().expect("webhook poisoned").clone()
    }
}

#[async_trait]
impl WebhookTransport for RecordingWebhook {
    async fn deliver(&self, url: &str, body: &WebhookBody) -> Result<(), WebhookError> {
        if self.fail {
            return Err(WebhookError::Status(503));
        }
        self.deliveries
            .lock()
            .expect("webhook poisoned")
            .push((url.to_string(), body.clone()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingMailer {
    pub(crate) fail: bool,
    requests: Mutex<Vec<ConfirmationRequest>>,
}

impl RecordingMailer {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn requests(&self) -> Vec<ConfirmationRequest> {
        self.requests.lock().expect("mailer poisoned").clone()
    }
}

#[async_trait]
impl ConfirmationMailer for RecordingMailer {
    async fn send_confirmation(&self, request: ConfirmationRequest) -> Result<(), MailerError> {
        if self.fail {
            return Err(MailerError::Unavailable("smtp offline".to_string()));
        }
        self.requests.lock().expect("mailer poisoned").push(request);
        Ok(())
    }
}

pub(crate) struct DispatchHarness {
    pub(crate) leads: Arc<MemoryLeads>,
    pub(crate) conversions: Arc<MemoryConversions>,
    pub(crate) webhook: Arc<RecordingWebhook>,
    pub(crate) mailer: Arc<RecordingMailer>,
    pub(crate) marketing: Arc<InMemoryMarketingBus>,
    pub(crate) dispatcher: SubmissionDispatcher,
}

pub(crate) fn harness(settings: DispatchSettings) -> DispatchHarness {
    harness_with(
        Arc::new(MemoryLeads::default()),
        Arc::new(RecordingWebhook::default()),
        settings,
    )
}

pub(crate) fn harness_with(
    leads: Arc<MemoryLeads>,
    webhook: Arc<RecordingWebhook>,
    settings: DispatchSettings,
) -> DispatchHarness {
    let conversions = Arc::new(MemoryConversions::default());
    let mailer = Arc::new(RecordingMailer::default());
    let marketing = Arc::new(InMemoryMarketingBus::default());
    let dispatcher = SubmissionDispatcher::new(
        leads.clone(),
        conversions.clone(),
        webhook.clone(),
        mailer.clone(),
        marketing.clone(),
        settings,
    );
    DispatchHarness {
        leads,
        conversions,
        webhook,
        mailer,
        marketing,
        dispatcher,
    }
}

pub(crate) fn instant_settings() -> DispatchSettings {
    DispatchSettings {
        webhook_url: None,
        redirect_url: None,
        settle: Duration::ZERO,
    }
}
