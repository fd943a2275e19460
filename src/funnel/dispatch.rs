use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::answers::{extract_contact, AnswerAggregator, AnswerMap, ContactDetails};
use super::broadcast::{MarketingBus, MarketingEvent};
use super::definition::{FunnelDefinition, StepKind};
use super::submission::{
    completion_percentage, first_missing_required, PageContext, SubmissionPayload, UtmParameters,
};

/// Lead row written to the primary store, one per submission attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadRecord {
    pub funnel_id: String,
    pub funnel_slug: String,
    pub funnel_name: String,
    pub lead_data: AnswerMap,
    pub step_data: AnswerMap,
    pub contact: ContactDetails,
    pub completion_percentage: f64,
    #[serde(flatten)]
    pub utm: UtmParameters,
    pub session_id: String,
    pub visitor_id: String,
    pub page_url: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Analytics row written to the secondary store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionEvent {
    pub session_id: String,
    pub visitor_id: String,
    pub event_type: String,
    pub event_category: String,
    pub event_action: String,
    pub event_label: String,
    pub funnel_id: String,
    pub funnel_name: String,
    pub lead_data: ConversionLeadData,
    pub conversion_value: Option<f64>,
    pub page_url: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionLeadData {
    #[serde(flatten)]
    pub contact: ContactDetails,
    pub responses: AnswerMap,
}

/// Transactional confirmation email request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub template: String,
    pub recipient: String,
    pub recipient_name: String,
    pub funnel_name: String,
}

/// JSON body POSTed to the configured webhook. Field names follow the wire
/// contract consumed by downstream automations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookBody {
    pub form_id: String,
    pub form_slug: String,
    pub form_name: String,
    pub responses: AnswerMap,
    pub extracted_data: ContactDetails,
    pub all_data: AnswerMap,
    pub submission_date: DateTime<Utc>,
    pub session_id: String,
    pub lead_id: Option<String>,
    pub completion_percentage: f64,
    #[serde(flatten)]
    pub utm: UtmParameters,
    pub metadata: WebhookMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookMetadata {
    pub page_url: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store rejected the write: {0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("webhook responded with status {0}")]
    Status(u16),
    #[error("webhook transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("mailer unavailable: {0}")]
    Unavailable(String),
}

/// Primary lead persistence. Returns the stored record's id so it can ride
/// along on the webhook payload.
#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn insert_lead(&self, lead: LeadRecord) -> Result<String, StoreError>;
}

/// Secondary conversion-event persistence for analytics consumption.
#[async_trait]
pub trait ConversionEventStore: Send + Sync {
    async fn insert_event(&self, event: ConversionEvent) -> Result<(), StoreError>;
}

/// Outbound webhook delivery. At-most-once, no retry.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn deliver(&self, url: &str, body: &WebhookBody) -> Result<(), WebhookError>;
}

#[async_trait]
pub trait ConfirmationMailer: Send + Sync {
    async fn send_confirmation(&self, request: ConfirmationRequest) -> Result<(), MailerError>;
}

/// Hard failures that abort a submission before any dispatch sub-step runs.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("step {0} does not exist in this funnel")]
    UnknownStep(String),
    #[error("step {0} is not a form step")]
    NotAFormStep(String),
    #[error("field {field} is required")]
    MissingField { field: String },
}

/// Outcome of one dispatch sub-step. Failures are recorded, never
/// propagated: secondary systems must not block the user's success path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Succeeded,
    Failed { reason: String },
    Skipped,
}

impl DispatchOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    fn from_result<T, E: std::fmt::Display>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => Self::Succeeded,
            Err(err) => Self::Failed {
                reason: err.to_string(),
            },
        }
    }
}

/// Per-sub-step outcomes of one submission attempt.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub lead: DispatchOutcome,
    pub conversion: DispatchOutcome,
    pub marketing: DispatchOutcome,
    pub webhook: DispatchOutcome,
    pub email: DispatchOutcome,
}

impl DispatchReport {
    /// True when nothing that was attempted failed. Skipped sub-steps do not
    /// count against success.
    pub fn fully_succeeded(&self) -> bool {
        ![
            &self.lead,
            &self.conversion,
            &self.marketing,
            &self.webhook,
            &self.email,
        ]
        .iter()
        .any(|outcome| outcome.is_failure())
    }
}

pub const DEFAULT_REDIRECT_PATH: &str = "/obrigado";

/// Post-submission destination, discriminated by URL scheme sniffing: values
/// starting with `http` get a full page navigation, anything else is an
/// in-app route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RedirectTarget {
    External { url: String },
    Internal { path: String },
}

impl RedirectTarget {
    pub fn resolve(configured: Option<&str>) -> Self {
        match configured.map(str::trim).filter(|value| !value.is_empty()) {
            Some(url) if url.starts_with("http") => Self::External {
                url: url.to_string(),
            },
            Some(path) => Self::Internal {
                path: path.to_string(),
            },
            None => Self::Internal {
                path: DEFAULT_REDIRECT_PATH.to_string(),
            },
        }
    }
}

/// What the caller gets back once the fan-out is over.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub session_id: String,
    pub lead_id: Option<String>,
    pub completion_percentage: f64,
    pub report: DispatchReport,
    pub redirect: RedirectTarget,
}

/// Runtime knobs for the dispatcher, usually sourced from `FunnelConfig`.
#[derive(Debug, Clone, Default)]
pub struct DispatchSettings {
    /// Fallback webhook when the funnel definition carries none.
    pub webhook_url: Option<String>,
    /// Fallback redirect when the funnel definition carries none.
    pub redirect_url: Option<String>,
    /// Cooperative wait before the redirect is resolved, giving marketing
    /// listeners time to consume the broadcast.
    pub settle: Duration,
}

/// Orchestrates the terminal actions of a funnel session.
///
/// The only hard gate is required-field validation; every dispatch sub-step
/// after it is best-effort and independent. There is no transaction, no
/// rollback, and no retry: a failed webhook delivery is logged, reported in
/// the `DispatchReport`, and otherwise invisible to the end user.
pub struct SubmissionDispatcher {
    leads: Arc<dyn LeadStore>,
    conversions: Arc<dyn ConversionEventStore>,
    webhook: Arc<dyn WebhookTransport>,
    mailer: Arc<dyn ConfirmationMailer>,
    marketing: Arc<dyn MarketingBus>,
    settings: DispatchSettings,
}

impl SubmissionDispatcher {
    pub fn new(
        leads: Arc<dyn LeadStore>,
        conversions: Arc<dyn ConversionEventStore>,
        webhook: Arc<dyn WebhookTransport>,
        mailer: Arc<dyn ConfirmationMailer>,
        marketing: Arc<dyn MarketingBus>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            leads,
            conversions,
            webhook,
            mailer,
            marketing,
            settings,
        }
    }

    /// Validate the terminal form step and fan the submission out.
    pub async fn dispatch(
        &self,
        definition: &FunnelDefinition,
        step_id: &str,
        answers: &AnswerAggregator,
        page: PageContext,
        visitor_id: Option<String>,
    ) -> Result<SubmissionReceipt, DispatchError> {
        let step = definition
            .step(step_id)
            .ok_or_else(|| DispatchError::UnknownStep(step_id.to_string()))?;
        let fields = match &step.kind {
            StepKind::Form { fields, .. } => fields,
            _ => return Err(DispatchError::NotAFormStep(step_id.to_string())),
        };

        if let Some(field) = first_missing_required(fields, answers.raw()) {
            return Err(DispatchError::MissingField {
                field: field.to_string(),
            });
        }

        let payload = self.snapshot(definition, step_id, answers, page, visitor_id);
        info!(
            slug = %definition.slug,
            session = %payload.session_id,
            "dispatching funnel submission"
        );

        let (lead_id, lead) = self.persist_lead(definition, &payload).await;
        let conversion = self.persist_conversion(definition, &payload).await;
        let marketing = self.broadcast(definition, &payload);
        let webhook = self.deliver_webhook(definition, &payload, lead_id.as_deref()).await;
        let email = self.request_confirmation(definition, &payload).await;

        let report = DispatchReport {
            lead,
            conversion,
            marketing,
            webhook,
            email,
        };

        if !self.settings.settle.is_zero() {
            tokio::time::sleep(self.settings.settle).await;
        }

        let redirect = RedirectTarget::resolve(
            definition
                .redirect_url
                .as_deref()
                .or(self.settings.redirect_url.as_deref()),
        );

        Ok(SubmissionReceipt {
            session_id: payload.session_id,
            lead_id,
            completion_percentage: payload.completion_percentage,
            report,
            redirect,
        })
    }

    fn snapshot(
        &self,
        definition: &FunnelDefinition,
        step_id: &str,
        answers: &AnswerAggregator,
        page: PageContext,
        visitor_id: Option<String>,
    ) -> SubmissionPayload {
        let raw_answers = answers.raw().clone();
        let mapped_answers = answers.mapped_view(definition);
        let contact = extract_contact(&raw_answers, &mapped_answers);
        SubmissionPayload {
            session_id: SubmissionPayload::generate_session_id(),
            visitor_id: visitor_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            submitted_at: Utc::now(),
            completion_percentage: completion_percentage(definition, step_id),
            utm: UtmParameters::from_page_context(&page),
            raw_answers,
            mapped_answers,
            contact,
            page,
        }
    }

    async fn persist_lead(
        &self,
        definition: &FunnelDefinition,
        payload: &SubmissionPayload,
    ) -> (Option<String>, DispatchOutcome) {
        let record = LeadRecord {
            funnel_id: definition.id.clone(),
            funnel_slug: definition.slug.clone(),
            funnel_name: definition.name.clone(),
            lead_data: payload.raw_answers.clone(),
            step_data: payload.mapped_answers.clone(),
            contact: payload.contact.clone(),
            completion_percentage: payload.completion_percentage,
            utm: payload.utm.clone(),
            session_id: payload.session_id.clone(),
            visitor_id: payload.visitor_id.clone(),
            page_url: payload.page.page_url.clone(),
            referrer: payload.page.referrer.clone(),
            user_agent: payload.page.user_agent.clone(),
            status: "new".to_string(),
            created_at: payload.submitted_at,
        };

        match self.leads.insert_lead(record).await {
            Ok(lead_id) => (Some(lead_id), DispatchOutcome::Succeeded),
            Err(err) => {
                warn!(slug = %definition.slug, error = %err, "lead write failed");
                (
                    None,
                    DispatchOutcome::Failed {
                        reason: err.to_string(),
                    },
                )
            }
        }
    }

    async fn persist_conversion(
        &self,
        definition: &FunnelDefinition,
        payload: &SubmissionPayload,
    ) -> DispatchOutcome {
        let event = ConversionEvent {
            session_id: payload.session_id.clone(),
            visitor_id: payload.visitor_id.clone(),
            event_type: "form_submission".to_string(),
            event_category: "step_form".to_string(),
            event_action: "submit".to_string(),
            event_label: definition.slug.clone(),
            funnel_id: definition.id.clone(),
            funnel_name: definition.name.clone(),
            lead_data: ConversionLeadData {
                contact: payload.contact.clone(),
                responses: payload.mapped_answers.clone(),
            },
            conversion_value: None,
            page_url: payload.page.page_url.clone(),
            referrer: payload.page.referrer.clone(),
            user_agent: payload.page.user_agent.clone(),
        };

        let result = self.conversions.insert_event(event).await;
        if let Err(err) = &result {
            warn!(slug = %definition.slug, error = %err, "conversion event write failed");
        }
        DispatchOutcome::from_result(&result)
    }

    fn broadcast(
        &self,
        definition: &FunnelDefinition,
        payload: &SubmissionPayload,
    ) -> DispatchOutcome {
        self.marketing.publish(MarketingEvent {
            form_slug: definition.slug.clone(),
            form_id: definition.id.clone(),
            form_name: definition.name.clone(),
            user_data: payload.mapped_answers.clone(),
        });
        DispatchOutcome::Succeeded
    }

    async fn deliver_webhook(
        &self,
        definition: &FunnelDefinition,
        payload: &SubmissionPayload,
        lead_id: Option<&str>,
    ) -> DispatchOutcome {
        let configured = definition
            .webhook_url
            .as_deref()
            .or(self.settings.webhook_url.as_deref())
            .map(str::trim)
            .filter(|url| !url.is_empty());
        let Some(url) = configured else {
            return DispatchOutcome::Skipped;
        };

        let body = WebhookBody {
            form_id: definition.id.clone(),
            form_slug: definition.slug.clone(),
            form_name: definition.name.clone(),
            responses: payload.mapped_answers.clone(),
            extracted_data: payload.contact.clone(),
            all_data: payload.raw_answers.clone(),
            submission_date: payload.submitted_at,
            session_id: payload.session_id.clone(),
            lead_id: lead_id.map(str::to_string),
            completion_percentage: payload.completion_percentage,
            utm: payload.utm.clone(),
            metadata: WebhookMetadata {
                page_url: payload.page.page_url.clone(),
                referrer: payload.page.referrer.clone(),
                user_agent: payload.page.user_agent.clone(),
            },
        };

        let result = self.webhook.deliver(url, &body).await;
        if let Err(err) = &result {
            warn!(slug = %definition.slug, error = %err, "webhook delivery failed");
        }
        DispatchOutcome::from_result(&result)
    }

    async fn request_confirmation(
        &self,
        definition: &FunnelDefinition,
        payload: &SubmissionPayload,
    ) -> DispatchOutcome {
        if payload.contact.email.trim().is_empty() {
            return DispatchOutcome::Skipped;
        }

        let request = ConfirmationRequest {
            template: "lead_confirmation".to_string(),
            recipient: payload.contact.email.clone(),
            recipient_name: payload.contact.name.clone(),
            funnel_name: definition.name.clone(),
        };

        let result = self.mailer.send_confirmation(request).await;
        if let Err(err) = &result {
            warn!(slug = %definition.slug, error = %err, "confirmation email failed");
        }
        DispatchOutcome::from_result(&result)
    }
}
