//! Step-form funnel engine: graph navigation over builder-authored
//! step/edge definitions, answer aggregation, and best-effort submission
//! dispatch to the lead store, conversion analytics, marketing listeners,
//! and outbound webhooks.

pub mod answers;
pub mod broadcast;
pub mod definition;
pub mod dispatch;
pub mod history;
pub mod navigator;
pub mod outbound;
pub mod service;
pub mod session;
pub mod submission;

#[cfg(test)]
mod tests;

pub use answers::{extract_contact, AnswerAggregator, AnswerMap, AnswerValue, ContactDetails};
pub use broadcast::{ChannelMarketingBus, InMemoryMarketingBus, MarketingBus, MarketingEvent};
pub use definition::{
    EdgeDefinition, FieldDefinition, FieldType, FunnelDefinition, MediaReference, StepDefinition,
    StepKind, StepOption, Testimonial,
};
pub use dispatch::{
    ConfirmationMailer, ConfirmationRequest, ConversionEvent, ConversionEventStore,
    ConversionLeadData, DispatchError, DispatchOutcome, DispatchReport, DispatchSettings,
    LeadRecord, LeadStore, MailerError, RedirectTarget, StoreError, SubmissionDispatcher,
    SubmissionReceipt, WebhookBody, WebhookError, WebhookMetadata, WebhookTransport,
    DEFAULT_REDIRECT_PATH,
};
pub use history::HistoryStack;
pub use navigator::{GraphNavigator, NextStep};
pub use outbound::{HostedBackendClient, HostedBackendSettings, HttpWebhookTransport};
pub use service::{FunnelDirectory, FunnelService, FunnelServiceError, SubmissionRequest};
pub use session::{Advance, FunnelSession, SessionError};
pub use submission::{PageContext, SubmissionPayload, UtmParameters};
