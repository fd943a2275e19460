use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use crate::funnel::{
    ConfirmationMailer, ConfirmationRequest, ConversionEvent, ConversionEventStore,
    EdgeDefinition, FieldDefinition, FieldType, FunnelDefinition, FunnelDirectory, FunnelService,
    LeadRecord, LeadStore, MailerError, StepDefinition, StepKind, StepOption, StoreError,
};

/// Shared handles for route handlers.
#[derive(Clone)]
pub struct AppState {
    pub readiness: Arc<AtomicBool>,
    pub metrics: PrometheusHandle,
    pub service: Arc<FunnelService>,
}

/// Slug-keyed directory backed by process memory, used in demo/development
/// mode and in tests.
#[derive(Debug, Default)]
pub struct InMemoryFunnelDirectory {
    funnels: Mutex<BTreeMap<String, Arc<FunnelDefinition>>>,
}

impl InMemoryFunnelDirectory {
    pub fn with_funnels(funnels: impl IntoIterator<Item = FunnelDefinition>) -> Self {
        let directory = Self::default();
        for funnel in funnels {
            directory.insert(funnel);
        }
        directory
    }

    pub fn insert(&self, funnel: FunnelDefinition) {
        self.funnels
            .lock()
            .expect("funnel directory poisoned")
            .insert(funnel.slug.clone(), Arc::new(funnel));
    }
}

#[async_trait]
impl FunnelDirectory for InMemoryFunnelDirectory {
    async fn find_active(&self, slug: &str) -> Result<Option<Arc<FunnelDefinition>>, StoreError> {
        let funnels = self.funnels.lock().expect("funnel directory poisoned");
        Ok(funnels
            .get(slug)
            .filter(|definition| definition.active)
            .cloned())
    }
}

static LEAD_SEQUENCE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
pub struct InMemoryLeadStore {
    leads: Mutex<Vec<LeadRecord>>,
}

impl InMemoryLeadStore {
    pub fn leads(&self) -> Vec<LeadRecord> {
        self.leads.lock().expect("lead store poisoned").clone()
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn insert_lead(&self, lead: LeadRecord) -> Result<String, StoreError> {
        let id = LEAD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        self.leads.lock().expect("lead store poisoned").push(lead);
        Ok(format!("lead-{id:06}"))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryConversionStore {
    events: Mutex<Vec<ConversionEvent>>,
}

impl InMemoryConversionStore {
    pub fn events(&self) -> Vec<ConversionEvent> {
        self.events.lock().expect("conversion store poisoned").clone()
    }
}

#[async_trait]
impl ConversionEventStore for InMemoryConversionStore {
    async fn insert_event(&self, event: ConversionEvent) -> Result<(), StoreError> {
        self.events
            .lock()
            .expect("conversion store poisoned")
            .push(event);
        Ok(())
    }
}

/// Mailer stand-in that only logs the request. Real delivery belongs to the
/// hosted backend's template pipeline.
#[derive(Debug, Default)]
pub struct LoggingMailer;

#[async_trait]
impl ConfirmationMailer for LoggingMailer {
    async fn send_confirmation(&self, request: ConfirmationRequest) -> Result<(), MailerError> {
        info!(
            recipient = %request.recipient,
            template = %request.template,
            "confirmation email requested"
        );
        Ok(())
    }
}

/// Sample funnel seeded in demo mode so the API is explorable without a
/// hosted backend.
pub fn demo_funnel() -> FunnelDefinition {
    FunnelDefinition {
        id: "demo-consulta".to_string(),
        slug: "consulta-gratuita".to_string(),
        name: "Consulta Gratuita".to_string(),
        active: true,
        steps: vec![
            StepDefinition {
                id: "area".to_string(),
                kind: StepKind::Question {
                    title: "Qual área você precisa de ajuda?".to_string(),
                    options: vec![
                        StepOption {
                            text: "Direito Trabalhista".to_string(),
                            icon: None,
                        },
                        StepOption {
                            text: "Direito Previdenciário".to_string(),
                            icon: None,
                        },
                    ],
                },
            },
            StepDefinition {
                id: "contato".to_string(),
                kind: StepKind::Form {
                    title: "Fale com um especialista".to_string(),
                    fields: vec![
                        FieldDefinition {
                            name: "nome".to_string(),
                            label: Some("Nome".to_string()),
                            field_type: FieldType::Text,
                            required: true,
                            placeholder: None,
                        },
                        FieldDefinition {
                            name: "email".to_string(),
                            label: Some("E-mail".to_string()),
                            field_type: FieldType::Email,
                            required: true,
                            placeholder: None,
                        },
                        FieldDefinition {
                            name: "telefone".to_string(),
                            label: Some("Telefone/WhatsApp".to_string()),
                            field_type: FieldType::Phone,
                            required: false,
                            placeholder: None,
                        },
                    ],
                },
            },
        ],
        edges: vec![
            EdgeDefinition {
                source: "area".to_string(),
                target: "contato".to_string(),
                source_handle: Some("option-0".to_string()),
            },
            EdgeDefinition {
                source: "area".to_string(),
                target: "contato".to_string(),
                source_handle: Some("option-1".to_string()),
            },
        ],
        webhook_url: None,
        redirect_url: None,
        styling: None,
        seo: None,
        footer: None,
    }
}
