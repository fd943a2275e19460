use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::answers::{AnswerAggregator, AnswerMap};
use super::definition::FunnelDefinition;
use super::dispatch::{DispatchError, StoreError, SubmissionDispatcher, SubmissionReceipt};
use super::navigator::{GraphNavigator, NextStep};
use super::submission::PageContext;

/// Read side of the hosted funnel directory: slug-keyed lookup filtered to
/// active definitions.
#[async_trait]
pub trait FunnelDirectory: Send + Sync {
    async fn find_active(&self, slug: &str) -> Result<Option<Arc<FunnelDefinition>>, StoreError>;
}

/// One stateless submission request from the client, carrying the session's
/// accumulated answers.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionRequest {
    pub step_id: String,
    pub answers: AnswerMap,
    #[serde(default)]
    pub page: PageContext,
    #[serde(default)]
    pub visitor_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FunnelServiceError {
    #[error("funnel {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Directory(#[from] StoreError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Composes the funnel directory with the submission dispatcher for the
/// HTTP surface and the simulate command.
pub struct FunnelService {
    directory: Arc<dyn FunnelDirectory>,
    dispatcher: SubmissionDispatcher,
}

impl FunnelService {
    pub fn new(directory: Arc<dyn FunnelDirectory>, dispatcher: SubmissionDispatcher) -> Self {
        Self {
            directory,
            dispatcher,
        }
    }

    pub async fn definition(
        &self,
        slug: &str,
    ) -> Result<Arc<FunnelDefinition>, FunnelServiceError> {
        self.directory
            .find_active(slug)
            .await?
            .ok_or_else(|| FunnelServiceError::NotFound(slug.to_string()))
    }

    /// Resolve the forward transition for a stateless client.
    pub async fn next_step(
        &self,
        slug: &str,
        current: &str,
        selected_option: Option<&str>,
    ) -> Result<NextStep, FunnelServiceError> {
        let definition = self.definition(slug).await?;
        Ok(GraphNavigator::new(&definition).next_step(current, selected_option))
    }

    /// Resolve the funnel's initial step for a fresh session.
    pub async fn initial_step(&self, slug: &str) -> Result<Option<String>, FunnelServiceError> {
        let definition = self.definition(slug).await?;
        Ok(GraphNavigator::new(&definition)
            .initial_step()
            .map(str::to_string))
    }

    pub async fn submit(
        &self,
        slug: &str,
        request: SubmissionRequest,
    ) -> Result<SubmissionReceipt, FunnelServiceError> {
        let definition = self.definition(slug).await?;

        let mut answers = AnswerAggregator::new();
        for (key, value) in request.answers {
            answers.record(key, value);
        }

        let receipt = self
            .dispatcher
            .dispatch(
                &definition,
                &request.step_id,
                &answers,
                request.page,
                request.visitor_id,
            )
            .await?;
        Ok(receipt)
    }
}
