use std::sync::Arc;

use super::answers::{AnswerAggregator, AnswerValue};
use super::definition::{FunnelDefinition, StepDefinition};
use super::history::HistoryStack;
use super::navigator::{GraphNavigator, NextStep};

/// Result of a forward-navigation request inside a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Moved to the given step id.
    Moved(String),
    /// The matched edge points at a URL; the session stays put and the UI
    /// opens the link.
    External(String),
    /// No edge matched; the session stays on the current step and the UI
    /// shows an advisory notice.
    DeadEnd,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("funnel {0} has no steps")]
    EmptyFunnel(String),
}

/// Mutable per-visitor navigation state over an immutable funnel definition.
///
/// Created when the visitor lands on the funnel, destroyed when they leave
/// or complete it. All mutation happens through discrete, serialized user
/// events; nothing here is shared across sessions.
#[derive(Debug, Clone)]
pub struct FunnelSession {
    definition: Arc<FunnelDefinition>,
    current: String,
    history: HistoryStack,
    answers: AnswerAggregator,
}

impl FunnelSession {
    /// Start a session on the funnel's initial step.
    pub fn start(definition: Arc<FunnelDefinition>) -> Result<Self, SessionError> {
        let current = GraphNavigator::new(&definition)
            .initial_step()
            .ok_or_else(|| SessionError::EmptyFunnel(definition.slug.clone()))?
            .to_string();
        Ok(Self {
            definition,
            current,
            history: HistoryStack::new(),
            answers: AnswerAggregator::new(),
        })
    }

    pub fn definition(&self) -> &Arc<FunnelDefinition> {
        &self.definition
    }

    pub fn current_step_id(&self) -> &str {
        &self.current
    }

    pub fn current_step(&self) -> Option<&StepDefinition> {
        self.definition.step(&self.current)
    }

    pub fn answers(&self) -> &AnswerAggregator {
        &self.answers
    }

    pub fn record_answer(&mut self, key: impl Into<String>, value: AnswerValue) {
        self.answers.record(key, value);
    }

    /// Resolve and apply a forward transition. On success the step being
    /// left is pushed onto the history stack.
    pub fn advance(&mut self, selected_option: Option<&str>) -> Advance {
        let next = GraphNavigator::new(&self.definition).next_step(&self.current, selected_option);
        match next {
            NextStep::Step(step_id) => {
                self.history.push(self.current.clone());
                self.current = step_id.clone();
                Advance::Moved(step_id)
            }
            NextStep::External(url) => Advance::External(url),
            NextStep::DeadEnd => Advance::DeadEnd,
        }
    }

    pub fn can_go_back(&self) -> bool {
        !self.history.is_empty()
    }

    /// Replay the most recently left step. Visitation replay only: edges are
    /// not consulted and the previously selected option is not restored.
    pub fn back(&mut self) -> Option<&str> {
        let previous = self.history.pop()?;
        self.current = previous;
        Some(&self.current)
    }
}
