use serde::Serialize;

use super::definition::{FunnelDefinition, StepKind};

/// Result of resolving a forward transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum NextStep {
    /// Move to another step of the funnel.
    Step(String),
    /// The matched target is a URL, not a step id; open it externally.
    External(String),
    /// No edge matches the current step/option combination. The caller keeps
    /// the session on the current step and surfaces an advisory notice.
    DeadEnd,
}

/// Pure resolver over a funnel's edge list.
///
/// Never mutates anything; given the same definition and inputs it always
/// returns the same transition.
#[derive(Debug, Clone, Copy)]
pub struct GraphNavigator<'a> {
    definition: &'a FunnelDefinition,
}

impl<'a> GraphNavigator<'a> {
    pub fn new(definition: &'a FunnelDefinition) -> Self {
        Self { definition }
    }

    /// Entry step of the funnel: the step that is no edge's target. When
    /// zero or several steps qualify the first step in definition order wins.
    pub fn initial_step(&self) -> Option<&'a str> {
        let mut without_inbound = self
            .definition
            .steps
            .iter()
            .filter(|step| !self.definition.edges.iter().any(|edge| edge.target == step.id));

        match (without_inbound.next(), without_inbound.next()) {
            (Some(step), None) => Some(step.id.as_str()),
            _ => self.definition.steps.first().map(|step| step.id.as_str()),
        }
    }

    /// Resolve the step to show after `current`.
    ///
    /// Precedence: for a question step with a recognized selected option, an
    /// edge whose handle names that option's index wins; failing that, only
    /// option-agnostic edges (no handle) may route the answer — an edge
    /// scoped to a different option never catches it. Without a recognized
    /// option the first edge (in definition order) leaving `current` wins.
    /// When several candidate edges share a source,
    /// first-by-definition-order is authoritative — inherited behavior, kept
    /// on purpose.
    pub fn next_step(&self, current: &str, selected_option: Option<&str>) -> NextStep {
        if let Some(option_index) = self.selected_option_index(current, selected_option) {
            let handle = format!("option-{option_index}");
            let scoped = self.definition.edges.iter().find(|edge| {
                edge.source == current && edge.source_handle.as_deref() == Some(handle.as_str())
            });
            if let Some(edge) = scoped {
                return resolve_target(&edge.target);
            }

            let unscoped = self
                .definition
                .edges
                .iter()
                .find(|edge| edge.source == current && edge.source_handle.is_none());
            return match unscoped {
                Some(edge) => resolve_target(&edge.target),
                None => NextStep::DeadEnd,
            };
        }

        match self
            .definition
            .edges
            .iter()
            .find(|edge| edge.source == current)
        {
            Some(edge) => resolve_target(&edge.target),
            None => NextStep::DeadEnd,
        }
    }

    fn selected_option_index(&self, current: &str, selected_option: Option<&str>) -> Option<usize> {
        let selected = selected_option?;
        let step = self.definition.step(current)?;
        match &step.kind {
            StepKind::Question { options, .. } => {
                options.iter().position(|option| option.text == selected)
            }
            _ => None,
        }
    }
}

/// Edge targets produced by the builder are usually step ids, but option
/// links may carry a full URL instead. Anything starting with `http` is an
/// external destination.
fn resolve_target(target: &str) -> NextStep {
    if target.starts_with("http") {
        NextStep::External(target.to_string())
    } else {
        NextStep::Step(target.to_string())
    }
}
