/// Visitation-order stack backing "back" navigation.
///
/// Forward navigation pushes the step being *left*; "back" pops the most
/// recently left step. This is a pure LIFO replay of visitation order and
/// deliberately never consults the edge set: returning from `C` (reached via
/// `A -> B -> C`) lands on `B` regardless of which option routed `B -> C`,
/// and the previously selected option is not restored.
#[derive(Debug, Clone, Default)]
pub struct HistoryStack {
    entries: Vec<String>,
}

impl HistoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step_id: impl Into<String>) {
        self.entries.push(step_id.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.entries.pop()
    }

    /// Whether the "back" control should be offered at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }
}
