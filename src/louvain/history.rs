use crate::dataset::Dataset;
use crate::graph::VertexId;

/// Original vertex to community, composed across passes.
#[derive(Debug, Clone, Default)]
pub struct CommunityHistory {
    assignment: Option<Dataset<(VertexId, VertexId)>>,
    passes: usize,
}

impl CommunityHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.assignment.is_none()
    }

    /// Number of passes folded in so far.
    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn assignment(&self) -> Option<&Dataset<(VertexId, VertexId)>> {
        self.assignment.as_ref()
    }

    pub fn into_assignment(self) -> Option<Dataset<(VertexId, VertexId)>> {
        self.assignment
    }

    /// Folds in one pass's `coarse vertex -> community` mapping.
    ///
    /// The first pass is stored as is. Afterwards the stored `vertex -> previous` mapping is
    /// inverted and joined with the new pass on `previous`. Vertices whose previous community
    /// is unknown to the new pass keep it.
    pub fn update(&mut self, pass_assignment: &Dataset<(VertexId, VertexId)>) {
        let next = match self.assignment.take() {
            None => pass_assignment.clone(),
            Some(previous) => {
                let inverted = previous.map(|(vertex, community)| (*community, *vertex));
                previous.unpersist();
                let composed = inverted
                    .left_outer_join(pass_assignment)
                    .map(|(previous, (vertex, next))| (*vertex, next.unwrap_or(*previous)));
                inverted.unpersist();
                composed
            }
        };
        self.assignment = Some(next);
        self.passes += 1;
    }
}
