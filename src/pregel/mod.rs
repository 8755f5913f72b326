//! Vertex-centric bulk-synchronous supersteps.
//!
//! A [`VertexProgram`] sends messages along edges, merges messages per destination and
//! applies the merged message to each vertex. Every superstep reads one snapshot of the
//! vertex set and produces a new one, so no vertex sees a neighbor's update before the
//! barrier.

use crate::dataset::Dataset;
use crate::graph::{EdgeContext, Graph, VertexId};

pub trait VertexProgram: Sync {
    type State: Clone + Send + Sync;
    type Message: Clone + Send + Sync;

    fn send_messages(&self, ctx: &mut EdgeContext<'_, Self::State, Self::Message>);

    fn merge_messages(&self, a: Self::Message, b: Self::Message) -> Self::Message;

    /// `message` is `None` for vertices nobody wrote to in this superstep.
    fn apply(
        &self,
        id: VertexId,
        state: &Self::State,
        message: Option<Self::Message>,
    ) -> Self::State;
}

/// Runs one superstep and returns the next vertex set.
pub fn superstep<P: VertexProgram>(
    graph: &Graph<P::State>,
    program: &P,
) -> Dataset<(VertexId, P::State)> {
    let inbox = graph.aggregate_messages(
        |ctx| program.send_messages(ctx),
        |a, b| program.merge_messages(a, b),
    );
    let next = graph
        .vertices()
        .left_outer_join(&inbox)
        .map(|(id, (state, message))| (*id, program.apply(*id, state, message.clone())));
    inbox.unpersist();
    next
}
