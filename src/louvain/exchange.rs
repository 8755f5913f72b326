//! One local-moving round: every non-self-loop edge sends each endpoint a summary of the
//! other endpoint, and every vertex decides on its community from what it received.
//!
//! Two interchangeable strategies produce the same vertex set for the same round context:
//! [`join_round`] spells the exchange out as explicit dataset joins, [`pregel_round`] runs it
//! as a vertex program superstep.

use super::decision::RoundContext;
use super::state::{NeighborSummary, VertexRecord};
use crate::dataset::Dataset;
use crate::graph::{EdgeContext, Graph, VertexId};
use crate::pregel::{self, VertexProgram};

/// Groups every vertex's incoming summaries, in arrival order, without deduplication.
pub fn neighbor_summaries(
    graph: &Graph<VertexRecord>,
) -> Dataset<(VertexId, Vec<NeighborSummary>)> {
    let triplets = graph.triplets();
    let messages = triplets.flat_map(|triplet| {
        if triplet.is_self_loop() {
            Vec::new()
        } else {
            vec![
                (
                    triplet.dst_id,
                    NeighborSummary::observe(&triplet.dst_attr, &triplet.src_attr),
                ),
                (
                    triplet.src_id,
                    NeighborSummary::observe(&triplet.src_attr, &triplet.dst_attr),
                ),
            ]
        }
    });
    triplets.unpersist();

    let grouped = messages.group_by_key();
    messages.unpersist();
    grouped
}

pub fn join_round(
    graph: &Graph<VertexRecord>,
    ctx: &RoundContext,
) -> Dataset<(VertexId, VertexRecord)> {
    let inbox = neighbor_summaries(graph);
    let decided = graph
        .vertices()
        .left_outer_join(&inbox)
        .map(|(id, (record, summaries))| {
            (*id, ctx.decide(record, summaries.clone().unwrap_or_default()))
        });
    inbox.unpersist();
    decided
}

/// The local-moving step as a vertex program.
pub struct LocalMoveProgram<'a> {
    ctx: &'a RoundContext,
}

impl<'a> LocalMoveProgram<'a> {
    pub fn new(ctx: &'a RoundContext) -> Self {
        LocalMoveProgram { ctx }
    }
}

impl VertexProgram for LocalMoveProgram<'_> {
    type State = VertexRecord;
    type Message = Vec<NeighborSummary>;

    fn send_messages(&self, ctx: &mut EdgeContext<'_, VertexRecord, Vec<NeighborSummary>>) {
        let triplet = ctx.triplet();
        if triplet.is_self_loop() {
            return;
        }
        ctx.send_to_dst(vec![NeighborSummary::observe(
            &triplet.dst_attr,
            &triplet.src_attr,
        )]);
        ctx.send_to_src(vec![NeighborSummary::observe(
            &triplet.src_attr,
            &triplet.dst_attr,
        )]);
    }

    fn merge_messages(
        &self,
        mut a: Vec<NeighborSummary>,
        b: Vec<NeighborSummary>,
    ) -> Vec<NeighborSummary> {
        a.extend(b);
        a
    }

    fn apply(
        &self,
        _id: VertexId,
        state: &VertexRecord,
        message: Option<Vec<NeighborSummary>>,
    ) -> VertexRecord {
        self.ctx.decide(state, message.unwrap_or_default())
    }
}

pub fn pregel_round(
    graph: &Graph<VertexRecord>,
    ctx: &RoundContext,
) -> Dataset<(VertexId, VertexRecord)> {
    pregel::superstep(graph, &LocalMoveProgram::new(ctx))
}
