use thiserror::Error;

use crate::domain::quote::QuoteStatus;
use crate::roles::Role;

/// Completion condition checked before an edge is taken. Gates are evaluated
/// against a [`GateContext`] the caller rebuilds from current child rows at
/// decision time; a stale cached flag must never satisfy a gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    None,
    HasItems,
    AllItemsProcured,
    ParallelStagesComplete,
    NoApprovalRequired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeKind {
    Forward,
    /// Hop between the two parallel stages; neither completion flag moves.
    ParallelHop,
    /// Sends the quote back for rework and records who asked.
    RevisionReturn,
    Cancel,
}

/// One admissible transition in the fixed quote pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub from: QuoteStatus,
    pub to: QuoteStatus,
    pub role: Role,
    pub gate: Gate,
    pub kind: EdgeKind,
    /// Reachable only through its dedicated operation, never through a
    /// generic advance.
    pub operation_only: bool,
}

impl Edge {
    fn forward(from: QuoteStatus, to: QuoteStatus, role: Role, gate: Gate) -> Self {
        Self { from, to, role, gate, kind: EdgeKind::Forward, operation_only: false }
    }

    fn operation(from: QuoteStatus, to: QuoteStatus, role: Role, gate: Gate) -> Self {
        Self { from, to, role, gate, kind: EdgeKind::Forward, operation_only: true }
    }

    fn hop(from: QuoteStatus, to: QuoteStatus, role: Role) -> Self {
        Self { from, to, role, gate: Gate::None, kind: EdgeKind::ParallelHop, operation_only: false }
    }

    fn revision(from: QuoteStatus, to: QuoteStatus, role: Role) -> Self {
        // Revision returns require a comment, so they are owned by their
        // dedicated operation like the approval and issuance edges.
        Self {
            from,
            to,
            role,
            gate: Gate::None,
            kind: EdgeKind::RevisionReturn,
            operation_only: true,
        }
    }
}

/// The two stages that run side by side after procurement. Each is completed
/// independently by its own department before sales review opens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParallelStage {
    Logistics,
    Customs,
}

impl ParallelStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParallelStage::Logistics => "logistics",
            ParallelStage::Customs => "customs",
        }
    }

    /// Department that owns the stage.
    pub fn role(&self) -> Role {
        match self {
            ParallelStage::Logistics => Role::Logistics,
            ParallelStage::Customs => Role::Customs,
        }
    }
}

/// Live counts and flags the gates are checked against. Built from the
/// quote's current child rows inside the same transaction that performs the
/// transition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GateContext {
    pub item_count: usize,
    pub procured_item_count: usize,
    pub logistics_done: bool,
    pub customs_done: bool,
    pub approval_reasons_fired: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionEffect {
    StampProcurementDone,
    StampSalesReviewDone,
    SetRevisionReturn { department: Role },
    ClearRevisionReturn,
}

/// The admitted transition plus the quote-level side effects the caller must
/// apply in the same write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionPlan {
    pub from: QuoteStatus,
    pub to: QuoteStatus,
    pub role: Role,
    pub kind: EdgeKind,
    pub effects: Vec<TransitionEffect>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("no transition from `{from}` to `{to}`")]
    NotAdmissible { from: QuoteStatus, to: QuoteStatus },
    #[error("transition from `{from}` to `{to}` blocked: {reason}")]
    GateUnsatisfied { from: QuoteStatus, to: QuoteStatus, reason: String },
    #[error("quote in terminal status `{status}` cannot transition")]
    TerminalStatus { status: QuoteStatus },
    #[error("transition from `{from}` to `{to}` must go through its dedicated operation")]
    OperationOnly { from: QuoteStatus, to: QuoteStatus },
}

/// The fixed pipeline. All admission logic is a pure function of
/// (current status, target status, gate context); the engine holds no state.
#[derive(Clone, Copy, Debug, Default)]
pub struct WorkflowEngine;

impl WorkflowEngine {
    /// The static edge table. Returns `None` for pairs with no edge.
    pub fn edge(from: QuoteStatus, to: QuoteStatus) -> Option<Edge> {
        use QuoteStatus::{
            Approved, Cancelled, ClientNegotiation, Deal, Draft, PendingApproval, PendingCustoms,
            PendingLogistics, PendingProcurement, PendingQuoteControl, PendingSalesReview,
            PendingSignature, PendingSpecControl, Rejected, SentToClient,
        };
        use Role::{Customs, Logistics, Procurement, QuoteControl, SalesManager, SeniorManagement};

        let edge = match (from, to) {
            (Draft, PendingProcurement) => {
                Edge::forward(from, to, SalesManager, Gate::HasItems)
            }
            (PendingProcurement, PendingLogistics) | (PendingProcurement, PendingCustoms) => {
                Edge::forward(from, to, Procurement, Gate::AllItemsProcured)
            }
            (PendingLogistics, PendingCustoms) => Edge::hop(from, to, Logistics),
            (PendingCustoms, PendingLogistics) => Edge::hop(from, to, Customs),
            (PendingLogistics, PendingSalesReview) => {
                Edge::forward(from, to, Logistics, Gate::ParallelStagesComplete)
            }
            (PendingCustoms, PendingSalesReview) => {
                Edge::forward(from, to, Customs, Gate::ParallelStagesComplete)
            }
            (PendingSalesReview, PendingQuoteControl) => {
                Edge::forward(from, to, SalesManager, Gate::None)
            }
            (PendingQuoteControl, Approved) => {
                Edge::forward(from, to, QuoteControl, Gate::NoApprovalRequired)
            }
            (PendingQuoteControl, PendingApproval) => {
                Edge::operation(from, to, QuoteControl, Gate::None)
            }
            (ClientNegotiation, PendingApproval) => {
                Edge::operation(from, to, SalesManager, Gate::None)
            }
            (PendingApproval, Approved)
            | (PendingApproval, ClientNegotiation)
            | (PendingApproval, Rejected) => {
                Edge::operation(from, to, SeniorManagement, Gate::None)
            }
            (Approved, SentToClient) => Edge::forward(from, to, SalesManager, Gate::None),
            (SentToClient, ClientNegotiation) | (SentToClient, PendingSpecControl) => {
                Edge::forward(from, to, SalesManager, Gate::None)
            }
            (ClientNegotiation, PendingSpecControl) => {
                Edge::forward(from, to, SalesManager, Gate::None)
            }
            (PendingSpecControl, PendingSignature) => {
                Edge::operation(from, to, QuoteControl, Gate::None)
            }
            (PendingSignature, Deal) => Edge::operation(from, to, QuoteControl, Gate::None),
            (PendingQuoteControl, PendingProcurement)
            | (PendingQuoteControl, PendingLogistics)
            | (PendingQuoteControl, PendingCustoms)
            | (PendingQuoteControl, PendingSalesReview) => {
                Edge::revision(from, to, QuoteControl)
            }
            (PendingLogistics, PendingProcurement) => Edge::revision(from, to, Logistics),
            (PendingCustoms, PendingProcurement) => Edge::revision(from, to, Customs),
            (from, Cancelled) if !from.is_terminal() => Edge {
                from,
                to,
                role: SalesManager,
                gate: Gate::None,
                kind: EdgeKind::Cancel,
                operation_only: false,
            },
            _ => return None,
        };

        Some(edge)
    }

    /// Admission for a generic advance. Edges owned by a dedicated operation
    /// are rejected here so callers cannot bypass the operation's extra
    /// bookkeeping.
    pub fn plan(
        &self,
        from: QuoteStatus,
        to: QuoteStatus,
        context: &GateContext,
    ) -> Result<TransitionPlan, TransitionError> {
        let plan = self.plan_operation(from, to, context)?;
        let edge = Self::edge(from, to).ok_or(TransitionError::NotAdmissible { from, to })?;
        if edge.operation_only {
            return Err(TransitionError::OperationOnly { from, to });
        }
        Ok(plan)
    }

    /// Admission for dedicated operations (approval routing, issuance, deal
    /// creation), which are allowed onto operation-only edges.
    pub fn plan_operation(
        &self,
        from: QuoteStatus,
        to: QuoteStatus,
        context: &GateContext,
    ) -> Result<TransitionPlan, TransitionError> {
        if from.is_terminal() {
            return Err(TransitionError::TerminalStatus { status: from });
        }

        let edge = Self::edge(from, to).ok_or(TransitionError::NotAdmissible { from, to })?;
        check_gate(&edge, context)?;

        Ok(TransitionPlan {
            from,
            to,
            role: edge.role,
            kind: edge.kind,
            effects: effects_for(&edge),
        })
    }
}

fn check_gate(edge: &Edge, context: &GateContext) -> Result<(), TransitionError> {
    let reason = match edge.gate {
        Gate::None => return Ok(()),
        Gate::HasItems => {
            if context.item_count > 0 {
                return Ok(());
            }
            "quote has no items".to_string()
        }
        Gate::AllItemsProcured => {
            if context.item_count == 0 {
                "quote has no items".to_string()
            } else if context.procured_item_count >= context.item_count {
                return Ok(());
            } else {
                let remaining = context.item_count - context.procured_item_count;
                format!(
                    "{remaining} of {} items still pending procurement",
                    context.item_count
                )
            }
        }
        Gate::ParallelStagesComplete => match (context.logistics_done, context.customs_done) {
            (true, true) => return Ok(()),
            (false, true) => "logistics stage not completed".to_string(),
            (true, false) => "customs stage not completed".to_string(),
            (false, false) => "logistics and customs stages not completed".to_string(),
        },
        Gate::NoApprovalRequired => {
            if context.approval_reasons_fired == 0 {
                return Ok(());
            }
            format!(
                "{} approval condition(s) require senior review",
                context.approval_reasons_fired
            )
        }
    };

    Err(TransitionError::GateUnsatisfied { from: edge.from, to: edge.to, reason })
}

fn effects_for(edge: &Edge) -> Vec<TransitionEffect> {
    use QuoteStatus::{
        PendingCustoms, PendingLogistics, PendingProcurement, PendingQuoteControl,
    };

    let mut effects = Vec::new();

    if edge.kind == EdgeKind::RevisionReturn {
        effects.push(TransitionEffect::SetRevisionReturn { department: edge.role });
        return effects;
    }

    if edge.from == PendingProcurement
        && matches!(edge.to, PendingLogistics | PendingCustoms)
    {
        effects.push(TransitionEffect::StampProcurementDone);
    }
    if edge.to == PendingQuoteControl {
        effects.push(TransitionEffect::StampSalesReviewDone);
        effects.push(TransitionEffect::ClearRevisionReturn);
    }

    effects
}

#[cfg(test)]
mod tests {
    use crate::domain::quote::QuoteStatus;
    use crate::roles::Role;
    use crate::workflow::engine::{
        EdgeKind, GateContext, TransitionEffect, TransitionError, WorkflowEngine,
    };

    fn all_items_done(count: usize) -> GateContext {
        GateContext { item_count: count, procured_item_count: count, ..GateContext::default() }
    }

    #[test]
    fn happy_path_walks_draft_to_deal() {
        let engine = WorkflowEngine;
        let both_stages_done =
            GateContext { logistics_done: true, customs_done: true, ..GateContext::default() };

        let steps = [
            (QuoteStatus::Draft, QuoteStatus::PendingProcurement, all_items_done(2)),
            (QuoteStatus::PendingProcurement, QuoteStatus::PendingLogistics, all_items_done(2)),
            (QuoteStatus::PendingLogistics, QuoteStatus::PendingSalesReview, both_stages_done),
            (
                QuoteStatus::PendingSalesReview,
                QuoteStatus::PendingQuoteControl,
                GateContext::default(),
            ),
            (QuoteStatus::PendingQuoteControl, QuoteStatus::Approved, GateContext::default()),
            (QuoteStatus::Approved, QuoteStatus::SentToClient, GateContext::default()),
            (QuoteStatus::SentToClient, QuoteStatus::PendingSpecControl, GateContext::default()),
        ];

        for (from, to, context) in steps {
            let plan = engine.plan(from, to, &context).expect("edge should be admissible");
            assert_eq!(plan.from, from);
            assert_eq!(plan.to, to);
        }

        let signature = engine
            .plan_operation(
                QuoteStatus::PendingSpecControl,
                QuoteStatus::PendingSignature,
                &GateContext::default(),
            )
            .expect("issuance edge");
        assert_eq!(signature.role, Role::QuoteControl);

        let deal = engine
            .plan_operation(
                QuoteStatus::PendingSignature,
                QuoteStatus::Deal,
                &GateContext::default(),
            )
            .expect("deal edge");
        assert_eq!(deal.to, QuoteStatus::Deal);
    }

    #[test]
    fn leaving_procurement_requires_every_item_completed() {
        let engine = WorkflowEngine;
        let context = GateContext {
            item_count: 5,
            procured_item_count: 2,
            ..GateContext::default()
        };

        let error = engine
            .plan(QuoteStatus::PendingProcurement, QuoteStatus::PendingLogistics, &context)
            .expect_err("three items are still open");

        match error {
            TransitionError::GateUnsatisfied { reason, .. } => {
                assert_eq!(reason, "3 of 5 items still pending procurement");
            }
            other => panic!("expected gate rejection, got {other:?}"),
        }
    }

    #[test]
    fn an_added_incomplete_item_reblocks_the_gate() {
        let engine = WorkflowEngine;
        let cleared = all_items_done(3);
        engine
            .plan(QuoteStatus::PendingProcurement, QuoteStatus::PendingCustoms, &cleared)
            .expect("all items completed");

        // one more item lands, still pending
        let reblocked = GateContext { item_count: 4, procured_item_count: 3, ..cleared };
        let error = engine
            .plan(QuoteStatus::PendingProcurement, QuoteStatus::PendingCustoms, &reblocked)
            .expect_err("new item reopens the gate");
        assert!(matches!(error, TransitionError::GateUnsatisfied { .. }));
    }

    #[test]
    fn parallel_hop_is_open_both_ways_without_gates() {
        let engine = WorkflowEngine;

        let to_customs = engine
            .plan(QuoteStatus::PendingLogistics, QuoteStatus::PendingCustoms, &GateContext::default())
            .expect("logistics -> customs hop");
        assert_eq!(to_customs.kind, EdgeKind::ParallelHop);
        assert_eq!(to_customs.role, Role::Logistics);
        assert!(to_customs.effects.is_empty());

        let back = engine
            .plan(QuoteStatus::PendingCustoms, QuoteStatus::PendingLogistics, &GateContext::default())
            .expect("customs -> logistics hop");
        assert_eq!(back.role, Role::Customs);
    }

    #[test]
    fn sales_review_needs_both_parallel_stages_done() {
        let engine = WorkflowEngine;
        let context = GateContext { logistics_done: true, ..GateContext::default() };

        let error = engine
            .plan(QuoteStatus::PendingLogistics, QuoteStatus::PendingSalesReview, &context)
            .expect_err("customs flag is still unset");

        match error {
            TransitionError::GateUnsatisfied { reason, .. } => {
                assert_eq!(reason, "customs stage not completed");
            }
            other => panic!("expected gate rejection, got {other:?}"),
        }
    }

    #[test]
    fn quote_control_goes_direct_to_approved_only_when_nothing_fires() {
        let engine = WorkflowEngine;

        engine
            .plan(QuoteStatus::PendingQuoteControl, QuoteStatus::Approved, &GateContext::default())
            .expect("no approval conditions outstanding");

        let context = GateContext { approval_reasons_fired: 2, ..GateContext::default() };
        let error = engine
            .plan(QuoteStatus::PendingQuoteControl, QuoteStatus::Approved, &context)
            .expect_err("fired predicates force the approval detour");
        assert!(matches!(error, TransitionError::GateUnsatisfied { .. }));
    }

    #[test]
    fn operation_owned_edges_reject_generic_advances() {
        let engine = WorkflowEngine;

        for (from, to) in [
            (QuoteStatus::PendingQuoteControl, QuoteStatus::PendingApproval),
            (QuoteStatus::PendingApproval, QuoteStatus::Approved),
            (QuoteStatus::PendingSpecControl, QuoteStatus::PendingSignature),
            (QuoteStatus::PendingSignature, QuoteStatus::Deal),
            (QuoteStatus::PendingQuoteControl, QuoteStatus::PendingProcurement),
            (QuoteStatus::PendingLogistics, QuoteStatus::PendingProcurement),
        ] {
            let error = engine.plan(from, to, &GateContext::default()).expect_err("operation only");
            assert!(matches!(error, TransitionError::OperationOnly { .. }), "{from} -> {to}");

            engine
                .plan_operation(from, to, &GateContext::default())
                .expect("dedicated operations may take the edge");
        }
    }

    #[test]
    fn revision_returns_record_the_requesting_department() {
        let engine = WorkflowEngine;

        let plan = engine
            .plan_operation(
                QuoteStatus::PendingQuoteControl,
                QuoteStatus::PendingProcurement,
                &GateContext::default(),
            )
            .expect("quote control can send work back");

        assert_eq!(plan.kind, EdgeKind::RevisionReturn);
        assert_eq!(
            plan.effects,
            vec![TransitionEffect::SetRevisionReturn { department: Role::QuoteControl }]
        );

        let customs_return = engine
            .plan_operation(
                QuoteStatus::PendingCustoms,
                QuoteStatus::PendingProcurement,
                &GateContext::default(),
            )
            .expect("customs can send work back to procurement");
        assert_eq!(
            customs_return.effects,
            vec![TransitionEffect::SetRevisionReturn { department: Role::Customs }]
        );
    }

    #[test]
    fn entering_quote_control_clears_the_revision_marker() {
        let engine = WorkflowEngine;

        let plan = engine
            .plan(
                QuoteStatus::PendingSalesReview,
                QuoteStatus::PendingQuoteControl,
                &GateContext::default(),
            )
            .expect("sales review hands off to quote control");

        assert!(plan.effects.contains(&TransitionEffect::StampSalesReviewDone));
        assert!(plan.effects.contains(&TransitionEffect::ClearRevisionReturn));
    }

    #[test]
    fn leaving_procurement_stamps_the_stage_timestamp() {
        let engine = WorkflowEngine;
        let plan = engine
            .plan(QuoteStatus::PendingProcurement, QuoteStatus::PendingCustoms, &all_items_done(1))
            .expect("gate satisfied");
        assert_eq!(plan.effects, vec![TransitionEffect::StampProcurementDone]);
    }

    #[test]
    fn cancellation_is_open_from_any_non_terminal_status() {
        let engine = WorkflowEngine;

        for status in QuoteStatus::ALL {
            let result = engine.plan(status, QuoteStatus::Cancelled, &GateContext::default());
            if status.is_terminal() {
                assert!(result.is_err(), "{status} is terminal");
            } else {
                let plan = result.expect("cancellation edge");
                assert_eq!(plan.kind, EdgeKind::Cancel);
                assert_eq!(plan.role, Role::SalesManager);
            }
        }
    }

    #[test]
    fn terminal_statuses_have_no_outgoing_edges() {
        let engine = WorkflowEngine;

        for terminal in [QuoteStatus::Deal, QuoteStatus::Rejected, QuoteStatus::Cancelled] {
            for target in QuoteStatus::ALL {
                let error = engine
                    .plan_operation(terminal, target, &GateContext::default())
                    .expect_err("terminal statuses are final");
                assert!(matches!(error, TransitionError::TerminalStatus { .. }));
            }
        }
    }

    #[test]
    fn unrelated_status_pairs_are_not_admissible() {
        let engine = WorkflowEngine;

        let error = engine
            .plan(QuoteStatus::Draft, QuoteStatus::Deal, &GateContext::default())
            .expect_err("no shortcut from draft to deal");
        assert!(matches!(error, TransitionError::NotAdmissible { .. }));

        let error = engine
            .plan(QuoteStatus::Approved, QuoteStatus::PendingProcurement, &GateContext::default())
            .expect_err("approved quotes do not reenter procurement");
        assert!(matches!(error, TransitionError::NotAdmissible { .. }));
    }
}
