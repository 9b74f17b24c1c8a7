//! Deoptimization-state bookkeeping.
//!
//! Optimized code may need to hand control back to a conservative execution
//! mode at certain statements: calls, allocations, monitor operations.
//! Resuming there requires the simulated operand stack to be reconstructible,
//! so the recorder persists just enough of it — the slots backing a call's
//! arguments, keyed by call site and argument position (resumption re-enters
//! at argument-construction granularity), and the minimal set of persisted
//! slots live across each transition point, keyed by address.
//!
//! Whether a candidate statement becomes a transition point at all is a cost
//! call: a deep operand stack, an unresolved call target, or a target
//! overridden widely enough to defeat prediction make resumption more
//! expensive than re-running conservatively. Such sites are skipped and the
//! statement is marked unresumable instead.

use std::collections::HashMap;

use crate::config::DeoptHeuristics;
use crate::ir::node::{IlOp, SlotId};
use crate::ir::stack::StackShape;
use crate::resolver::{MethodDescriptor, MethodFlags};

/// Outcome of the transition-point cost check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionDecision {
    /// The statement can never hand control over; nothing to record.
    NotCandidate,
    /// Record resumption state for this site.
    Record,
    /// Candidate site that failed the cost heuristic; mark it unresumable.
    CannotResume,
}

/// Collects resumption state during one method translation.
pub struct DeoptRecorder {
    heuristics: DeoptHeuristics,
    arguments: HashMap<(usize, u8), SlotId>,
    liveness: HashMap<usize, Vec<SlotId>>,
}

impl DeoptRecorder {
    /// Creates a recorder with the given cost thresholds.
    pub fn new(heuristics: DeoptHeuristics) -> Self {
        DeoptRecorder {
            heuristics,
            arguments: HashMap::new(),
            liveness: HashMap::new(),
        }
    }

    /// Decides whether the statement is a transition point worth recording.
    ///
    /// `target` is the resolved call target for call statements, `None` for an
    /// unresolved one; non-call candidates pass `None` and are judged on stack
    /// depth alone.
    pub fn classify(
        &self,
        op: IlOp,
        stack_depth: usize,
        target: Option<&MethodDescriptor>,
    ) -> TransitionDecision {
        if !op.is_transition_candidate() {
            return TransitionDecision::NotCandidate;
        }
        if stack_depth > self.heuristics.max_stack_depth {
            return TransitionDecision::CannotResume;
        }
        if op == IlOp::Call {
            match target {
                None => return TransitionDecision::CannotResume,
                Some(descriptor) => {
                    if descriptor.flags.contains(MethodFlags::OVERRIDDEN)
                        && descriptor.complexity > self.heuristics.max_target_complexity
                    {
                        return TransitionDecision::CannotResume;
                    }
                }
            }
        }
        TransitionDecision::Record
    }

    /// Records the persisted slots backing a call's arguments.
    ///
    /// The arguments occupy `count` consecutive slots starting at
    /// `first_slot`, bottom argument first.
    pub fn record_arguments(&mut self, site: usize, first_slot: u16, count: u8) {
        for position in 0..count {
            self.arguments
                .insert((site, position), SlotId(first_slot + u16::from(position)));
        }
    }

    /// Records the slots live across the transition point at `site`.
    ///
    /// The shape is the simulated stack after the statement's own operands
    /// have been consumed, so untouched deeper slots never become artificially
    /// live.
    pub fn record_liveness(&mut self, site: usize, shape: &StackShape) {
        let live: Vec<SlotId> = shape.iter().map(|pending| pending.slot).collect();
        self.liveness.insert(site, live);
    }

    /// The slot persisted for one call argument, if recorded.
    pub fn argument_slot(&self, site: usize, position: u8) -> Option<SlotId> {
        self.arguments.get(&(site, position)).copied()
    }

    /// The slots live across the transition point at `site`, if recorded.
    pub fn live_slots(&self, site: usize) -> Option<&[SlotId]> {
        self.liveness.get(&site).map(Vec::as_slice)
    }

    /// Number of recorded transition points.
    pub fn site_count(&self) -> usize {
        self.liveness.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::stack::PendingSlot;
    use crate::ir::ValueType;
    use crate::test::create_method;

    fn recorder() -> DeoptRecorder {
        DeoptRecorder::new(DeoptHeuristics::new())
    }

    #[test]
    fn test_only_candidate_ops_transition() {
        let recorder = recorder();
        assert_eq!(
            recorder.classify(IlOp::FieldStore, 0, None),
            TransitionDecision::NotCandidate
        );
        assert_eq!(
            recorder.classify(IlOp::Goto, 0, None),
            TransitionDecision::NotCandidate
        );
        assert_eq!(
            recorder.classify(IlOp::New, 0, None),
            TransitionDecision::Record
        );
        assert_eq!(
            recorder.classify(IlOp::MonitorEnter, 2, None),
            TransitionDecision::Record
        );
    }

    #[test]
    fn test_deep_stack_fails_the_cost_check() {
        let recorder = recorder();
        let target = create_method(1, "callee");
        assert_eq!(
            recorder.classify(IlOp::Call, 16, Some(&target)),
            TransitionDecision::Record
        );
        assert_eq!(
            recorder.classify(IlOp::Call, 17, Some(&target)),
            TransitionDecision::CannotResume
        );
    }

    #[test]
    fn test_unresolved_call_cannot_resume() {
        let recorder = recorder();
        assert_eq!(
            recorder.classify(IlOp::Call, 0, None),
            TransitionDecision::CannotResume
        );
    }

    #[test]
    fn test_widely_overridden_target_fails_the_cost_check() {
        let recorder = recorder();
        let mut target = create_method(1, "callee");
        target.flags |= MethodFlags::OVERRIDDEN;
        target.complexity = 31;
        assert_eq!(
            recorder.classify(IlOp::Call, 0, Some(&target)),
            TransitionDecision::CannotResume
        );

        // within the bound, overriding alone does not veto
        target.complexity = 30;
        assert_eq!(
            recorder.classify(IlOp::Call, 0, Some(&target)),
            TransitionDecision::Record
        );
    }

    #[test]
    fn test_arguments_are_keyed_by_site_and_position() {
        let mut recorder = recorder();
        recorder.record_arguments(12, 3, 2);
        assert_eq!(recorder.argument_slot(12, 0), Some(SlotId(3)));
        assert_eq!(recorder.argument_slot(12, 1), Some(SlotId(4)));
        assert_eq!(recorder.argument_slot(12, 2), None);
        assert_eq!(recorder.argument_slot(13, 0), None);
    }

    #[test]
    fn test_liveness_is_keyed_by_address() {
        let mut recorder = recorder();
        let shape = vec![
            PendingSlot {
                slot: SlotId(0),
                dtype: ValueType::Int,
            },
            PendingSlot {
                slot: SlotId(1),
                dtype: ValueType::Reference,
            },
        ];
        recorder.record_liveness(20, &shape);
        assert_eq!(recorder.live_slots(20), Some(&[SlotId(0), SlotId(1)][..]));
        assert_eq!(recorder.live_slots(21), None);
        assert_eq!(recorder.site_count(), 1);
    }
}
