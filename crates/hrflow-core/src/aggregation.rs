//! Pure aggregation rules.
//!
//! Step and instance status are always recomputed from the step snapshot and
//! the recorded decisions. No counters are stored anywhere.

use hrflow_types::approval::{ApprovalRecord, Decision, StepStatus, StepView, Transition};
use hrflow_types::instance::{InstanceStatus, StepSnapshot, WorkflowInstance};
use hrflow_types::template::AggregationRule;

/// Compute the status of `step` from `records`.
///
/// Only records for this step from approvers authorized on it are counted;
/// approvers without a decision count as pending.
pub fn compute_step_status(step: &StepSnapshot, records: &[ApprovalRecord]) -> StepStatus {
    let counted: Vec<&ApprovalRecord> = records
        .iter()
        .filter(|r| r.step_id == step.id && step.is_authorized(&r.approver_id))
        .collect();

    let approvals = counted
        .iter()
        .filter(|r| r.decision == Decision::Approved)
        .count();
    let rejections = counted
        .iter()
        .filter(|r| r.decision == Decision::Rejected)
        .count();
    let total = step.approvers.len();

    match step.rule {
        AggregationRule::All => {
            if rejections > 0 {
                StepStatus::Rejected
            } else if total > 0 && approvals == total {
                StepStatus::Approved
            } else {
                StepStatus::Pending
            }
        }
        AggregationRule::Any => {
            if approvals > 0 {
                StepStatus::Approved
            } else if total > 0 && rejections == total {
                StepStatus::Rejected
            } else {
                StepStatus::Pending
            }
        }
        AggregationRule::Quorum { n } => {
            if rejections > 0 {
                StepStatus::Rejected
            } else if approvals >= n as usize {
                StepStatus::Approved
            } else {
                StepStatus::Pending
            }
        }
    }
}

/// Decide what happens to `instance` given the records of its active step.
///
/// Only Pending instances can transition.
pub fn compute_instance_transition(
    instance: &WorkflowInstance,
    records: &[ApprovalRecord],
) -> Transition {
    if instance.status != InstanceStatus::Pending {
        return Transition::None;
    }
    let Some(step) = instance.current_step() else {
        return Transition::None;
    };

    match compute_step_status(step, records) {
        StepStatus::Pending => Transition::None,
        StepStatus::Rejected => Transition::Rejected,
        StepStatus::Approved => {
            let next = instance.current_step_index + 1;
            if next >= instance.steps.len() {
                Transition::Approved
            } else {
                Transition::Advanced {
                    from: instance.current_step_index,
                    to: next,
                }
            }
        }
    }
}

/// Per-step status view, in step order.
pub fn step_statuses(instance: &WorkflowInstance, records: &[ApprovalRecord]) -> Vec<StepView> {
    instance
        .steps
        .iter()
        .map(|step| StepView {
            step_id: step.id.clone(),
            name: step.name.clone(),
            order: step.order,
            status: compute_step_status(step, records),
            approvers: step.approvers.clone(),
            records: records
                .iter()
                .filter(|r| r.step_id == step.id)
                .cloned()
                .collect(),
        })
        .collect()
}
