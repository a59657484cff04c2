//! The pure fold from events to run state.
//!
//! `reduce` is a pure function of prior state and one event: no clock, no
//! I/O, no randomness. Replaying the same sequence from empty state always
//! yields the same snapshot, which is what makes crash recovery and rewind
//! possible. Policy inputs (tool sensitivity, deny behavior, retry budgets)
//! are fixed at construction, so a reducer built from the same
//! configuration is deterministic across replays.

use crate::{PlanState, RunState, RunStatus, StepState};
use foreman_core::{
    AgentEvent, DenyPolicy, EngineConfig, EntityId, EventKind, PlanStatus, StepStatus, ToolPolicy,
};
use std::sync::Arc;

/// Folds events into run state under a fixed policy configuration.
pub struct Reducer {
    tool_policy: Arc<dyn ToolPolicy>,
    deny_policy: DenyPolicy,
    quality_gate_retries: u32,
    /// Total attempts a plan step is allowed (first try included).
    max_step_attempts: u32,
}

impl Reducer {
    /// Create a reducer from the engine configuration.
    pub fn new(tool_policy: Arc<dyn ToolPolicy>, config: &EngineConfig) -> Self {
        Self {
            tool_policy,
            deny_policy: config.deny_policy,
            quality_gate_retries: config.quality_gate_retries,
            max_step_attempts: config.quality_gate_retries + 1,
        }
    }

    /// Apply one event to a prior state.
    ///
    /// Events against a terminal run are no-ops, as are duplicate result
    /// deliveries (same `request_id`). Pure: the same prior state and
    /// event always produce the same next state.
    pub fn reduce(&self, prior: &RunState, event: &AgentEvent) -> RunState {
        if prior.status.is_terminal() {
            return prior.clone();
        }
        if event.kind == EventKind::ResultReceived
            && prior.seen_results.contains(&event.request_id)
        {
            return prior.clone();
        }

        let mut next = prior.clone();
        next.last_version = event.version;
        next.last_event_at = Some(event.created_at);

        // Any event other than the stall marker is forward progress.
        if next.status == RunStatus::Stalled && event.kind != EventKind::StallDetected {
            next.status = RunStatus::Running;
        }

        match event.kind {
            EventKind::RunStarted => {
                next.status = RunStatus::Running;
            }
            EventKind::RunCompleted => {
                next.status = RunStatus::Completed;
            }
            EventKind::RunFailed => {
                next.status = RunStatus::Failed;
                next.failure_reason = Some(payload_reason(event, "run failed"));
            }
            EventKind::RunCancelled => {
                next.status = RunStatus::Cancelled;
            }

            EventKind::DispatchRequested => {}
            EventKind::DispatchFailed => {
                next.status = RunStatus::Failed;
                next.failure_reason = Some(payload_reason(event, "dispatch failed"));
            }
            EventKind::ResultReceived => {
                next.seen_results.insert(event.request_id);
            }

            EventKind::ToolCallRequested => {
                let sensitive = event
                    .tool_name
                    .as_deref()
                    .is_some_and(|tool| self.tool_policy.is_sensitive(tool));
                if sensitive {
                    next.status = RunStatus::AwaitingApproval;
                    next.pending_call = Some(event.request_id);
                }
            }
            EventKind::ToolCallApproved => {
                next.status = RunStatus::Running;
                next.pending_call = None;
            }
            EventKind::ToolCallDenied => {
                next.pending_call = None;
                match self.deny_policy {
                    DenyPolicy::FailRun => {
                        next.status = RunStatus::Failed;
                        next.failure_reason =
                            Some(payload_reason(event, "sensitive tool call denied"));
                    }
                    DenyPolicy::SkipAndContinue => {
                        next.status = RunStatus::Running;
                    }
                }
            }

            EventKind::QualityGateStarted => {
                next.status = RunStatus::QualityGate;
            }
            EventKind::QualityGatePassed => {
                next.status = RunStatus::Running;
            }
            EventKind::QualityGateFailed => {
                next.quality_gate_attempts += 1;
                if next.quality_gate_attempts > self.quality_gate_retries {
                    next.status = RunStatus::Failed;
                    next.failure_reason = Some(format!(
                        "quality gate failed after {} attempts",
                        next.quality_gate_attempts
                    ));
                } else {
                    next.status = RunStatus::Running;
                }
            }

            EventKind::DeliveryStarted => {
                next.status = RunStatus::Delivering;
            }
            EventKind::DeliveryCompleted => {
                next.status = RunStatus::Running;
            }

            EventKind::Handoff => {}
            EventKind::StallDetected => {
                next.status = RunStatus::Stalled;
            }

            EventKind::PlanCreated => {
                let plan_id = payload_id(event, "plan_id").unwrap_or(event.id);
                let steps = event.payload["steps"].as_u64().unwrap_or(0) as usize;
                next.plan = Some(PlanState::new(plan_id, steps));
            }
            EventKind::PlanStarted => {
                if let Some(plan) = &mut next.plan {
                    plan.status = PlanStatus::Started;
                }
            }
            EventKind::PlanCompleted => {
                if let Some(plan) = &mut next.plan {
                    plan.status = PlanStatus::Completed;
                }
            }
            EventKind::PlanFailed => {
                if let Some(plan) = &mut next.plan {
                    plan.status = PlanStatus::Failed;
                }
            }
            EventKind::PlanCancelled => {
                if let Some(plan) = &mut next.plan {
                    plan.status = PlanStatus::Cancelled;
                }
            }

            EventKind::StepStarted => {
                if let Some(step) = step_mut(&mut next.plan, event) {
                    step.status = StepStatus::Running;
                    step.attempts += 1;
                }
            }
            EventKind::StepCompleted => {
                if let Some(step) = step_mut(&mut next.plan, event) {
                    step.status = StepStatus::Completed;
                }
                if let Some(plan) = &mut next.plan {
                    if plan.all_steps_completed() {
                        plan.status = PlanStatus::Completed;
                    }
                }
            }
            EventKind::StepFailed => {
                let budget = self.max_step_attempts;
                let mut exhausted = false;
                if let Some(step) = step_mut(&mut next.plan, event) {
                    if step.attempts >= budget {
                        step.status = StepStatus::Failed;
                        exhausted = true;
                    } else {
                        // Budget remains: the step goes back to pending for
                        // another attempt.
                        step.status = StepStatus::Pending;
                    }
                }
                if exhausted {
                    if let Some(plan) = &mut next.plan {
                        plan.status = PlanStatus::Failed;
                    }
                }
            }
        }

        next
    }
}

fn payload_reason(event: &AgentEvent, fallback: &str) -> String {
    event.payload["reason"]
        .as_str()
        .unwrap_or(fallback)
        .to_string()
}

fn payload_id(event: &AgentEvent, field: &str) -> Option<EntityId> {
    event.payload[field].as_str()?.parse().ok()
}

fn step_mut<'a>(plan: &'a mut Option<PlanState>, event: &AgentEvent) -> Option<&'a mut StepState> {
    let index = event.payload["step"].as_u64()? as usize;
    plan.as_mut()?.steps.get_mut(index)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_core::{new_entity_id, SensitivePolicy};
    use serde_json::json;

    fn reducer(config: EngineConfig) -> Reducer {
        Reducer::new(Arc::new(SensitivePolicy::default()), &config)
    }

    fn event(kind: EventKind, run_id: EntityId, version: i64) -> AgentEvent {
        let mut e = AgentEvent::builder(kind, run_id).build();
        e.version = version;
        e
    }

    fn fold(r: &Reducer, run_id: EntityId, events: &[AgentEvent]) -> RunState {
        events
            .iter()
            .fold(RunState::new(run_id), |state, e| r.reduce(&state, e))
    }

    #[test]
    fn test_started_run_is_running() {
        let r = reducer(EngineConfig::default());
        let run_id = new_entity_id();
        let state = fold(&r, run_id, &[event(EventKind::RunStarted, run_id, 1)]);
        assert_eq!(state.status, RunStatus::Running);
        assert_eq!(state.last_version, 1);
    }

    #[test]
    fn test_replay_determinism() {
        let r = reducer(EngineConfig::default());
        let run_id = new_entity_id();
        let mut toolcall = event(EventKind::ToolCallRequested, run_id, 2);
        toolcall.tool_name = Some("shell".to_string());
        let events = vec![
            event(EventKind::RunStarted, run_id, 1),
            toolcall,
            event(EventKind::ToolCallApproved, run_id, 3),
            event(EventKind::ResultReceived, run_id, 4),
            event(EventKind::RunCompleted, run_id, 5),
        ];
        let first = fold(&r, run_id, &events);
        let second = fold(&r, run_id, &events);
        assert_eq!(first, second);
        assert_eq!(first.status, RunStatus::Completed);
    }

    #[test]
    fn test_sensitive_tool_call_awaits_approval() {
        let r = reducer(EngineConfig::default());
        let run_id = new_entity_id();
        let mut toolcall = event(EventKind::ToolCallRequested, run_id, 2);
        toolcall.tool_name = Some("git_push".to_string());
        let state = fold(
            &r,
            run_id,
            &[event(EventKind::RunStarted, run_id, 1), toolcall.clone()],
        );
        assert_eq!(state.status, RunStatus::AwaitingApproval);
        assert_eq!(state.pending_call, Some(toolcall.request_id));
    }

    #[test]
    fn test_unrestricted_tool_call_keeps_running() {
        let r = reducer(EngineConfig::default());
        let run_id = new_entity_id();
        let mut toolcall = event(EventKind::ToolCallRequested, run_id, 2);
        toolcall.tool_name = Some("read_file".to_string());
        let state = fold(&r, run_id, &[event(EventKind::RunStarted, run_id, 1), toolcall]);
        assert_eq!(state.status, RunStatus::Running);
        assert!(state.pending_call.is_none());
    }

    #[test]
    fn test_deny_fails_run_under_fail_policy() {
        let r = reducer(EngineConfig::default().with_deny_policy(DenyPolicy::FailRun));
        let run_id = new_entity_id();
        let mut toolcall = event(EventKind::ToolCallRequested, run_id, 2);
        toolcall.tool_name = Some("shell".to_string());
        let state = fold(
            &r,
            run_id,
            &[
                event(EventKind::RunStarted, run_id, 1),
                toolcall,
                event(EventKind::ToolCallDenied, run_id, 3),
            ],
        );
        assert_eq!(state.status, RunStatus::Failed);
        assert!(state.failure_reason.is_some());
    }

    #[test]
    fn test_deny_continues_under_skip_policy() {
        let r = reducer(EngineConfig::default().with_deny_policy(DenyPolicy::SkipAndContinue));
        let run_id = new_entity_id();
        let mut toolcall = event(EventKind::ToolCallRequested, run_id, 2);
        toolcall.tool_name = Some("shell".to_string());
        let state = fold(
            &r,
            run_id,
            &[
                event(EventKind::RunStarted, run_id, 1),
                toolcall,
                event(EventKind::ToolCallDenied, run_id, 3),
            ],
        );
        assert_eq!(state.status, RunStatus::Running);
        assert!(state.pending_call.is_none());
    }

    #[test]
    fn test_quality_gate_retry_budget() {
        let r = reducer(EngineConfig::default().with_quality_gate_retries(2));
        let run_id = new_entity_id();
        let mut state = fold(&r, run_id, &[event(EventKind::RunStarted, run_id, 1)]);

        // Two failures stay within budget.
        for v in 2..=3 {
            state = r.reduce(&state, &event(EventKind::QualityGateFailed, run_id, v));
            assert_eq!(state.status, RunStatus::Running);
        }
        // Third failure exhausts the budget.
        state = r.reduce(&state, &event(EventKind::QualityGateFailed, run_id, 4));
        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.quality_gate_attempts, 3);
    }

    #[test]
    fn test_duplicate_result_is_idempotent() {
        let r = reducer(EngineConfig::default());
        let run_id = new_entity_id();
        let result = event(EventKind::ResultReceived, run_id, 2);
        let mut duplicate = result.clone();
        duplicate.version = 3;

        let state = fold(
            &r,
            run_id,
            &[event(EventKind::RunStarted, run_id, 1), result.clone()],
        );
        let after_duplicate = r.reduce(&state, &duplicate);
        assert_eq!(state, after_duplicate);
    }

    #[test]
    fn test_late_result_against_terminal_state_is_noop() {
        let r = reducer(EngineConfig::default());
        let run_id = new_entity_id();
        let state = fold(
            &r,
            run_id,
            &[
                event(EventKind::RunStarted, run_id, 1),
                event(EventKind::RunCompleted, run_id, 2),
            ],
        );
        assert_eq!(state.status, RunStatus::Completed);

        let late = event(EventKind::ResultReceived, run_id, 3);
        let after = r.reduce(&state, &late);
        assert_eq!(after, state);
        assert_eq!(after.last_version, 2);
    }

    #[test]
    fn test_dispatch_failure_fails_run_with_reason() {
        let r = reducer(EngineConfig::default());
        let run_id = new_entity_id();
        let mut failed = event(EventKind::DispatchFailed, run_id, 2);
        failed.payload = json!({"reason": "claude-worker: publish task: broker down"});
        let state = fold(&r, run_id, &[event(EventKind::RunStarted, run_id, 1), failed]);
        assert_eq!(state.status, RunStatus::Failed);
        assert!(state
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("publish task"));
    }

    #[test]
    fn test_stall_and_recovery() {
        let r = reducer(EngineConfig::default());
        let run_id = new_entity_id();
        let mut state = fold(
            &r,
            run_id,
            &[
                event(EventKind::RunStarted, run_id, 1),
                event(EventKind::StallDetected, run_id, 2),
            ],
        );
        assert_eq!(state.status, RunStatus::Stalled);

        state = r.reduce(&state, &event(EventKind::ResultReceived, run_id, 3));
        assert_eq!(state.status, RunStatus::Running);
    }

    #[test]
    fn test_plan_mirrors_step_events() {
        let r = reducer(EngineConfig::default());
        let run_id = new_entity_id();
        let plan_id = new_entity_id();

        let mut created = event(EventKind::PlanCreated, run_id, 2);
        created.payload = json!({"plan_id": plan_id.to_string(), "steps": 2});
        let step = |kind, version, index: u32| {
            let mut e = event(kind, run_id, version);
            e.payload = json!({"step": index});
            e
        };

        let state = fold(
            &r,
            run_id,
            &[
                event(EventKind::RunStarted, run_id, 1),
                created,
                event(EventKind::PlanStarted, run_id, 3),
                step(EventKind::StepStarted, 4, 0),
                step(EventKind::StepCompleted, 5, 0),
                step(EventKind::StepStarted, 6, 1),
                step(EventKind::StepCompleted, 7, 1),
            ],
        );

        let plan = state.plan.unwrap();
        assert_eq!(plan.plan_id, plan_id);
        assert_eq!(plan.status, PlanStatus::Completed);
        assert!(plan.steps.iter().all(|s| s.status == StepStatus::Completed));
    }

    #[test]
    fn test_step_retry_budget_exhaustion_fails_plan() {
        // quality_gate_retries 1 gives each step 2 attempts.
        let r = reducer(EngineConfig::default().with_quality_gate_retries(1));
        let run_id = new_entity_id();
        let plan_id = new_entity_id();

        let mut created = event(EventKind::PlanCreated, run_id, 2);
        created.payload = json!({"plan_id": plan_id.to_string(), "steps": 1});
        let step = |kind, version| {
            let mut e = event(kind, run_id, version);
            e.payload = json!({"step": 0});
            e
        };

        let mut state = fold(
            &r,
            run_id,
            &[
                event(EventKind::RunStarted, run_id, 1),
                created,
                event(EventKind::PlanStarted, run_id, 3),
                step(EventKind::StepStarted, 4),
                step(EventKind::StepFailed, 5),
            ],
        );
        // First failure: budget remains, step back to pending.
        assert_eq!(state.plan.as_ref().unwrap().steps[0].status, StepStatus::Pending);
        assert_eq!(state.plan.as_ref().unwrap().status, PlanStatus::Started);

        state = r.reduce(&state, &step(EventKind::StepStarted, 6));
        state = r.reduce(&state, &step(EventKind::StepFailed, 7));
        assert_eq!(state.plan.as_ref().unwrap().steps[0].status, StepStatus::Failed);
        assert_eq!(state.plan.as_ref().unwrap().status, PlanStatus::Failed);
    }
}
