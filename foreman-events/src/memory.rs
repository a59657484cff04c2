//! In-memory event log.
//!
//! Mock-grade implementation of [`EventLog`] used by the engine's tests
//! and by deployments that do not need durability. One mutex guards the
//! whole map, which trivially satisfies the per-run ordering guarantee:
//! sequence assignment and insertion happen under the same lock.

use crate::{AuditFilter, AuditPage, EventLog};
use async_trait::async_trait;
use foreman_core::{AgentEvent, EntityId, EventLogError, ForemanResult};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// In-memory, mutex-guarded event log.
#[derive(Default)]
pub struct InMemoryEventLog {
    runs: Mutex<HashMap<EntityId, Vec<AgentEvent>>>,
}

impl InMemoryEventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events recorded for a run.
    pub async fn len(&self, run_id: EntityId) -> usize {
        self.runs
            .lock()
            .await
            .get(&run_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, mut event: AgentEvent) -> ForemanResult<i64> {
        let mut runs = self.runs.lock().await;
        let sequence = runs.get(&event.run_id).map(Vec::len).unwrap_or(0) as i64 + 1;
        event.version = sequence;
        runs.entry(event.run_id).or_default().push(event);
        Ok(sequence)
    }

    async fn read(
        &self,
        run_id: EntityId,
        from: Option<i64>,
        to: Option<i64>,
    ) -> ForemanResult<Vec<AgentEvent>> {
        let runs = self.runs.lock().await;
        let events = runs
            .get(&run_id)
            .ok_or(EventLogError::NotFound { run_id })?;

        let from = from.unwrap_or(i64::MIN);
        let to = to.unwrap_or(i64::MAX);
        Ok(events
            .iter()
            .filter(|e| e.version >= from && e.version <= to)
            .cloned()
            .collect())
    }

    async fn audit(&self, filter: &AuditFilter) -> ForemanResult<AuditPage> {
        let runs = self.runs.lock().await;

        // Event ids are UUIDv7 and assigned once, so sorting by id gives a
        // stable global order that concurrent appends only ever extend.
        let mut matching: Vec<&AgentEvent> = runs
            .values()
            .flatten()
            .filter(|e| filter.project_id.is_none_or(|id| e.project_id == id))
            .filter(|e| filter.run_id.is_none_or(|id| e.run_id == id))
            .filter(|e| {
                filter
                    .agent_id
                    .as_deref()
                    .is_none_or(|agent| e.agent_id == agent)
            })
            .filter(|e| {
                filter
                    .action
                    .as_deref()
                    .is_none_or(|action| e.kind.as_str() == action)
            })
            .filter(|e| filter.after.is_none_or(|t| e.created_at > t))
            .filter(|e| filter.before.is_none_or(|t| e.created_at < t))
            .collect();
        matching.sort_by_key(|e| e.id);

        let total = matching.len() as u64;

        let after_cursor: Option<Uuid> = filter
            .cursor
            .as_deref()
            .and_then(|c| Uuid::parse_str(c).ok());
        let start = match after_cursor {
            Some(id) => matching.partition_point(|e| e.id <= id),
            None => 0,
        };

        let limit = filter.effective_limit();
        let page: Vec<AgentEvent> = matching
            .iter()
            .skip(start)
            .take(limit)
            .map(|e| (*e).clone())
            .collect();
        let has_more = start + page.len() < matching.len();
        let cursor = if has_more {
            page.last().map(|e| e.id.to_string())
        } else {
            None
        };

        Ok(AuditPage {
            entries: page,
            cursor,
            has_more,
            total,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_core::{new_entity_id, EventKind, ForemanError};

    fn event(run_id: EntityId, kind: EventKind) -> AgentEvent {
        AgentEvent::builder(kind, run_id).agent("coder-1").build()
    }

    #[tokio::test]
    async fn test_append_assigns_monotonic_sequences() {
        let log = InMemoryEventLog::new();
        let run_id = new_entity_id();

        let s1 = log.append(event(run_id, EventKind::RunStarted)).await.unwrap();
        let s2 = log
            .append(event(run_id, EventKind::ResultReceived))
            .await
            .unwrap();
        let s3 = log.append(event(run_id, EventKind::RunCompleted)).await.unwrap();
        assert_eq!((s1, s2, s3), (1, 2, 3));

        // Independent run has its own sequence.
        let other = new_entity_id();
        assert_eq!(log.append(event(other, EventKind::RunStarted)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_read_is_ordered_and_bounded() {
        let log = InMemoryEventLog::new();
        let run_id = new_entity_id();
        for kind in [
            EventKind::RunStarted,
            EventKind::DispatchRequested,
            EventKind::ResultReceived,
            EventKind::RunCompleted,
        ] {
            log.append(event(run_id, kind)).await.unwrap();
        }

        let all = log.read(run_id, None, None).await.unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.windows(2).all(|w| w[0].version < w[1].version));

        let window = log.read(run_id, Some(2), Some(3)).await.unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].kind, EventKind::DispatchRequested);
        assert_eq!(window[1].kind, EventKind::ResultReceived);
    }

    #[tokio::test]
    async fn test_read_unknown_run_is_not_found() {
        let log = InMemoryEventLog::new();
        let err = log.read(new_entity_id(), None, None).await.unwrap_err();
        assert!(matches!(
            err,
            ForemanError::EventLog(EventLogError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_appends_never_share_a_sequence() {
        let log = std::sync::Arc::new(InMemoryEventLog::new());
        let run_id = new_entity_id();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                log.append(event(run_id, EventKind::ResultReceived)).await
            }));
        }
        let mut sequences = Vec::new();
        for handle in handles {
            sequences.push(handle.await.unwrap().unwrap());
        }
        sequences.sort_unstable();
        sequences.dedup();
        assert_eq!(sequences.len(), 16);
    }

    #[tokio::test]
    async fn test_audit_filters_by_action_and_run() {
        let log = InMemoryEventLog::new();
        let run_a = new_entity_id();
        let run_b = new_entity_id();
        log.append(event(run_a, EventKind::RunStarted)).await.unwrap();
        log.append(event(run_a, EventKind::ToolCallDenied)).await.unwrap();
        log.append(event(run_b, EventKind::ToolCallDenied)).await.unwrap();

        let page = log
            .audit(&AuditFilter::new().with_action("run.toolcall.denied"))
            .await
            .unwrap();
        assert_eq!(page.total, 2);

        let page = log
            .audit(
                &AuditFilter::new()
                    .with_run(run_a)
                    .with_action("run.toolcall.denied"),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.entries[0].run_id, run_a);
    }

    #[tokio::test]
    async fn test_audit_pagination_is_stable_under_appends() {
        let log = InMemoryEventLog::new();
        let run_id = new_entity_id();
        for _ in 0..5 {
            log.append(event(run_id, EventKind::ResultReceived)).await.unwrap();
        }

        let first = log
            .audit(&AuditFilter::new().with_run(run_id).with_limit(2))
            .await
            .unwrap();
        assert_eq!(first.entries.len(), 2);
        assert!(first.has_more);
        let cursor = first.cursor.clone().unwrap();

        // Concurrent append lands after existing events in the stable order.
        log.append(event(run_id, EventKind::ResultReceived)).await.unwrap();

        let second = log
            .audit(
                &AuditFilter::new()
                    .with_run(run_id)
                    .with_limit(2)
                    .with_cursor(cursor),
            )
            .await
            .unwrap();
        assert_eq!(second.entries.len(), 2);
        // No overlap with the first page.
        assert!(second.entries[0].version > first.entries[1].version);
        assert!(second.has_more);
    }

    #[tokio::test]
    async fn test_audit_last_page_has_no_cursor() {
        let log = InMemoryEventLog::new();
        let run_id = new_entity_id();
        for _ in 0..3 {
            log.append(event(run_id, EventKind::ResultReceived)).await.unwrap();
        }

        let page = log
            .audit(&AuditFilter::new().with_run(run_id).with_limit(10))
            .await
            .unwrap();
        assert_eq!(page.entries.len(), 3);
        assert!(!page.has_more);
        assert!(page.cursor.is_none());
    }
}
