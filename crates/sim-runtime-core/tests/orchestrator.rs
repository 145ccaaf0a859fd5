//! Integration tests for the lifecycle orchestrator.
//!
//! These tests verify bring-up and teardown policy:
//! - Initialization order and the Ready state
//! - Fatal init failures still tearing everything down
//! - Cleanup failures being collected, not short-circuited
//! - Idempotent teardown

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_test::{assert_err, assert_ok};

use sim_runtime_common::SimError;
use sim_runtime_core::{Lifecycle, LifecycleHandle, LifecycleState, Orchestrator, ResourceInstance};

// ============================================================================
// Test fixtures
// ============================================================================

type CallLog = Arc<Mutex<Vec<String>>>;

struct Recording {
    id: String,
    log: CallLog,
    fail_init: bool,
    fail_cleanup: bool,
}

#[async_trait]
impl Lifecycle for Recording {
    async fn init(&self) -> Result<(), SimError> {
        self.log.lock().push(format!("init {}", self.id));
        if self.fail_init {
            return Err(SimError::initialization_failed(
                &self.id,
                SimError::invalid_config("seed rejected"),
            ));
        }
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), SimError> {
        self.log.lock().push(format!("cleanup {}", self.id));
        if self.fail_cleanup {
            return Err(SimError::invalid_config("cannot remove"));
        }
        Ok(())
    }
}

fn recording(id: &str, log: &CallLog, fail_init: bool, fail_cleanup: bool) -> ResourceInstance {
    let resource = Recording {
        id: id.to_string(),
        log: Arc::clone(log),
        fail_init,
        fail_cleanup,
    };
    ResourceInstance::new("recording", LifecycleHandle::new(id), Arc::new(resource))
}

fn calls(log: &CallLog) -> Vec<String> {
    log.lock().clone()
}

// ============================================================================
// Test: Bring-up and teardown order
// ============================================================================

#[tokio::test]
async fn test_initialize_and_cleanup_order() {
    let log = CallLog::default();
    let mut orchestrator = Orchestrator::new();
    for id in ["a", "b", "c"] {
        orchestrator.register(recording(id, &log, false, false)).unwrap();
    }

    assert_ok!(orchestrator.initialize_all().await);
    for id in ["a", "b", "c"] {
        assert_eq!(orchestrator.state(id), Some(LifecycleState::Ready));
    }

    let report = orchestrator.cleanup_all().await;
    assert!(report.is_clean());
    assert_eq!(report.attempted(), 3);

    assert_eq!(
        calls(&log),
        vec!["init a", "init b", "init c", "cleanup c", "cleanup b", "cleanup a"]
    );
    for id in ["a", "b", "c"] {
        assert_eq!(orchestrator.state(id), Some(LifecycleState::Destroyed));
    }
}

// ============================================================================
// Test: Init failure tears everything down and surfaces the original error
// ============================================================================

#[tokio::test]
async fn test_init_failure_cleans_up_and_returns_original_error() {
    let log = CallLog::default();
    let mut orchestrator = Orchestrator::new();
    orchestrator.register(recording("ok", &log, false, false)).unwrap();
    orchestrator.register(recording("bad", &log, true, false)).unwrap();
    orchestrator.register(recording("never", &log, false, false)).unwrap();

    let err = assert_err!(orchestrator.initialize_all().await);

    match err {
        SimError::InitializationFailed { resource_id, source } => {
            assert_eq!(resource_id, "bad");
            assert!(source.to_string().contains("seed rejected"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // No init after the failure; cleanup reaches the failed and the
    // already-initialized instance.
    let log = calls(&log);
    assert_eq!(&log[..2], ["init ok", "init bad"]);
    assert!(!log.contains(&"init never".to_string()));
    assert!(log.contains(&"cleanup bad".to_string()));
    assert!(log.contains(&"cleanup ok".to_string()));

    for id in ["ok", "bad", "never"] {
        assert_eq!(orchestrator.state(id), Some(LifecycleState::Destroyed));
    }
}

// ============================================================================
// Test: Cleanup failures are aggregated
// ============================================================================

#[tokio::test]
async fn test_cleanup_failures_do_not_block_others() {
    let log = CallLog::default();
    let mut orchestrator = Orchestrator::new();
    orchestrator.register(recording("a", &log, false, false)).unwrap();
    orchestrator.register(recording("b", &log, false, true)).unwrap();
    orchestrator.register(recording("c", &log, false, false)).unwrap();

    orchestrator.initialize_all().await.unwrap();
    let report = orchestrator.cleanup_all().await;

    assert!(!report.is_clean());
    assert_eq!(report.attempted(), 3);
    assert_eq!(report.failed_ids(), vec!["b"]);
    assert!(matches!(report.failures()[0], SimError::CleanupFailed { .. }));

    // Every instance was visited, including the one after the failure
    let log = calls(&log);
    assert!(log.contains(&"cleanup a".to_string()));
    assert!(log.contains(&"cleanup c".to_string()));
    assert_eq!(orchestrator.state("b"), Some(LifecycleState::Destroyed));

    let err = report.into_result().unwrap_err();
    assert_eq!(err.to_string(), "Cleanup failed for 1 resource(s): b");
}

// ============================================================================
// Test: Teardown is idempotent
// ============================================================================

#[tokio::test]
async fn test_cleanup_all_twice_is_noop() {
    let log = CallLog::default();
    let mut orchestrator = Orchestrator::new();
    orchestrator.register(recording("a", &log, false, false)).unwrap();
    orchestrator.initialize_all().await.unwrap();

    assert!(orchestrator.cleanup_all().await.is_clean());
    let second = orchestrator.cleanup_all().await;

    assert!(second.is_clean());
    assert_eq!(second.attempted(), 0);
    assert_eq!(calls(&log), vec!["init a", "cleanup a"]);
}

#[tokio::test]
async fn test_cleanup_without_initialize() {
    let log = CallLog::default();
    let mut orchestrator = Orchestrator::new();
    orchestrator.register(recording("a", &log, false, false)).unwrap();

    let report = orchestrator.cleanup_all().await;

    assert!(report.is_clean());
    assert_eq!(calls(&log), vec!["cleanup a"]);
    assert_eq!(orchestrator.state("a"), Some(LifecycleState::Destroyed));
    assert_eq!(orchestrator.ids().collect::<Vec<_>>(), vec!["a"]);
}

// ============================================================================
// Test: Resources that move their own state
// ============================================================================

/// Moves its own lifecycle handle ahead of the orchestrator.
struct SelfManaged {
    handle: LifecycleHandle,
}

#[async_trait]
impl Lifecycle for SelfManaged {
    async fn init(&self) -> Result<(), SimError> {
        self.handle.transition(LifecycleState::Ready)?;
        Err(SimError::invalid_config("ready, then failed"))
    }

    async fn cleanup(&self) -> Result<(), SimError> {
        self.handle.transition(LifecycleState::Destroyed)?;
        Ok(())
    }
}

#[tokio::test]
async fn test_unexpected_transitions_do_not_mask_outcomes() {
    let handle = LifecycleHandle::new("rogue");
    let resource = SelfManaged {
        handle: handle.clone(),
    };
    let mut orchestrator = Orchestrator::new();
    orchestrator
        .register(ResourceInstance::new("rogue", handle, Arc::new(resource)))
        .unwrap();

    // Ready -> Failed is illegal; the init error still surfaces unchanged
    let err = assert_err!(orchestrator.initialize_all().await);
    assert_eq!(err.to_string(), SimError::invalid_config("ready, then failed").to_string());

    // Cleanup ran (Ready -> CleaningUp) and the resource ended destroyed,
    // even though the orchestrator's own Destroyed transition was refused
    assert_eq!(orchestrator.state("rogue"), Some(LifecycleState::Destroyed));
    let again = orchestrator.cleanup_all().await;
    assert_eq!(again.attempted(), 0);
}
