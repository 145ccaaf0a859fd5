//! Resource lifecycle contract and state machine.
//!
//! ```text
//! Uninitialized ──► Initializing ──► Ready ──► CleaningUp ──► Destroyed
//!       │                 │                        ▲
//!       │                 └──────► Failed ─────────┤
//!       └──────────────────────────────────────────┘
//! ```
//!
//! The direct `Uninitialized -> CleaningUp` edge lets teardown after a failed
//! bring-up reach instances that never started.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use sim_runtime_common::SimError;

/// Hooks the orchestrator drives. Never called by client code.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Allocate storage and seed declared initial state.
    async fn init(&self) -> Result<(), SimError>;

    /// Release everything `init` allocated.
    ///
    /// Must succeed when nothing was allocated or everything is already gone.
    async fn cleanup(&self) -> Result<(), SimError>;
}

/// Lifecycle state of one resource instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Registered, `init` not yet called.
    Uninitialized,
    /// `init` is running.
    Initializing,
    /// `init` succeeded; client operations are accepted.
    Ready,
    /// `init` failed; awaiting best-effort teardown.
    Failed,
    /// `cleanup` is running.
    CleaningUp,
    /// `cleanup` finished. Terminal.
    Destroyed,
}

impl LifecycleState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: Self) -> bool {
        use LifecycleState::{CleaningUp, Destroyed, Failed, Initializing, Ready, Uninitialized};

        matches!(
            (self, next),
            (Uninitialized | Ready | Failed, CleaningUp)
                | (Uninitialized, Initializing)
                | (Initializing, Ready | Failed)
                | (CleaningUp, Destroyed)
        )
    }

    /// Returns `true` for `Destroyed`.
    pub fn is_terminal(self) -> bool {
        self == Self::Destroyed
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::CleaningUp => "cleaning up",
            Self::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// Shared view of one instance's lifecycle state.
///
/// The orchestrator moves the state; the resource's client reads it to refuse
/// operations outside `Ready`.
#[derive(Debug, Clone)]
pub struct LifecycleHandle {
    resource_id: Arc<str>,
    state: Arc<RwLock<LifecycleState>>,
}

impl LifecycleHandle {
    /// Create a handle in the `Uninitialized` state.
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: Arc::from(resource_id.into()),
            state: Arc::new(RwLock::new(LifecycleState::Uninitialized)),
        }
    }

    /// Id of the instance this handle belongs to.
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    /// Move to `next`, returning the previous state.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the transition is not allowed.
    pub fn transition(&self, next: LifecycleState) -> Result<LifecycleState, SimError> {
        let mut state = self.state.write();
        let current = *state;
        if !current.can_transition_to(next) {
            return Err(SimError::invalid_state(
                self.resource_id.as_ref(),
                current,
                format!("transition to {next}"),
            ));
        }
        *state = next;
        Ok(current)
    }

    /// Fail unless the instance is `Ready`.
    pub fn ensure_ready(&self, operation: &str) -> Result<(), SimError> {
        let state = self.state();
        if state == LifecycleState::Ready {
            Ok(())
        } else {
            Err(SimError::invalid_state(self.resource_id.as_ref(), state, operation))
        }
    }
}
