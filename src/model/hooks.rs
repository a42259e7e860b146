//! Lifecycle hooks.
//!
//! Hooks run before and after `create`, `modify`, `move` and `remove`. They
//! receive a [`HookContext`] and may change the entity's attributes in the
//! pre phase. A hook cannot start another lifecycle operation itself; callers
//! that run lifecycle operations from inside a hook pass
//! [`HookPhase::Running`], which skips the hooks of the nested operation.

use super::base::ModelKind;
use crate::error::{KelvinError, KelvinResult};
use crate::schema::Attributes;
use log::{debug, warn};
use std::fmt;
use std::sync::Arc;

/// Lifecycle operation a hook is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    Create,
    Modify,
    Move,
    Remove,
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookEvent::Create => "create",
            HookEvent::Modify => "modify",
            HookEvent::Move => "move",
            HookEvent::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// Whether hooks are already running for the current call chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookPhase {
    #[default]
    Idle,
    Running,
}

/// Which models a hook is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookTarget {
    Any,
    /// Every user role
    Users,
    Kind(ModelKind),
}

impl HookTarget {
    pub fn matches(&self, kind: ModelKind) -> bool {
        match self {
            HookTarget::Any => true,
            HookTarget::Users => matches!(kind, ModelKind::User(_)),
            HookTarget::Kind(target) => *target == kind,
        }
    }
}

/// What a hook sees of the entity.
#[derive(Debug)]
pub struct HookContext<'a> {
    pub event: HookEvent,
    pub kind: ModelKind,
    /// Current DN, `None` before creation.
    pub dn: Option<&'a str>,
    pub attributes: &'a mut Attributes,
}

pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// A hook around lifecycle operations.
pub trait LifecycleHook: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    fn model(&self) -> HookTarget;

    /// Higher priorities run first.
    fn priority(&self) -> i32 {
        0
    }

    /// Runs before the operation. An error aborts it.
    fn pre(&self, _context: &mut HookContext<'_>) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs after the operation. Errors are logged.
    fn post(&self, _context: &mut HookContext<'_>) -> Result<(), HookError> {
        Ok(())
    }
}

/// Registered hooks, ordered by descending priority.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| h.name().to_string()))
            .finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook. Hooks of equal priority keep registration order.
    pub fn register(&mut self, hook: Arc<dyn LifecycleHook>) {
        let position = self
            .hooks
            .iter()
            .position(|h| h.priority() < hook.priority())
            .unwrap_or(self.hooks.len());
        self.hooks.insert(position, hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    fn applicable(&self, kind: ModelKind) -> impl Iterator<Item = &Arc<dyn LifecycleHook>> {
        self.hooks.iter().filter(move |h| h.model().matches(kind))
    }

    pub(crate) fn run_pre(
        &self,
        phase: HookPhase,
        context: &mut HookContext<'_>,
    ) -> KelvinResult<()> {
        if phase == HookPhase::Running {
            if self.applicable(context.kind).next().is_some() {
                warn!(
                    "Skipping pre-{} hooks for {}: hooks are already running",
                    context.event, context.kind
                );
            }
            return Ok(());
        }
        for hook in self.applicable(context.kind) {
            debug!("Running pre-{} hook {}", context.event, hook.name());
            hook.pre(context).map_err(|e| KelvinError::Hook {
                hook: hook.name().to_string(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    pub(crate) fn run_post(&self, phase: HookPhase, context: &mut HookContext<'_>) {
        if phase == HookPhase::Running {
            if self.applicable(context.kind).next().is_some() {
                warn!(
                    "Skipping post-{} hooks for {}: hooks are already running",
                    context.event, context.kind
                );
            }
            return;
        }
        for hook in self.applicable(context.kind) {
            debug!("Running post-{} hook {}", context.event, hook.name());
            if let Err(e) = hook.post(context) {
                warn!("Post-{} hook {} failed: {}", context.event, hook.name(), e);
            }
        }
    }
}
