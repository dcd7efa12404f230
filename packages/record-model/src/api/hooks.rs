//! Lifecycle hooks
//!
//! Hooks are registered per model on the [`ModelRegistry`](super::ModelRegistry)
//! and run synchronously in registration order. Before-hooks see the primary
//! keys about to be (un)deleted and may narrow them or veto the operation;
//! after-hooks observe the final keys and the number of rows changed.

use crate::domain::Value;

/// Before-hook verdict
#[derive(Debug, Clone, PartialEq)]
pub enum HookDecision {
    /// Continue with these keys (a subset of the keys passed in)
    Proceed(Vec<Value>),
    /// Abort: no mutation, no cascade, no after-hooks
    Veto,
}

pub trait LifecycleHook: Send + Sync {
    fn before_delete(&self, keys: &[Value]) -> HookDecision {
        HookDecision::Proceed(keys.to_vec())
    }

    fn after_delete(&self, _keys: &[Value], _affected: usize) {}

    fn before_undelete(&self, keys: &[Value]) -> HookDecision {
        HookDecision::Proceed(keys.to_vec())
    }

    fn after_undelete(&self, _keys: &[Value], _affected: usize) {}
}
