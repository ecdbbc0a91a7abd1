//! Per-conversation selection state.
//!
//! A [`SessionStore`] hands out one [`SelectionState`] per [`SessionKey`].
//! Each state sits behind its own async mutex, so two users never contend
//! and requests from the same conversation are applied one at a time.

use std::{collections::BTreeMap, collections::HashMap, fmt, sync::Arc, time::Duration};

use chatops_types::{ParameterSchema, SessionIdentity};
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Where a conversation is in the select-then-run flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowPhase {
    /// No target chosen yet.
    Idle,
    /// Target chosen, no parameter value stored.
    TargetSelected,
    /// Some parameters still lack a value.
    ParametersPartial,
    /// Every parameter has a value; the Run control is offered.
    ParametersComplete,
    /// The assembled command has been executed.
    Dispatched,
}

/// Identity of one conversation with one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub plugin: String,
    pub user_id: String,
    pub channel_id: String,
    pub thread_id: Option<String>,
}

impl SessionKey {
    pub fn new(plugin: impl Into<String>, identity: &SessionIdentity) -> Self {
        Self {
            plugin: plugin.into(),
            user_id: identity.user_id.clone(),
            channel_id: identity.channel_id.clone(),
            thread_id: identity.thread_id.clone(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.plugin, self.channel_id, self.user_id)?;
        if let Some(thread) = &self.thread_id {
            write!(f, "/{thread}")?;
        }
        Ok(())
    }
}

/// Chosen target plus raw parameter values keyed by `<target>-<flag>`.
#[derive(Debug, Clone)]
pub struct SelectionState {
    target: Option<String>,
    values: BTreeMap<String, String>,
    dispatched: bool,
    last_active_at: DateTime<Utc>,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self {
            target: None,
            values: BTreeMap::new(),
            dispatched: false,
            last_active_at: Utc::now(),
        }
    }
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Select `resource`. Choosing a different target clears every stored
    /// parameter value; re-selecting the same target keeps them.
    ///
    /// Returns whether values were cleared.
    pub fn set_target(&mut self, resource: impl Into<String>) -> bool {
        let resource = resource.into();
        self.touch();
        if self.target.as_deref() == Some(resource.as_str()) {
            return false;
        }
        let cleared = !self.values.is_empty();
        self.values.clear();
        self.target = Some(resource);
        cleared
    }

    /// Store the raw value for `key`, replacing any previous one.
    pub fn set_parameter(&mut self, key: impl Into<String>, raw_value: impl Into<String>) {
        self.touch();
        self.values.insert(key.into(), raw_value.into());
    }

    /// Store `raw_value` only when `key` has no value yet. Returns whether it was stored.
    pub fn set_parameter_if_absent(&mut self, key: impl Into<String>, raw_value: impl Into<String>) -> bool {
        let key = key.into();
        if self.values.contains_key(&key) {
            return false;
        }
        self.set_parameter(key, raw_value);
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn mark_dispatched(&mut self) {
        self.dispatched = true;
        self.last_active_at = Utc::now();
    }

    /// Undo [`mark_dispatched`](Self::mark_dispatched) after a failed run so it can be retried.
    pub fn reopen(&mut self) {
        self.dispatched = false;
    }

    pub fn last_active_at(&self) -> DateTime<Utc> {
        self.last_active_at
    }

    /// Read-only copy for rendering and assembly.
    pub fn snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            target: self.target.clone(),
            values: self.values.clone(),
            dispatched: self.dispatched,
        }
    }

    pub fn is_complete(&self, schema: &ParameterSchema) -> bool {
        self.snapshot().is_complete(schema)
    }

    fn touch(&mut self) {
        self.dispatched = false;
        self.last_active_at = Utc::now();
    }
}

/// Immutable view of a [`SelectionState`] at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSnapshot {
    target: Option<String>,
    values: BTreeMap<String, String>,
    dispatched: bool,
}

impl SelectionSnapshot {
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// True when a target is chosen and every selectable parameter has a
    /// non-empty value.
    pub fn is_complete(&self, schema: &ParameterSchema) -> bool {
        let Some(target) = self.target() else {
            return false;
        };
        schema.selectable().all(|parameter| {
            self.get(&parameter.selection_key(target))
                .is_some_and(|raw| !parameter.value_component(raw).trim().is_empty())
        })
    }

    pub fn phase(&self, schema: &ParameterSchema) -> FlowPhase {
        if self.target.is_none() {
            FlowPhase::Idle
        } else if self.dispatched {
            FlowPhase::Dispatched
        } else if self.is_complete(schema) {
            FlowPhase::ParametersComplete
        } else if self.values.is_empty() {
            FlowPhase::TargetSelected
        } else {
            FlowPhase::ParametersPartial
        }
    }
}

/// Selection states of every live conversation.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionKey, Arc<Mutex<SelectionState>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of `key`, created empty on first use.
    pub async fn session(&self, key: &SessionKey) -> Arc<Mutex<SelectionState>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(state) = sessions.get(key) {
                return Arc::clone(state);
            }
        }

        let mut sessions = self.sessions.write().await;
        if let Some(state) = sessions.get(key) {
            return Arc::clone(state);
        }
        debug!(session = %key, "creating selection state");
        let state = Arc::new(Mutex::new(SelectionState::new()));
        sessions.insert(key.clone(), Arc::clone(&state));
        state
    }

    pub async fn remove(&self, key: &SessionKey) -> bool {
        self.sessions.write().await.remove(key).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop states idle for longer than `max_idle`. States currently locked
    /// by a request are kept. Returns the number removed.
    pub async fn prune_idle(&self, max_idle: Duration) -> usize {
        let Some(cutoff) = TimeDelta::from_std(max_idle)
            .ok()
            .and_then(|idle| Utc::now().checked_sub_signed(idle))
        else {
            return 0;
        };
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, state| match state.try_lock() {
            Ok(state) => state.last_active_at > cutoff,
            Err(_) => true,
        });
        let pruned = before - sessions.len();
        if pruned > 0 {
            debug!(pruned, "pruned idle selection states");
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatops_types::{Parameter, ParameterKind};

    fn schema() -> ParameterSchema {
        ParameterSchema::new(vec![
            Parameter::new("-n", ParameterKind::Text),
            Parameter::new("-i", ParameterKind::Boolean).with_default("false"),
        ])
        .unwrap()
    }

    fn key(user: &str) -> SessionKey {
        SessionKey::new("job", &SessionIdentity::new(user, "C1"))
    }

    #[test]
    fn changing_target_clears_values() {
        let mut state = SelectionState::new();
        state.set_target("backup-job");
        state.set_parameter("backup-job--n", "-n prod");
        assert!(!state.set_target("backup-job"));
        assert_eq!(state.get("backup-job--n"), Some("-n prod"));

        assert!(state.set_target("restore-job"));
        assert_eq!(state.get("backup-job--n"), None);
        assert_eq!(state.target(), Some("restore-job"));
    }

    #[test]
    fn phases_follow_the_flow() {
        let schema = schema();
        let mut state = SelectionState::new();
        assert_eq!(state.snapshot().phase(&schema), FlowPhase::Idle);

        state.set_target("backup-job");
        assert_eq!(state.snapshot().phase(&schema), FlowPhase::TargetSelected);

        state.set_parameter("backup-job--i", "-i false");
        assert_eq!(state.snapshot().phase(&schema), FlowPhase::ParametersPartial);

        state.set_parameter("backup-job--n", "-n prod");
        assert_eq!(state.snapshot().phase(&schema), FlowPhase::ParametersComplete);

        state.mark_dispatched();
        assert_eq!(state.snapshot().phase(&schema), FlowPhase::Dispatched);

        state.set_parameter("backup-job--n", "-n staging");
        assert_eq!(state.snapshot().phase(&schema), FlowPhase::ParametersComplete);
    }

    #[test]
    fn complete_only_when_every_selectable_parameter_is_set() {
        let schema = ParameterSchema::new(vec![
            Parameter::new("-h", ParameterKind::Boolean),
            Parameter::new("-a", ParameterKind::Enumerated).with_values(["x", "y"]),
            Parameter::new("-b", ParameterKind::Boolean),
            Parameter::new("-c", ParameterKind::Text),
        ])
        .unwrap();
        let values = [("wide-job--a", "-a x"), ("wide-job--b", "-b false"), ("wide-job--c", "-c eu west")];

        for mask in 0u8..(1 << values.len()) {
            let mut state = SelectionState::new();
            state.set_target("wide-job");
            for (bit, (key, raw)) in values.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    state.set_parameter(*key, *raw);
                }
            }
            let all_set = mask == (1 << values.len()) - 1;
            assert_eq!(state.is_complete(&schema), all_set, "subset {mask:03b}");
        }
        assert!(!SelectionState::new().is_complete(&schema));
    }

    #[test]
    fn reopen_returns_to_complete() {
        let schema = schema();
        let mut state = SelectionState::new();
        state.set_target("backup-job");
        state.set_parameter("backup-job--i", "-i false");
        state.set_parameter("backup-job--n", "-n prod");
        state.mark_dispatched();
        state.reopen();
        assert_eq!(state.snapshot().phase(&schema), FlowPhase::ParametersComplete);
    }

    #[test]
    fn blank_text_value_is_not_complete() {
        let schema = schema();
        let mut state = SelectionState::new();
        state.set_target("backup-job");
        state.set_parameter("backup-job--i", "-i true");
        state.set_parameter("backup-job--n", "-n ");
        assert!(!state.is_complete(&schema));
    }

    #[test]
    fn snapshot_is_detached() {
        let mut state = SelectionState::new();
        state.set_target("backup-job");
        let snapshot = state.snapshot();
        state.set_parameter("backup-job--n", "-n prod");
        assert_eq!(snapshot.get("backup-job--n"), None);
    }

    #[tokio::test]
    async fn sessions_are_isolated_per_identity() {
        let store = SessionStore::new();
        store.session(&key("U1")).await.lock().await.set_target("backup-job");
        store.session(&key("U2")).await.lock().await.set_target("restore-job");

        assert_eq!(store.session(&key("U1")).await.lock().await.target(), Some("backup-job"));
        assert_eq!(store.session(&key("U2")).await.lock().await.target(), Some("restore-job"));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn same_identity_shares_state() {
        let store = SessionStore::new();
        let first = store.session(&key("U1")).await;
        let second = store.session(&key("U1")).await;
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn prunes_idle_sessions_but_keeps_locked_ones() {
        let store = SessionStore::new();
        let busy = store.session(&key("U1")).await;
        store.session(&key("U2")).await;

        let _guard = busy.lock().await;
        let pruned = store.prune_idle(Duration::ZERO).await;
        assert_eq!(pruned, 1);
        assert_eq!(store.len().await, 1);
    }
}
