//! Generic lifecycle registry for pluggable components.
//!
//! Instantiated twice by the host: themes (full Initialize → Activate →
//! Deactivate → Finalize machine) and extensions (Initialize only).
//! Components implement the hook traits against a capability-scoped context;
//! the registry owns all bookkeeping so authors never reimplement idempotency.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use anyhow::Result;

use crate::bridge::{options_to_args, safe_string, OptionValue, ScriptBridge};
use crate::error::LifecycleError;

/// Case folds and collapses internal whitespace to single spaces.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Registry key: normalized display name plus the author-supplied type tag.
/// Two components of different concrete types may share a display name; the
/// tag keeps their keys distinct. The derived ordering (name, then tag, both
/// ascending) is the deterministic tie-break for name lookups.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentKey {
    normalized: String,
    tag: &'static str,
}

impl ComponentKey {
    pub fn new(name: &str, tag: &'static str) -> Self {
        Self { normalized: normalize_name(name), tag }
    }

    pub fn name(&self) -> &str {
        &self.normalized
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.normalized, self.tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Registered,
    Initialized,
    Activated,
    Finalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOp {
    Initialize,
    Activate,
    Deactivate,
    Finalize,
}

impl LifecycleState {
    /// Transition table. Invalid edges come back as the typed violation for
    /// `name`; callers decide which violations are no-ops (repeated
    /// initialize and finalize are).
    pub fn apply(self, op: LifecycleOp, name: &str) -> Result<LifecycleState, LifecycleError> {
        use LifecycleOp::*;
        use LifecycleState::*;
        match (self, op) {
            (Finalized, _) => Err(LifecycleError::Finalized(name.to_string())),
            (_, Finalize) => Ok(Finalized),
            (Registered, Initialize) => Ok(Initialized),
            (Initialized | Activated, Initialize) => {
                Err(LifecycleError::AlreadyInitialized(name.to_string()))
            }
            (Initialized, Activate) => Ok(Activated),
            (Registered, Activate) => Err(LifecycleError::NotInitialized(name.to_string())),
            (Activated, Activate) => Err(LifecycleError::AlreadyActivated(name.to_string())),
            (Activated, Deactivate) => Ok(Initialized),
            (Registered | Initialized, Deactivate) => {
                Err(LifecycleError::NotActivated(name.to_string()))
            }
        }
    }
}

pub(crate) struct Slot<C> {
    pub(crate) name: String,
    pub(crate) state: LifecycleState,
    pub(crate) component: C,
}

/// Map from component key to tracked slot, with tombstones for finalized
/// keys so stale keys answer `Finalized` instead of `NotFound`.
pub struct Registry<C> {
    entries: BTreeMap<ComponentKey, Slot<C>>,
    finalized: BTreeSet<ComponentKey>,
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self { entries: BTreeMap::new(), finalized: BTreeSet::new() }
    }
}

impl<C> Registry<C> {
    /// Stores a fresh slot for `(tag, name)`. Re-registration under an
    /// existing key fails; registering over a tombstone revives the key with
    /// a brand-new wrapper.
    pub fn register(
        &mut self,
        name: &str,
        tag: &'static str,
        component: C,
    ) -> Result<ComponentKey, LifecycleError> {
        let key = ComponentKey::new(name, tag);
        if self.entries.contains_key(&key) {
            return Err(LifecycleError::AlreadyRegistered(key.normalized.clone()));
        }
        self.finalized.remove(&key);
        let slot = Slot { name: name.to_string(), state: LifecycleState::Registered, component };
        self.entries.insert(key.clone(), slot);
        Ok(key)
    }

    /// First live key whose normalized name matches, in (name, tag) order.
    pub fn resolve(&self, name: &str) -> Option<ComponentKey> {
        let wanted = normalize_name(name);
        self.entries.keys().find(|key| key.normalized == wanted).cloned()
    }

    pub fn is_finalized(&self, key: &ComponentKey) -> bool {
        self.finalized.contains(key)
    }

    pub(crate) fn slot_mut(&mut self, key: &ComponentKey) -> Result<&mut Slot<C>, LifecycleError> {
        if self.finalized.contains(key) {
            return Err(LifecycleError::Finalized(key.normalized.clone()));
        }
        self.entries.get_mut(key).ok_or_else(|| LifecycleError::NotFound(key.normalized.clone()))
    }

    pub(crate) fn remove_finalized(&mut self, key: &ComponentKey) -> Option<Slot<C>> {
        let slot = self.entries.remove(key);
        if slot.is_some() {
            self.finalized.insert(key.clone());
        }
        slot
    }

    pub fn state(&self, key: &ComponentKey) -> Option<LifecycleState> {
        if self.finalized.contains(key) {
            return Some(LifecycleState::Finalized);
        }
        self.entries.get(key).map(|slot| slot.state)
    }

    pub fn keys(&self) -> Vec<ComponentKey> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Context handed to theme lifecycle hooks. Exposes only the eval boundary.
pub struct ScriptContext<'a> {
    bridge: &'a mut ScriptBridge,
}

impl<'a> ScriptContext<'a> {
    pub(crate) fn new(bridge: &'a mut ScriptBridge) -> Self {
        Self { bridge }
    }

    pub fn eval(&mut self, script: &str) -> Result<String> {
        self.bridge.eval(script)
    }
}

/// Context handed to extension hooks: eval plus the quoting, target
/// registration, and option serialization primitives.
pub struct ExtensionContext<'a> {
    bridge: &'a mut ScriptBridge,
}

impl<'a> ExtensionContext<'a> {
    pub(crate) fn new(bridge: &'a mut ScriptBridge) -> Self {
        Self { bridge }
    }

    pub fn eval(&mut self, script: &str) -> Result<String> {
        self.bridge.eval(script)
    }

    pub fn safe_string(&self, s: &str) -> String {
        safe_string(s)
    }

    pub fn register_target(&mut self, path: &str) -> Result<String> {
        self.bridge.register_target(path)
    }

    pub fn options_to_args(&self, options: &[(&str, OptionValue)]) -> String {
        options_to_args(options)
    }
}

/// A theme component. `type_tag` is the explicit discriminator that becomes
/// part of the registry key; every hook sees a fresh context per call.
pub trait Theme {
    fn type_tag(&self) -> &'static str;

    fn initialize(&mut self, _ctx: &mut ScriptContext<'_>) -> Result<()> {
        Ok(())
    }

    fn activate(&mut self, ctx: &mut ScriptContext<'_>) -> Result<()>;

    fn deactivate(&mut self, _ctx: &mut ScriptContext<'_>) -> Result<()> {
        Ok(())
    }

    fn finalize(&mut self, _ctx: &mut ScriptContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// An extension component: initialize-only lifecycle.
pub trait Extension {
    fn type_tag(&self) -> &'static str;

    fn initialize(&mut self, ctx: &mut ExtensionContext<'_>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_folds_case_and_whitespace() {
        assert_eq!(normalize_name("  My   THEME "), "my theme");
        assert_eq!(normalize_name("plain"), "plain");
    }

    #[test]
    fn keys_order_by_name_then_tag() {
        let mut registry: Registry<u8> = Registry::default();
        registry.register("alpha", "zeta", 0).expect("register");
        registry.register("alpha", "beta", 1).expect("register");
        let resolved = registry.resolve("ALPHA").expect("resolve");
        assert_eq!(resolved.tag(), "beta");
    }

    #[test]
    fn duplicate_key_is_rejected_but_other_tag_passes() {
        let mut registry: Registry<u8> = Registry::default();
        registry.register("pad", "builtin", 0).expect("register");
        let err = registry.register("  PAD ", "builtin", 1).expect_err("duplicate");
        assert_eq!(err, LifecycleError::AlreadyRegistered("pad".to_string()));
        registry.register("pad", "scripted", 2).expect("different tag is a new key");
    }

    #[test]
    fn transition_table_rejects_invalid_edges() {
        use LifecycleOp::*;
        use LifecycleState::*;
        assert_eq!(Registered.apply(Initialize, "t"), Ok(Initialized));
        assert_eq!(Initialized.apply(Activate, "t"), Ok(Activated));
        assert_eq!(Activated.apply(Deactivate, "t"), Ok(Initialized));
        assert_eq!(Initialized.apply(Finalize, "t"), Ok(Finalized));
        assert!(matches!(Registered.apply(Activate, "t"), Err(LifecycleError::NotInitialized(_))));
        assert!(matches!(Activated.apply(Activate, "t"), Err(LifecycleError::AlreadyActivated(_))));
        assert!(matches!(Initialized.apply(Deactivate, "t"), Err(LifecycleError::NotActivated(_))));
        assert!(matches!(Initialized.apply(Initialize, "t"), Err(LifecycleError::AlreadyInitialized(_))));
        assert!(matches!(Finalized.apply(Initialize, "t"), Err(LifecycleError::Finalized(_))));
    }

    #[test]
    fn tombstoned_key_reports_finalized_until_reregistered() {
        let mut registry: Registry<u8> = Registry::default();
        let key = registry.register("ghost", "builtin", 0).expect("register");
        registry.remove_finalized(&key);
        assert!(registry.is_finalized(&key));
        assert!(matches!(registry.slot_mut(&key), Err(LifecycleError::Finalized(_))));
        assert!(registry.resolve("ghost").is_none());

        registry.register("ghost", "builtin", 1).expect("revive with fresh wrapper");
        assert!(!registry.is_finalized(&key));
        assert_eq!(registry.state(&key), Some(LifecycleState::Registered));
    }
}
