//! Owned top-level context: one bridge, the two registry instantiations,
//! and the at-most-one active theme. Replaces what the original design kept
//! in process globals; every operation goes through `&mut Host` and the
//! single-caller contract is enforced by the bridge's owner-thread check
//! (the type is also `!Send`, so safe code cannot share it across threads).

use anyhow::Result;

use crate::bridge::ScriptBridge;
use crate::config::BridgeConfig;
use crate::dispatch::EventCallback;
use crate::error::LifecycleError;
use crate::lifecycle::{
    ComponentKey, Extension, ExtensionContext, LifecycleOp, LifecycleState, Registry,
    ScriptContext, Theme,
};

pub struct Host {
    bridge: ScriptBridge,
    themes: Registry<Box<dyn Theme>>,
    extensions: Registry<Box<dyn Extension>>,
    active_theme: Option<ComponentKey>,
}

impl Host {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            bridge: ScriptBridge::new(config),
            themes: Registry::default(),
            extensions: Registry::default(),
            active_theme: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(BridgeConfig::default())
    }

    pub fn eval(&mut self, script: &str) -> Result<String> {
        self.bridge.eval(script)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.bridge.last_error()
    }

    pub fn bridge(&self) -> &ScriptBridge {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut ScriptBridge {
        &mut self.bridge
    }

    pub fn bind_event(&mut self, target: &str, callback: EventCallback) -> u64 {
        self.bridge.bind_event(target, callback)
    }

    pub fn unbind_event(&mut self, id: u64) -> bool {
        self.bridge.unbind_event(id)
    }

    pub fn event_invocation(&self, id: u64, args: &[&str]) -> String {
        self.bridge.event_invocation(id, args)
    }

    pub fn active_theme(&self) -> Option<&ComponentKey> {
        self.active_theme.as_ref()
    }

    pub fn theme_state(&self, key: &ComponentKey) -> Option<LifecycleState> {
        self.themes.state(key)
    }

    pub fn extension_state(&self, key: &ComponentKey) -> Option<LifecycleState> {
        self.extensions.state(key)
    }

    pub fn register_theme(&mut self, name: &str, theme: Box<dyn Theme>) -> Result<ComponentKey> {
        let tag = theme.type_tag();
        let outcome = self.themes.register(name, tag, theme).map_err(anyhow::Error::from);
        self.note(&outcome);
        outcome
    }

    pub fn register_extension(
        &mut self,
        name: &str,
        extension: Box<dyn Extension>,
    ) -> Result<ComponentKey> {
        let tag = extension.type_tag();
        let outcome = self.extensions.register(name, tag, extension).map_err(anyhow::Error::from);
        self.note(&outcome);
        outcome
    }

    /// Runs the theme's initialize hook once; repeated calls are no-ops.
    pub fn initialize_theme(&mut self, key: &ComponentKey) -> Result<()> {
        let outcome = self.initialize_theme_inner(key);
        self.note(&outcome);
        outcome
    }

    fn initialize_theme_inner(&mut self, key: &ComponentKey) -> Result<()> {
        let slot = self.themes.slot_mut(key)?;
        let next = match slot.state.apply(LifecycleOp::Initialize, key.name()) {
            Ok(next) => next,
            Err(LifecycleError::AlreadyInitialized(_)) => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        let mut ctx = ScriptContext::new(&mut self.bridge);
        slot.component.initialize(&mut ctx)?;
        slot.state = next;
        Ok(())
    }

    /// Makes the named theme the sole active one. The currently active theme
    /// is deactivated first, best effort: its hook error is logged, never
    /// propagated, and the active slot is cleared regardless. Initialization
    /// runs if the target was never initialized. Only the owning thread may
    /// call this.
    pub fn activate_theme(&mut self, name: &str) -> Result<()> {
        let outcome = self.activate_theme_inner(name);
        self.note(&outcome);
        outcome
    }

    fn activate_theme_inner(&mut self, name: &str) -> Result<()> {
        if self.bridge.ensure_owner().is_err() {
            return Err(LifecycleError::NotActivated(name.trim().to_string()).into());
        }
        let Some(key) = self.themes.resolve(name) else {
            return Err(LifecycleError::NotFound(name.trim().to_string()).into());
        };

        if let Some(active) = self.active_theme.take() {
            if let Err(err) = self.run_deactivate(&active) {
                eprintln!("[theme:{}] implicit deactivate failed: {err:#}", active.name());
            }
        }

        {
            let slot = self.themes.slot_mut(&key)?;
            if slot.state == LifecycleState::Registered {
                let mut ctx = ScriptContext::new(&mut self.bridge);
                slot.component.initialize(&mut ctx)?;
                slot.state = LifecycleState::Initialized;
            }
        }

        let slot = self.themes.slot_mut(&key)?;
        let next = slot.state.apply(LifecycleOp::Activate, key.name()).map_err(anyhow::Error::from)?;
        let mut ctx = ScriptContext::new(&mut self.bridge);
        slot.component.activate(&mut ctx)?;
        slot.state = next;
        self.active_theme = Some(key);
        Ok(())
    }

    /// Deactivates the active theme. The active slot is cleared even when
    /// the hook fails; the hook error is still surfaced.
    pub fn deactivate_theme(&mut self, key: &ComponentKey) -> Result<()> {
        let outcome = self.deactivate_theme_inner(key);
        self.note(&outcome);
        outcome
    }

    fn deactivate_theme_inner(&mut self, key: &ComponentKey) -> Result<()> {
        if self.themes.is_finalized(key) {
            return Err(LifecycleError::Finalized(key.name().to_string()).into());
        }
        match self.themes.state(key) {
            None => return Err(LifecycleError::NotFound(key.name().to_string()).into()),
            Some(LifecycleState::Activated) => {}
            Some(_) => return Err(LifecycleError::NotActivated(key.name().to_string()).into()),
        }
        self.active_theme = None;
        self.run_deactivate(key)
    }

    fn run_deactivate(&mut self, key: &ComponentKey) -> Result<()> {
        let slot = self.themes.slot_mut(key)?;
        let mut ctx = ScriptContext::new(&mut self.bridge);
        let hook = slot.component.deactivate(&mut ctx);
        if slot.state == LifecycleState::Activated {
            slot.state = LifecycleState::Initialized;
        }
        hook
    }

    /// Finalizes the theme: hook runs at most once, the wrapper is removed
    /// whatever the hook returns, and a second call is a no-op success.
    pub fn finalize_theme(&mut self, key: &ComponentKey) -> Result<()> {
        let outcome = self.finalize_theme_inner(key);
        self.note(&outcome);
        outcome
    }

    fn finalize_theme_inner(&mut self, key: &ComponentKey) -> Result<()> {
        if self.themes.is_finalized(key) {
            return Ok(());
        }
        let hook = {
            let slot = self.themes.slot_mut(key)?;
            let mut ctx = ScriptContext::new(&mut self.bridge);
            slot.component.finalize(&mut ctx)
        };
        self.themes.remove_finalized(key);
        if self.active_theme.as_ref() == Some(key) {
            self.active_theme = None;
        }
        hook
    }

    /// Looks the extension up by normalized name and initializes it once.
    /// Only the owning thread may call this.
    pub fn initialize_extension(&mut self, name: &str) -> Result<ComponentKey> {
        let outcome = self.initialize_extension_inner(name);
        self.note(&outcome);
        outcome
    }

    fn initialize_extension_inner(&mut self, name: &str) -> Result<ComponentKey> {
        if self.bridge.ensure_owner().is_err() {
            return Err(LifecycleError::NotInitialized(name.trim().to_string()).into());
        }
        let Some(key) = self.extensions.resolve(name) else {
            return Err(LifecycleError::NotFound(name.trim().to_string()).into());
        };
        let slot = self.extensions.slot_mut(&key)?;
        match slot.state.apply(LifecycleOp::Initialize, key.name()) {
            Ok(next) => {
                let mut ctx = ExtensionContext::new(&mut self.bridge);
                slot.component.initialize(&mut ctx)?;
                slot.state = next;
                Ok(key)
            }
            Err(LifecycleError::AlreadyInitialized(_)) => Ok(key),
            Err(err) => Err(err.into()),
        }
    }

    /// Finalizes every remaining theme (best effort, logged) and then the
    /// bridge itself. Idempotent.
    pub fn finalize(&mut self) -> Result<()> {
        for key in self.themes.keys() {
            if let Err(err) = self.finalize_theme(&key) {
                eprintln!("[theme:{}] finalize failed: {err:#}", key.name());
            }
        }
        self.bridge.finalize()
    }

    fn note<T>(&mut self, outcome: &Result<T>) {
        if let Err(err) = outcome {
            self.bridge.record_error(format!("{err:#}"));
        }
    }
}
