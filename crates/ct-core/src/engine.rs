//! Engine entry point
//!
//! Wires a preference store to an orchestrator for one host surface. The
//! host constructs the engine explicitly and forwards its events; nothing is
//! created as a side effect of loading the crate.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::EngineConfig;
use crate::dom::{Dom, TimerId, TimerTask, Timers};
use crate::orchestrator::{Orchestrator, PassSummary};
use crate::settings::{SettingsPatch, SettingsRecord};
use crate::store::{PreferenceStore, SubscriptionId};

pub struct Engine<D: Dom, T: Timers> {
    store: PreferenceStore,
    orchestrator: Orchestrator<D, T>,
    /// Latest record delivered by the store subscription, not yet applied
    inbox: Rc<RefCell<Option<SettingsRecord>>>,
    subscription: Option<SubscriptionId>,
}

impl<D: Dom, T: Timers> Engine<D, T> {
    pub fn new(store: PreferenceStore, dom: D, timers: T, config: EngineConfig) -> Self {
        Self {
            store,
            orchestrator: Orchestrator::new(dom, timers, config),
            inbox: Rc::new(RefCell::new(None)),
            subscription: None,
        }
    }

    /// Load settings, subscribe to changes and run the first pass.
    ///
    /// Returns `None` while the document is not ready; the host calls again
    /// on its readiness event. Calling after a successful start is a no-op.
    pub fn start(&mut self) -> Option<PassSummary> {
        if self.orchestrator.is_started() {
            return None;
        }
        if !self.orchestrator.dom().is_ready() {
            log::debug!("document not ready; deferring start");
            return None;
        }

        let settings = self.store.get();
        let inbox = Rc::clone(&self.inbox);
        self.subscription = Some(self.store.subscribe(move |record| {
            *inbox.borrow_mut() = Some(record.clone());
        }));
        Some(self.orchestrator.start(settings))
    }

    pub fn is_started(&self) -> bool {
        self.orchestrator.is_started()
    }

    /// Backing storage changed, possibly from another surface.
    pub fn on_storage_changed(&mut self) -> Option<PassSummary> {
        self.store.notify_external_change();
        self.apply_pending_settings()
    }

    /// "Settings changed, re-read" message from the popup or background.
    pub fn on_settings_message(&mut self) -> Option<PassSummary> {
        self.on_storage_changed()
    }

    /// Local write from this surface.
    pub fn update_settings(&mut self, patch: SettingsPatch) -> Option<PassSummary> {
        self.store.set(patch);
        self.apply_pending_settings()
    }

    pub fn on_navigate_finished(&mut self) {
        self.orchestrator.on_navigate_finished();
    }

    pub fn on_mutations(&mut self) {
        self.orchestrator.on_mutations();
    }

    pub fn on_timer(&mut self, id: TimerId, task: TimerTask) {
        self.orchestrator.on_timer(id, task);
    }

    pub fn on_command_feedback(&self, command: &str, value: bool) {
        self.orchestrator.on_command_feedback(command, value);
    }

    /// Stop listening to the store. The document is left as is.
    pub fn stop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.store.unsubscribe(id);
        }
    }

    pub fn store_mut(&mut self) -> &mut PreferenceStore {
        &mut self.store
    }

    pub fn orchestrator(&self) -> &Orchestrator<D, T> {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator<D, T> {
        &mut self.orchestrator
    }

    /// Apply a record the store delivered since the last call, if any.
    ///
    /// Hosts that write through `store_mut()` call this afterwards.
    pub fn apply_pending_settings(&mut self) -> Option<PassSummary> {
        let record = self.inbox.borrow_mut().take()?;
        self.orchestrator.on_settings_changed(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ManualTimers, MemoryDom};
    use crate::store::{MemoryBackend, SETTINGS_KEY};

    fn engine(location: &str, stored: Option<&str>) -> Engine<MemoryDom, ManualTimers> {
        let backend = match stored {
            Some(text) => MemoryBackend::with_entry(SETTINGS_KEY, text),
            None => MemoryBackend::new(),
        };
        Engine::new(
            PreferenceStore::new(vec![Box::new(backend)]),
            MemoryDom::new(location),
            ManualTimers::new(),
            EngineConfig::default(),
        )
    }

    #[test]
    fn test_start_waits_for_ready_document() {
        let mut engine = engine("/", None);
        engine.orchestrator_mut().dom_mut().set_ready(false);
        assert!(engine.start().is_none());
        assert!(!engine.is_started());

        engine.orchestrator_mut().dom_mut().set_ready(true);
        let summary = engine.start().unwrap();
        assert!(summary.overlay_mounted);
        assert!(engine.start().is_none());
    }

    #[test]
    fn test_start_uses_stored_settings() {
        let mut engine = engine("/", Some(r#"{"schemaVersion":2,"enabled":false}"#));
        let summary = engine.start().unwrap();
        assert!(!summary.overlay_mounted);
    }

    #[test]
    fn test_local_update_reapplies() {
        let mut engine = engine("/", None);
        engine.start();
        let summary = engine.update_settings(SettingsPatch::enabled(false)).unwrap();
        assert!(!summary.overlay_mounted);
        assert!(summary.applied.is_empty());
    }

    #[test]
    fn test_external_change_reapplies() {
        let mut engine = engine("/", None);
        engine.start();
        engine.orchestrator_mut().dom_mut().set_location("/watch");
        let summary = engine.on_settings_message().unwrap();
        assert!(!summary.overlay_mounted);
        assert_eq!(summary.category, crate::types::PageCategory::Watch);
    }

    #[test]
    fn test_stop_ignores_later_changes() {
        let mut engine = engine("/", None);
        engine.start();
        engine.stop();
        assert!(engine.update_settings(SettingsPatch::enabled(false)).is_none());
        assert!(engine.orchestrator().is_overlay_mounted());
    }
}
