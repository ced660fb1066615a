//! End-to-end scenarios against the in-memory host.

use ct_core::catalog::OVERLAY_STYLE_ID;
use ct_core::memory::{ManualTimers, MemoryDom};
use ct_core::store::{MemoryBackend, SETTINGS_KEY};
use ct_core::{
    Engine, EngineConfig, FeatureId, PageCategory, PreferenceStore, SettingsPatch, TimerTask,
};

type TestEngine = Engine<MemoryDom, ManualTimers>;

fn engine_at(location: &str, stored: &str) -> TestEngine {
    let store = PreferenceStore::new(vec![Box::new(MemoryBackend::with_entry(SETTINGS_KEY, stored))]);
    Engine::new(store, MemoryDom::new(location), ManualTimers::new(), EngineConfig::default())
}

fn run_timers(engine: &mut TestEngine) {
    while let Some((id, task)) = engine.orchestrator_mut().timers_mut().fire_next() {
        engine.on_timer(id, task);
    }
}

#[test]
fn home_overlay_then_navigate_to_watch() {
    let stored = r#"{
        "schemaVersion": 2,
        "enabled": true,
        "features": {
            "hideHomeFeed": true,
            "hideSidebar": true,
            "hideComments": false,
            "hideEndCards": true
        }
    }"#;
    let mut engine = engine_at("https://www.example.com/", stored);

    let summary = engine.start().unwrap();
    assert_eq!(summary.category, PageCategory::Home);
    assert!(summary.overlay_mounted);
    let dom = engine.orchestrator().dom();
    assert!(dom.overlay().is_some());
    assert!(dom.style(OVERLAY_STYLE_ID).unwrap().contains("ytd-page-manager"));
    run_timers(&mut engine);

    // Single-page navigation: the host swaps the URL and renders the watch page
    {
        let dom = engine.orchestrator_mut().dom_mut();
        dom.set_location("https://www.example.com/watch?v=abc123");
        dom.add_region("#secondary");
        dom.add_region("#comments");
    }
    engine.on_mutations();
    assert!(engine.orchestrator().is_overlay_mounted());

    let (id, task) = engine.orchestrator_mut().timers_mut().fire_next().unwrap();
    assert_eq!(task, TimerTask::Navigation);
    engine.on_timer(id, task);

    let orch = engine.orchestrator();
    assert_eq!(orch.category(), PageCategory::Watch);
    assert!(!orch.is_overlay_mounted());
    assert!(orch.dom().overlay().is_none());
    assert!(orch.dom().style(OVERLAY_STYLE_ID).is_none());
    assert!(orch.controller(FeatureId::HideSidebar).is_applied());
    assert!(!orch.controller(FeatureId::HideComments).is_applied());
    assert!(orch.controller(FeatureId::HideEndCards).is_applied());

    let hidden: Vec<_> = orch
        .dom()
        .regions()
        .filter(|(_, by)| by.is_some())
        .map(|(selector, _)| selector)
        .collect();
    assert_eq!(hidden, vec!["#secondary"]);

    // The end screen renders late; the retry loop picks it up
    engine
        .orchestrator_mut()
        .dom_mut()
        .add_region(".ytp-endscreen-content");
    run_timers(&mut engine);
    assert_eq!(engine.orchestrator().dom().hidden_count(), 2);
    assert_eq!(engine.orchestrator_mut().timers_mut().pending(), 0);
}

#[test]
fn toggling_master_switch_restores_page() {
    let mut engine = engine_at("/watch", r#"{"schemaVersion": 2, "features": {"hideSidebar": true}}"#);
    let sidebar = engine.orchestrator_mut().dom_mut().add_region("#related");
    engine.start();
    assert!(engine.orchestrator().dom().is_hidden(sidebar));

    engine.update_settings(SettingsPatch::enabled(false));
    assert!(!engine.orchestrator().dom().is_hidden(sidebar));
    assert_eq!(engine.orchestrator_mut().timers_mut().pending(), 0);

    engine.update_settings(SettingsPatch::enabled(true));
    assert!(engine.orchestrator().dom().is_hidden(sidebar));
}

#[test]
fn import_round_trip_preserves_effective_settings() {
    let mut engine = engine_at("/", r#"{"schemaVersion": 1, "customMessage": "breathe"}"#);
    engine.start();

    let store = engine.store_mut();
    let before = store.get();
    let exported = store.export_to();
    store.import_from(&exported).unwrap();
    let after = store.get();

    for category in PageCategory::ALL {
        assert_eq!(before.effective(category), after.effective(category));
    }
    assert_eq!(after.custom_message, "breathe");
}
