//! WebAssembly bindings for CalmTube

mod host;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use ct_core::{
    classify, is_available, run_command as run_store_command, Command, Engine, EngineConfig,
    FeatureId, PageCategory, PreferenceStore, SettingsPatch, StorageBackend, TimerId, TimerTask,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{MutationObserver, MutationObserverInit, Window};

pub use host::{ExtensionStorageBackend, WebDom, WebStorageBackend, WebTimers};

/// Host custom event fired when a single-page navigation finished.
const NAVIGATE_FINISH_EVENT: &str = "yt-navigate-finish";

type ContentEngine = Engine<WebDom, WebTimers>;

/// Registered extension storage area.
struct StorageArea {
    name: &'static str,
    snapshot: Rc<RefCell<HashMap<String, String>>>,
    persist: js_sys::Function,
}

thread_local! {
    static AREAS: RefCell<Vec<StorageArea>> = const { RefCell::new(Vec::new()) };
    static ENGINE: RefCell<Option<ContentEngine>> = const { RefCell::new(None) };
    // Popup, options and background surfaces have no engine, only a store
    static STORE: RefCell<Option<PreferenceStore>> = const { RefCell::new(None) };
}

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("No window in this context"))
}

/// Registered extension areas in order, or web storage when none were
/// registered (pages loaded outside an extension).
fn web_store(window: &Window) -> PreferenceStore {
    let mut backends: Vec<Box<dyn StorageBackend>> = AREAS.with(|areas| {
        areas
            .borrow()
            .iter()
            .map(|area| {
                Box::new(ExtensionStorageBackend::new(
                    area.name,
                    Rc::clone(&area.snapshot),
                    area.persist.clone(),
                )) as Box<dyn StorageBackend>
            })
            .collect()
    });
    if backends.is_empty() {
        backends.push(Box::new(WebStorageBackend::local(window)));
        backends.push(Box::new(WebStorageBackend::session(window)));
    }
    PreferenceStore::new(backends)
}

fn with_engine<R>(f: impl FnOnce(&mut ContentEngine) -> R) -> Option<R> {
    ENGINE.with(|cell| cell.borrow_mut().as_mut().map(f))
}

/// Run against the engine's store on a content surface, the standalone
/// store elsewhere. Local writes are applied to the page right away.
fn with_store<R>(f: impl FnOnce(&mut PreferenceStore) -> R) -> Result<R, JsValue> {
    if ENGINE.with(|cell| cell.borrow().is_some()) {
        return with_engine(|engine| {
            let result = f(engine.store_mut());
            engine.apply_pending_settings();
            result
        })
        .ok_or_else(|| JsValue::from_str("Engine unavailable"));
    }
    let window = window()?;
    Ok(STORE.with(|cell| {
        let mut slot = cell.borrow_mut();
        f(slot.get_or_insert_with(|| web_store(&window)))
    }))
}

pub(crate) fn dispatch_timer(id: TimerId, task: TimerTask) {
    with_engine(|engine| {
        engine.orchestrator_mut().timers_mut().forget(id);
        engine.on_timer(id, task);
    });
}

fn listen(target: &web_sys::EventTarget, event: &str, handler: impl FnMut() + 'static) -> Result<(), JsValue> {
    let closure = Closure::<dyn FnMut()>::new(handler);
    target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
    // Listeners live as long as the page
    closure.forget();
    Ok(())
}

// =============================================================================
// Storage areas
// =============================================================================

/// Register an extension storage area ("sync" or "local"). Areas are tried
/// in registration order; register the primary first, before any store is
/// built. `persist(key, value)` writes through to the extension storage and
/// must not call back into this module synchronously.
#[wasm_bindgen]
pub fn register_storage_area(area: &str, persist: js_sys::Function) -> Result<(), JsValue> {
    let name = match area {
        "sync" => "chrome.storage.sync",
        "local" => "chrome.storage.local",
        other => return Err(JsValue::from_str(&format!("Unknown storage area: {}", other))),
    };
    AREAS.with(|areas| {
        let mut areas = areas.borrow_mut();
        if areas.iter().any(|a| a.name == name) {
            return Err(JsValue::from_str(&format!("Storage area already registered: {}", area)));
        }
        areas.push(StorageArea {
            name,
            snapshot: Rc::new(RefCell::new(HashMap::new())),
            persist,
        });
        Ok(())
    })
}

/// Mirror a stored value into wasm: initial hydration and every change
/// event of the area. Notifies the running engine or store.
#[wasm_bindgen]
pub fn hydrate_storage(area: &str, key: &str, value: Option<String>) {
    let known = AREAS.with(|areas| {
        let areas = areas.borrow();
        let Some(entry) = areas.iter().find(|a| a.name.ends_with(area)) else {
            return false;
        };
        let mut snapshot = entry.snapshot.borrow_mut();
        match value {
            Some(value) => snapshot.insert(key.to_string(), value),
            None => snapshot.remove(key),
        };
        true
    });
    if !known {
        log::warn!("hydrate for unregistered storage area '{}'", area);
        return;
    }

    if with_engine(|engine| engine.on_storage_changed()).is_none() {
        STORE.with(|cell| {
            if let Some(store) = cell.borrow_mut().as_mut() {
                store.notify_external_change();
            }
        });
    }
}

// =============================================================================
// Content surface
// =============================================================================

/// Build the engine for this page and start it as soon as the document is
/// ready. `config_json` optionally overrides engine tunables.
#[wasm_bindgen]
pub fn start_content_engine(config_json: Option<String>) -> Result<(), JsValue> {
    if ENGINE.with(|cell| cell.borrow().is_some()) {
        return Err(JsValue::from_str("Already started. Reload the page to restart."));
    }

    let config = match config_json {
        Some(text) => EngineConfig::from_json(&text)
            .map_err(|e| JsValue::from_str(&format!("Invalid engine config: {}", e)))?,
        None => EngineConfig::default(),
    };

    let window = window()?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("No document in this context"))?;

    let engine = Engine::new(
        web_store(&window),
        WebDom::new(document.clone()),
        WebTimers::new(window.clone()),
        config,
    );
    ENGINE.with(|cell| *cell.borrow_mut() = Some(engine));

    // Mutation batches: navigation watch and late regions
    let on_mutations = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
        |_records: js_sys::Array, _observer: MutationObserver| {
            with_engine(|engine| engine.on_mutations());
        },
    );
    let observer = MutationObserver::new(on_mutations.as_ref().unchecked_ref())?;
    on_mutations.forget();
    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_subtree(true);
    let root = document
        .document_element()
        .ok_or_else(|| JsValue::from_str("Document has no root element"))?;
    observer.observe_with_options(&root, &init)?;

    listen(&document, NAVIGATE_FINISH_EVENT, || {
        with_engine(|engine| engine.on_navigate_finished());
    })?;
    // Fired for writes made by other surfaces sharing this storage
    listen(&window, "storage", || {
        with_engine(|engine| engine.on_storage_changed());
    })?;

    let started = with_engine(|engine| engine.start().is_some()).unwrap_or(false);
    if !started {
        listen(&document, "DOMContentLoaded", || {
            with_engine(|engine| engine.start());
        })?;
    }
    Ok(())
}

#[wasm_bindgen]
pub fn is_engine_started() -> bool {
    with_engine(|engine| engine.is_started()).unwrap_or(false)
}

/// "Settings changed" message from another surface.
#[wasm_bindgen]
pub fn notify_settings_changed() {
    with_engine(|engine| engine.on_settings_message());
}

/// Command feedback from the background context.
#[wasm_bindgen]
pub fn notify_command(name: &str, value: bool) {
    with_engine(|engine| engine.on_command_feedback(name, value));
}

// =============================================================================
// Settings surface
// =============================================================================

#[wasm_bindgen]
pub fn get_settings() -> Result<String, JsValue> {
    with_store(|store| store.get().to_json_pretty())
}

/// Shallow-merge a JSON patch into the stored settings.
#[wasm_bindgen]
pub fn set_settings(patch_json: &str) -> Result<(), JsValue> {
    let patch: SettingsPatch = serde_json::from_str(patch_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid settings patch: {}", e)))?;
    with_store(|store| store.set(patch))
}

#[wasm_bindgen]
pub fn export_settings() -> Result<String, JsValue> {
    with_store(|store| store.export_to())
}

/// Replace settings from a backup. Rejects with a readable reason and
/// leaves the stored record untouched on failure.
#[wasm_bindgen]
pub fn import_settings(text: &str) -> Result<(), JsValue> {
    with_store(|store| store.import_from(text))?
        .map_err(|e| JsValue::from_str(&format!("Import failed: {}", e)))
}

#[wasm_bindgen]
pub fn reset_settings() -> Result<(), JsValue> {
    with_store(|store| store.reset())
}

/// Run a keyboard command. Returns `{command, value}` for feedback.
#[wasm_bindgen]
pub fn run_command(name: &str) -> Result<JsValue, JsValue> {
    let command = Command::from_name(name)
        .map_err(|e| JsValue::from_str(&format!("Unknown command: {}", e)))?;
    let outcome = with_store(|store| run_store_command(store, command))?;

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"command".into(), &JsValue::from_str(outcome.command.name()));
    let _ = js_sys::Reflect::set(&result, &"value".into(), &JsValue::from(outcome.value));
    Ok(result.into())
}

// =============================================================================
// Pure helpers
// =============================================================================

#[wasm_bindgen]
pub fn classify_location(location: &str) -> String {
    classify(location).as_str().to_string()
}

#[wasm_bindgen]
pub fn is_feature_available(feature: &str, category: &str) -> bool {
    match (FeatureId::from_name(feature), PageCategory::from_name(category)) {
        (Some(feature), Some(category)) => is_available(feature, category),
        _ => false,
    }
}
