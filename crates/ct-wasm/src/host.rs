//! Browser implementations of the engine's host traits.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use ct_core::store::{StorageBackend, StorageError};
use ct_core::{Dom, DomError, FeatureId, OverlayView, TimerId, TimerTask, Timers};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, ShadowRootInit, ShadowRootMode, Storage, Window};

/// Attribute carrying the feature that hid an element.
pub const HIDDEN_ATTR: &str = "data-calmtube-hidden";
/// Id of the element hosting the overlay's shadow root.
pub const OVERLAY_HOST_ID: &str = "calmtube-overlay";

fn script_error(value: JsValue) -> DomError {
    DomError::Script(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
}

// =============================================================================
// Document
// =============================================================================

pub struct WebDom {
    document: Document,
    overlay_host: Option<Element>,
}

impl WebDom {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            overlay_host: None,
        }
    }

    fn root(&self) -> Result<Element, DomError> {
        self.document.document_element().ok_or(DomError::Detached)
    }
}

impl Dom for WebDom {
    type Node = Element;

    fn is_ready(&self) -> bool {
        self.document.document_element().is_some() && self.document.body().is_some()
    }

    fn location(&self) -> String {
        self.document
            .location()
            .and_then(|location| location.href().ok())
            .unwrap_or_default()
    }

    fn query_all(&self, selector: &str) -> Result<Vec<Element>, DomError> {
        let list = self
            .document
            .query_selector_all(selector)
            .map_err(|_| DomError::InvalidSelector(selector.to_string()))?;
        let mut nodes = Vec::with_capacity(list.length() as usize);
        for i in 0..list.length() {
            if let Some(element) = list.item(i).and_then(|node| node.dyn_into::<Element>().ok()) {
                nodes.push(element);
            }
        }
        Ok(nodes)
    }

    fn hidden_by(&self, node: &Element) -> Option<FeatureId> {
        node.get_attribute(HIDDEN_ATTR)
            .and_then(|value| FeatureId::from_name(&value))
    }

    fn hide(&mut self, node: &Element, feature: FeatureId) -> Result<(), DomError> {
        node.set_attribute(HIDDEN_ATTR, feature.as_str())
            .map_err(script_error)?;
        if let Some(element) = node.dyn_ref::<HtmlElement>() {
            element
                .style()
                .set_property_with_priority("display", "none", "important")
                .map_err(script_error)?;
        }
        Ok(())
    }

    fn reveal(&mut self, node: &Element) -> Result<(), DomError> {
        node.remove_attribute(HIDDEN_ATTR).map_err(script_error)?;
        if let Some(element) = node.dyn_ref::<HtmlElement>() {
            element
                .style()
                .remove_property("display")
                .map_err(script_error)?;
        }
        Ok(())
    }

    fn insert_style(&mut self, id: &str, css: &str) -> Result<(), DomError> {
        let style = match self.document.get_element_by_id(id) {
            Some(existing) => existing,
            None => {
                let created = self.document.create_element("style").map_err(script_error)?;
                created.set_id(id);
                // <head> may not exist yet at document_start
                self.root()?.append_child(&created).map_err(script_error)?;
                created
            }
        };
        style.set_text_content(Some(css));
        Ok(())
    }

    fn remove_style(&mut self, id: &str) -> Result<(), DomError> {
        if let Some(style) = self.document.get_element_by_id(id) {
            style.remove();
        }
        Ok(())
    }

    fn mount_overlay(&mut self, view: &OverlayView) -> Result<(), DomError> {
        if self.overlay_host.is_some() {
            self.unmount_overlay()?;
        }
        let host = self.document.create_element("div").map_err(script_error)?;
        host.set_id(OVERLAY_HOST_ID);
        let shadow = host
            .attach_shadow(&ShadowRootInit::new(ShadowRootMode::Closed))
            .map_err(script_error)?;
        shadow.set_inner_html(&overlay_markup(view));
        // Anchored at the root, outside the host app's own containers
        self.root()?.append_child(&host).map_err(script_error)?;
        self.overlay_host = Some(host);
        Ok(())
    }

    fn unmount_overlay(&mut self) -> Result<(), DomError> {
        if let Some(host) = self.overlay_host.take() {
            host.remove();
        }
        Ok(())
    }
}

/// Shadow-root content of the overlay.
pub fn overlay_markup(view: &OverlayView) -> String {
    let animation = if view.reduced_motion {
        ""
    } else {
        "animation: calmtube-fade 240ms ease-out;"
    };
    format!(
        "<style>\
         :host {{ all: initial; position: fixed; inset: 0; z-index: 2147483646; }}\
         .panel {{ display: flex; align-items: center; justify-content: center; height: 100%; \
         background: #0f0f0f; color: #f1f1f1; font: 500 24px/1.4 system-ui, sans-serif; {animation} }}\
         @keyframes calmtube-fade {{ from {{ opacity: 0; }} to {{ opacity: 1; }} }}\
         </style>\
         <div class=\"panel\"><p>{}</p></div>",
        escape_html(&view.message)
    )
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// =============================================================================
// Timers
// =============================================================================

/// `setTimeout`-backed timers that call back into the running engine.
pub struct WebTimers {
    window: Window,
    next_id: u32,
    handles: HashMap<TimerId, i32>,
}

impl WebTimers {
    pub fn new(window: Window) -> Self {
        Self {
            window,
            next_id: 0,
            handles: HashMap::new(),
        }
    }

    /// Drop the browser handle of a timer that fired.
    pub fn forget(&mut self, id: TimerId) {
        self.handles.remove(&id);
    }
}

impl Timers for WebTimers {
    fn schedule(&mut self, delay: Duration, task: TimerTask) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let callback = Closure::once_into_js(move || crate::dispatch_timer(id, task));
        let delay_ms = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay_ms)
        {
            Ok(handle) => {
                self.handles.insert(id, handle);
            }
            Err(e) => log::warn!("setTimeout failed for {:?}: {:?}", task, e),
        }
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(handle) = self.handles.remove(&id) {
            self.window.clear_timeout_with_handle(handle);
        }
    }
}

// =============================================================================
// Storage
// =============================================================================

/// `localStorage` / `sessionStorage` backend.
pub struct WebStorageBackend {
    name: &'static str,
    storage: Option<Storage>,
}

impl WebStorageBackend {
    pub fn local(window: &Window) -> Self {
        Self {
            name: "localStorage",
            storage: window.local_storage().ok().flatten(),
        }
    }

    pub fn session(window: &Window) -> Self {
        Self {
            name: "sessionStorage",
            storage: window.session_storage().ok().flatten(),
        }
    }

    fn storage(&self) -> Result<&Storage, StorageError> {
        self.storage
            .as_ref()
            .ok_or_else(|| StorageError::Unavailable(format!("{} is not accessible", self.name)))
    }
}

impl StorageBackend for WebStorageBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage()?.get_item(key).map_err(storage_error)
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage()?.set_item(key, value).map_err(storage_error)
    }
}

/// Extension storage area mirrored into wasm.
///
/// The JS side hydrates the snapshot from the extension's async storage and
/// keeps it current from its change events; writes go out through the
/// `persist(key, value)` function, which throws when the area is unusable.
pub struct ExtensionStorageBackend {
    name: &'static str,
    snapshot: Rc<RefCell<HashMap<String, String>>>,
    persist: js_sys::Function,
}

impl ExtensionStorageBackend {
    pub fn new(
        name: &'static str,
        snapshot: Rc<RefCell<HashMap<String, String>>>,
        persist: js_sys::Function,
    ) -> Self {
        Self {
            name,
            snapshot,
            persist,
        }
    }
}

impl StorageBackend for ExtensionStorageBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.snapshot.borrow().get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.persist
            .call2(&JsValue::NULL, &JsValue::from_str(key), &JsValue::from_str(value))
            .map_err(storage_error)?;
        self.snapshot
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn storage_error(value: JsValue) -> StorageError {
    let name = js_sys::Reflect::get(&value, &"name".into())
        .ok()
        .and_then(|name| name.as_string())
        .unwrap_or_default();
    if name == "QuotaExceededError" {
        StorageError::QuotaExceeded
    } else {
        StorageError::Unavailable(format!("{:?}", value))
    }
}
