//! Orchestrator
//!
//! Combines the current settings snapshot with the page category and drives
//! every feature controller plus the overlay. All entry points are ordinary
//! callbacks on the host's single thread, so passes never overlap; they are
//! not coalesced either.

use crate::catalog::{self, OVERLAY_FEATURE, OVERLAY_STYLE_ID};
use crate::classify::classify;
use crate::config::EngineConfig;
use crate::controller::FeatureController;
use crate::dom::{Dom, OverlayView, TimerId, TimerTask, Timers};
use crate::settings::SettingsRecord;
use crate::types::{FeatureId, PageCategory};

/// Outcome of one apply pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub category: PageCategory,
    pub overlay_mounted: bool,
    /// Features in the Applied state after the pass
    pub applied: Vec<FeatureId>,
}

pub struct Orchestrator<D: Dom, T: Timers> {
    dom: D,
    timers: T,
    config: EngineConfig,
    settings: Option<SettingsRecord>,
    /// Category of the last apply pass
    category: PageCategory,
    /// Last classification seen by the navigation watch
    last_seen: PageCategory,
    /// Indexed by `FeatureId::index()`
    controllers: Vec<FeatureController>,
    overlay: Option<OverlayView>,
    /// Whether the page-level hide rules of the mounted overlay are in place
    overlay_styled: bool,
    started: bool,
}

impl<D: Dom, T: Timers> Orchestrator<D, T> {
    pub fn new(dom: D, timers: T, config: EngineConfig) -> Self {
        let controllers = FeatureId::ALL
            .into_iter()
            .map(|feature| FeatureController::new(catalog::spec_for(feature), config.retry))
            .collect();
        Self {
            dom,
            timers,
            config,
            settings: None,
            category: PageCategory::Other,
            last_seen: PageCategory::Other,
            controllers,
            overlay: None,
            overlay_styled: false,
            started: false,
        }
    }

    /// Take the first settings snapshot and run the initial pass.
    pub fn start(&mut self, settings: SettingsRecord) -> PassSummary {
        self.settings = Some(settings);
        self.started = true;
        log::info!("engine started on {}", self.dom.location());
        self.apply_pass()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// A new settings snapshot arrived from the store.
    pub fn on_settings_changed(&mut self, settings: SettingsRecord) -> Option<PassSummary> {
        let previous = self.settings.as_ref().map(|s| s.enabled);
        if previous.is_some_and(|enabled| enabled != settings.enabled) {
            log::info!(
                "master switch {}",
                if settings.enabled { "on" } else { "off" }
            );
        }
        self.settings = Some(settings);
        if !self.started {
            return None;
        }
        Some(self.apply_pass())
    }

    /// Host "navigation finished" event.
    pub fn on_navigate_finished(&mut self) {
        self.last_seen = classify(&self.dom.location());
        self.schedule_navigation_pass();
    }

    /// A batch of document mutations was observed.
    ///
    /// Re-classifies and schedules a pass only when the category changed,
    /// then lets applied controllers hide freshly inserted regions.
    pub fn on_mutations(&mut self) {
        if !self.started {
            return;
        }
        let category = classify(&self.dom.location());
        if category != self.last_seen {
            log::debug!("navigation detected: {} -> {}", self.last_seen, category);
            self.last_seen = category;
            self.schedule_navigation_pass();
        }
        for controller in self.controllers.iter_mut() {
            controller.rescan(&mut self.dom);
        }
    }

    /// A timer scheduled through `Timers` fired.
    pub fn on_timer(&mut self, id: TimerId, task: TimerTask) {
        match task {
            TimerTask::Retry(feature) => {
                let controller = &mut self.controllers[feature.index()];
                controller.on_retry(id, &mut self.dom, &mut self.timers);
            }
            TimerTask::Navigation => {
                if self.started {
                    self.apply_pass();
                }
            }
        }
    }

    /// Acknowledgement of a keyboard command run elsewhere.
    pub fn on_command_feedback(&self, command: &str, value: bool) {
        log::info!("command '{}' -> {}", command, value);
    }

    /// Re-classify and bring every controller and the overlay in line with
    /// the effective settings.
    pub fn apply_pass(&mut self) -> PassSummary {
        let category = classify(&self.dom.location());
        self.category = category;
        self.last_seen = category;

        let Some(settings) = &self.settings else {
            return self.summary();
        };
        let effective = settings.effective(category);
        let view = OverlayView {
            message: settings.custom_message.clone(),
            reduced_motion: settings.reduced_motion,
        };

        let overlay_wanted =
            effective.is_active(OVERLAY_FEATURE) && catalog::is_available(OVERLAY_FEATURE, category);
        if overlay_wanted {
            self.mount_overlay(view);
        } else {
            self.unmount_overlay();
        }

        for controller in self.controllers.iter_mut() {
            let feature = controller.feature();
            let wanted = effective.is_active(feature) && catalog::is_available(feature, category);
            if wanted {
                controller.enable(&mut self.dom, &mut self.timers);
            } else {
                controller.disable(&mut self.dom, &mut self.timers);
            }
        }

        let summary = self.summary();
        log::debug!(
            "pass on {}: overlay={} applied={:?}",
            summary.category,
            summary.overlay_mounted,
            summary.applied
        );
        summary
    }

    fn schedule_navigation_pass(&mut self) {
        self.timers
            .schedule(self.config.navigation_debounce, TimerTask::Navigation);
    }

    fn mount_overlay(&mut self, view: OverlayView) {
        if self.overlay.as_ref() == Some(&view) {
            if !self.overlay_styled {
                self.insert_overlay_style();
            }
            return;
        }
        // A changed view is remounted
        self.unmount_overlay();
        if let Err(e) = self.dom.mount_overlay(&view) {
            log::warn!("overlay mount failed: {}", e);
            return;
        }
        log::info!("overlay mounted");
        self.overlay = Some(view);
        self.insert_overlay_style();
    }

    /// Surface first, then the page-level hide rules.
    fn insert_overlay_style(&mut self) {
        match self.dom.insert_style(OVERLAY_STYLE_ID, &catalog::overlay_hide_css()) {
            Ok(()) => self.overlay_styled = true,
            Err(e) => log::warn!("overlay hide rules failed: {}", e),
        }
    }

    /// Hide rules first, then the surface.
    fn unmount_overlay(&mut self) {
        if self.overlay.take().is_none() {
            return;
        }
        if let Err(e) = self.dom.remove_style(OVERLAY_STYLE_ID) {
            log::warn!("overlay hide rules removal failed: {}", e);
        }
        self.overlay_styled = false;
        if let Err(e) = self.dom.unmount_overlay() {
            log::warn!("overlay unmount failed: {}", e);
        }
        log::info!("overlay unmounted");
    }

    fn summary(&self) -> PassSummary {
        PassSummary {
            category: self.category,
            overlay_mounted: self.overlay.is_some(),
            applied: self
                .controllers
                .iter()
                .filter(|c| c.is_applied())
                .map(|c| c.feature())
                .collect(),
        }
    }

    pub fn category(&self) -> PageCategory {
        self.category
    }

    pub fn settings(&self) -> Option<&SettingsRecord> {
        self.settings.as_ref()
    }

    pub fn is_overlay_mounted(&self) -> bool {
        self.overlay.is_some()
    }

    pub fn controller(&self, feature: FeatureId) -> &FeatureController {
        &self.controllers[feature.index()]
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut D {
        &mut self.dom
    }

    pub fn timers_mut(&mut self) -> &mut T {
        &mut self.timers
    }
}
