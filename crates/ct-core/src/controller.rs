//! Feature controller
//!
//! One generic two-state machine per feature-id, configured by the feature's
//! catalog entry. `Applied` means the hide effect is wanted; whether any
//! region currently exists in the document is a separate question answered
//! by retries and the standing watch.

use std::time::Duration;

use serde::Deserialize;

use crate::catalog::RegionSpec;
use crate::dom::{Dom, TimerId, TimerTask, Timers};
use crate::types::FeatureId;

/// Bounded lookup retry for regions that are not rendered yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Total lookup attempts, including the first one; 0 counts as 1
    pub max_attempts: u32,
    #[serde(rename = "intervalMs", with = "crate::config::millis")]
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Disabled,
    Applied,
}

/// Runtime state of one feature.
#[derive(Debug)]
pub struct FeatureController {
    spec: &'static RegionSpec,
    policy: RetryPolicy,
    state: ControllerState,
    attempts: u32,
    pending_retry: Option<TimerId>,
    watching: bool,
}

impl FeatureController {
    pub fn new(spec: &'static RegionSpec, policy: RetryPolicy) -> Self {
        Self {
            spec,
            policy: RetryPolicy {
                max_attempts: policy.max_attempts.max(1),
                ..policy
            },
            state: ControllerState::Disabled,
            attempts: 0,
            pending_retry: None,
            watching: false,
        }
    }

    pub fn feature(&self) -> FeatureId {
        self.spec.feature
    }

    pub fn is_applied(&self) -> bool {
        self.state == ControllerState::Applied
    }

    /// Lookup attempts made by the current `enable`.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the standing watch re-applies on inserted regions.
    pub fn is_watching(&self) -> bool {
        self.watching
    }

    pub fn enable<D: Dom, T: Timers>(&mut self, dom: &mut D, timers: &mut T) {
        if self.is_applied() {
            return;
        }
        self.state = ControllerState::Applied;
        self.attempts = 0;
        log::debug!("{}: applied", self.feature());

        if self.spec.is_degenerate() {
            return;
        }
        self.attempt(dom, timers);
    }

    pub fn disable<D: Dom, T: Timers>(&mut self, dom: &mut D, timers: &mut T) {
        if !self.is_applied() {
            return;
        }
        self.state = ControllerState::Disabled;
        self.watching = false;
        if let Some(id) = self.pending_retry.take() {
            timers.cancel(id);
        }
        log::debug!("{}: disabled", self.feature());

        if self.spec.is_degenerate() {
            return;
        }
        self.reveal_all(dom);
    }

    /// Timer callback for a scheduled retry.
    pub fn on_retry<D: Dom, T: Timers>(&mut self, id: TimerId, dom: &mut D, timers: &mut T) {
        if self.pending_retry != Some(id) {
            return;
        }
        self.pending_retry = None;
        if self.is_applied() {
            self.attempt(dom, timers);
        }
    }

    /// Standing watch: hide regions inserted since the last sweep.
    pub fn rescan<D: Dom>(&mut self, dom: &mut D) -> usize {
        if !self.is_applied() || !self.watching {
            return 0;
        }
        let hidden = self.sweep(dom).hidden;
        if hidden > 0 {
            log::debug!("{}: hid {} inserted region(s)", self.feature(), hidden);
        }
        hidden
    }

    fn attempt<D: Dom, T: Timers>(&mut self, dom: &mut D, timers: &mut T) {
        self.attempts += 1;
        let sweep = self.sweep(dom);

        if sweep.matched == 0 && self.attempts < self.policy.max_attempts {
            let id = timers.schedule(self.policy.interval, TimerTask::Retry(self.feature()));
            self.pending_retry = Some(id);
            return;
        }

        if sweep.matched == 0 {
            // Regions that never appear (no end screen, no comments) are normal
            log::debug!(
                "{}: no regions after {} attempt(s); watching for inserts",
                self.feature(),
                self.attempts
            );
        } else {
            log::debug!(
                "{}: hid {} of {} region(s) on attempt {}",
                self.feature(),
                sweep.hidden,
                sweep.matched,
                self.attempts
            );
        }
        self.watching = true;
    }

    /// Hide every matching region not already marked.
    fn sweep<D: Dom>(&self, dom: &mut D) -> Sweep {
        let feature = self.feature();
        let mut sweep = Sweep::default();
        for selector in self.spec.selectors() {
            let nodes = match dom.query_all(selector) {
                Ok(nodes) => nodes,
                Err(e) => {
                    log::warn!("{}: query failed: {}", feature, e);
                    continue;
                }
            };
            sweep.matched += nodes.len();
            for node in nodes {
                if dom.hidden_by(&node).is_some() {
                    continue;
                }
                match dom.hide(&node, feature) {
                    Ok(()) => sweep.hidden += 1,
                    Err(e) => log::warn!("{}: hide failed: {}", feature, e),
                }
            }
        }
        sweep
    }

    /// Clear the marking on regions this feature hid.
    fn reveal_all<D: Dom>(&self, dom: &mut D) {
        let feature = self.feature();
        let mut revealed = 0usize;
        for selector in self.spec.selectors() {
            let nodes = match dom.query_all(selector) {
                Ok(nodes) => nodes,
                Err(e) => {
                    log::warn!("{}: query failed: {}", feature, e);
                    continue;
                }
            };
            for node in nodes {
                if dom.hidden_by(&node) != Some(feature) {
                    continue;
                }
                match dom.reveal(&node) {
                    Ok(()) => revealed += 1,
                    Err(e) => log::warn!("{}: reveal failed: {}", feature, e),
                }
            }
        }
        if revealed > 0 {
            log::debug!("{}: revealed {} region(s)", feature, revealed);
        }
    }
}

#[derive(Debug, Default)]
struct Sweep {
    matched: usize,
    hidden: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::spec_for;
    use crate::memory::{ManualTimers, MemoryDom};

    fn controller(feature: FeatureId) -> FeatureController {
        FeatureController::new(spec_for(feature), RetryPolicy::default())
    }

    fn drain(ctrl: &mut FeatureController, dom: &mut MemoryDom, timers: &mut ManualTimers) {
        while let Some((id, task)) = timers.fire_next() {
            assert_eq!(task, TimerTask::Retry(ctrl.feature()));
            ctrl.on_retry(id, dom, timers);
        }
    }

    #[test]
    fn test_enable_hides_present_regions() {
        let mut dom = MemoryDom::new("/watch");
        let a = dom.add_region("#secondary");
        let b = dom.add_region("ytd-watch-next-secondary-results-renderer");
        let mut timers = ManualTimers::new();
        let mut ctrl = controller(FeatureId::HideSidebar);

        ctrl.enable(&mut dom, &mut timers);
        assert!(ctrl.is_applied());
        assert!(dom.is_hidden(a) && dom.is_hidden(b));
        assert_eq!(ctrl.attempts(), 1);
        assert_eq!(timers.pending(), 0);
        assert!(ctrl.is_watching());
    }

    #[test]
    fn test_enable_twice_is_idempotent() {
        let mut dom = MemoryDom::new("/watch");
        dom.add_region("#comments");
        let mut timers = ManualTimers::new();
        let mut ctrl = controller(FeatureId::HideComments);

        ctrl.enable(&mut dom, &mut timers);
        let writes = dom.writes();
        ctrl.enable(&mut dom, &mut timers);
        assert_eq!(dom.writes(), writes);
        assert_eq!(dom.hidden_count(), 1);
    }

    #[test]
    fn test_disable_when_disabled_is_noop() {
        let mut dom = MemoryDom::new("/watch");
        dom.add_region("#comments");
        let mut timers = ManualTimers::new();
        let mut ctrl = controller(FeatureId::HideComments);

        ctrl.disable(&mut dom, &mut timers);
        assert_eq!(dom.writes(), 0);
        assert!(!ctrl.is_applied());
    }

    #[test]
    fn test_retry_bound() {
        let mut dom = MemoryDom::new("/watch");
        let mut timers = ManualTimers::new();
        let mut ctrl = controller(FeatureId::HideEndCards);

        ctrl.enable(&mut dom, &mut timers);
        drain(&mut ctrl, &mut dom, &mut timers);

        assert_eq!(ctrl.attempts(), RetryPolicy::default().max_attempts);
        assert_eq!(timers.pending(), 0);
        assert!(ctrl.is_applied());
        assert!(ctrl.is_watching());
    }

    #[test]
    fn test_zero_attempts_means_single_lookup() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"maxAttempts": 0}"#).unwrap();
        let mut dom = MemoryDom::new("/watch");
        let mut timers = ManualTimers::new();
        let mut ctrl = FeatureController::new(spec_for(FeatureId::HideEndCards), policy);

        ctrl.enable(&mut dom, &mut timers);
        assert_eq!(ctrl.attempts(), 1);
        assert_eq!(timers.pending(), 0);
        assert!(ctrl.is_watching());
    }

    #[test]
    fn test_retry_finds_late_region() {
        let mut dom = MemoryDom::new("/watch");
        let mut timers = ManualTimers::new();
        let mut ctrl = controller(FeatureId::HideEndCards);

        ctrl.enable(&mut dom, &mut timers);
        let (id, _) = timers.fire_next().unwrap();
        ctrl.on_retry(id, &mut dom, &mut timers);
        let wall = dom.add_region(".ytp-endscreen-content");
        let (id, _) = timers.fire_next().unwrap();
        ctrl.on_retry(id, &mut dom, &mut timers);

        assert!(dom.is_hidden(wall));
        assert_eq!(ctrl.attempts(), 3);
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn test_disable_cancels_retry_and_reenable_resets_counter() {
        let mut dom = MemoryDom::new("/watch");
        let mut timers = ManualTimers::new();
        let mut ctrl = controller(FeatureId::HideEndCards);

        ctrl.enable(&mut dom, &mut timers);
        let (id, _) = timers.fire_next().unwrap();
        ctrl.on_retry(id, &mut dom, &mut timers);
        assert_eq!(ctrl.attempts(), 2);

        ctrl.disable(&mut dom, &mut timers);
        assert_eq!(timers.pending(), 0);

        ctrl.enable(&mut dom, &mut timers);
        assert_eq!(ctrl.attempts(), 1);
    }

    #[test]
    fn test_stale_retry_is_ignored() {
        let mut dom = MemoryDom::new("/watch");
        let mut timers = ManualTimers::new();
        let mut ctrl = controller(FeatureId::HideEndCards);

        ctrl.enable(&mut dom, &mut timers);
        ctrl.on_retry(TimerId(999), &mut dom, &mut timers);
        assert_eq!(ctrl.attempts(), 1);
    }

    #[test]
    fn test_rescan_hides_inserted_regions_only_while_applied() {
        let mut dom = MemoryDom::new("/watch");
        dom.add_region("#related");
        let mut timers = ManualTimers::new();
        let mut ctrl = controller(FeatureId::HideSidebar);

        ctrl.enable(&mut dom, &mut timers);
        let late = dom.add_region("#secondary");
        assert_eq!(ctrl.rescan(&mut dom), 1);
        assert!(dom.is_hidden(late));
        assert_eq!(ctrl.rescan(&mut dom), 0);

        ctrl.disable(&mut dom, &mut timers);
        let after = dom.add_region("#secondary");
        let writes = dom.writes();
        assert_eq!(ctrl.rescan(&mut dom), 0);
        assert!(!dom.is_hidden(after));
        assert_eq!(dom.writes(), writes);
    }

    #[test]
    fn test_disable_reveals_only_own_marks() {
        let mut dom = MemoryDom::new("/watch");
        let node = dom.add_region("#comments");
        dom.hide(&node, FeatureId::HideSidebar).unwrap();
        let mut timers = ManualTimers::new();
        let mut ctrl = controller(FeatureId::HideComments);

        ctrl.enable(&mut dom, &mut timers);
        ctrl.disable(&mut dom, &mut timers);
        assert_eq!(dom.hidden_by(&node), Some(FeatureId::HideSidebar));
    }

    #[test]
    fn test_broken_selector_does_not_block_siblings() {
        let mut dom = MemoryDom::new("/watch");
        dom.break_selector("#secondary");
        let related = dom.add_region("#related");
        let mut timers = ManualTimers::new();
        let mut ctrl = controller(FeatureId::HideSidebar);

        ctrl.enable(&mut dom, &mut timers);
        assert!(dom.is_hidden(related));
    }

    #[test]
    fn test_degenerate_controller_records_state_only() {
        let mut dom = MemoryDom::new("/");
        let mut timers = ManualTimers::new();
        let mut ctrl = controller(FeatureId::HideHomeFeed);

        ctrl.enable(&mut dom, &mut timers);
        assert!(ctrl.is_applied());
        assert_eq!(ctrl.attempts(), 0);
        assert_eq!(timers.pending(), 0);
        ctrl.disable(&mut dom, &mut timers);
        assert!(!ctrl.is_applied());
        assert_eq!(dom.writes(), 0);
    }
}
