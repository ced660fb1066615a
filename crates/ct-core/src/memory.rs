//! In-memory host implementations
//!
//! `MemoryDom` stands in for a live document: regions are registered under
//! the exact selector string that finds them. `ManualTimers` keeps scheduled
//! tasks in a queue that the driver fires explicitly. Used by the CLI
//! simulator and by tests.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use crate::dom::{Dom, DomError, OverlayView, TimerId, TimerTask, Timers};
use crate::types::FeatureId;

#[derive(Debug, Clone)]
struct Region {
    selector: String,
    hidden_by: Option<FeatureId>,
    attached: bool,
}

/// Document model keyed by selector.
#[derive(Debug, Clone, Default)]
pub struct MemoryDom {
    ready: bool,
    location: String,
    regions: Vec<Region>,
    styles: BTreeMap<String, String>,
    overlay: Option<OverlayView>,
    invalid_selectors: HashSet<String>,
    failing_styles: bool,
    writes: usize,
    /// Overlay and style calls in order
    calls: Vec<&'static str>,
}

impl MemoryDom {
    pub fn new(location: &str) -> Self {
        Self {
            ready: true,
            location: location.to_string(),
            ..Self::default()
        }
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn set_location(&mut self, location: &str) {
        self.location = location.to_string();
    }

    /// Insert a region found by `selector`. Returns its node handle.
    pub fn add_region(&mut self, selector: &str) -> usize {
        self.regions.push(Region {
            selector: selector.to_string(),
            hidden_by: None,
            attached: true,
        });
        self.regions.len() - 1
    }

    /// Detach a region, as the host does when it re-renders.
    pub fn remove_region(&mut self, node: usize) {
        if let Some(region) = self.regions.get_mut(node) {
            region.attached = false;
        }
    }

    /// Make every query for `selector` fail.
    pub fn break_selector(&mut self, selector: &str) {
        self.invalid_selectors.insert(selector.to_string());
    }

    /// Make `insert_style` fail until turned off again.
    pub fn fail_styles(&mut self, failing: bool) {
        self.failing_styles = failing;
    }

    pub fn is_hidden(&self, node: usize) -> bool {
        self.regions.get(node).is_some_and(|r| r.hidden_by.is_some())
    }

    pub fn hidden_count(&self) -> usize {
        self.regions
            .iter()
            .filter(|r| r.attached && r.hidden_by.is_some())
            .count()
    }

    pub fn style(&self, id: &str) -> Option<&str> {
        self.styles.get(id).map(String::as_str)
    }

    pub fn overlay(&self) -> Option<&OverlayView> {
        self.overlay.as_ref()
    }

    /// Number of mutating calls made so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Overlay and style calls made so far, oldest first.
    pub fn calls(&self) -> &[&'static str] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Selectors with at least one attached region, with hidden state.
    pub fn regions(&self) -> impl Iterator<Item = (&str, Option<FeatureId>)> + '_ {
        self.regions
            .iter()
            .filter(|r| r.attached)
            .map(|r| (r.selector.as_str(), r.hidden_by))
    }
}

impl Dom for MemoryDom {
    type Node = usize;

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn location(&self) -> String {
        self.location.clone()
    }

    fn query_all(&self, selector: &str) -> Result<Vec<usize>, DomError> {
        if self.invalid_selectors.contains(selector) {
            return Err(DomError::InvalidSelector(selector.to_string()));
        }
        Ok(self
            .regions
            .iter()
            .enumerate()
            .filter(|(_, r)| r.attached && r.selector == selector)
            .map(|(i, _)| i)
            .collect())
    }

    fn hidden_by(&self, node: &usize) -> Option<FeatureId> {
        self.regions.get(*node).and_then(|r| r.hidden_by)
    }

    fn hide(&mut self, node: &usize, feature: FeatureId) -> Result<(), DomError> {
        let region = self.regions.get_mut(*node).ok_or(DomError::Detached)?;
        region.hidden_by = Some(feature);
        self.writes += 1;
        Ok(())
    }

    fn reveal(&mut self, node: &usize) -> Result<(), DomError> {
        let region = self.regions.get_mut(*node).ok_or(DomError::Detached)?;
        region.hidden_by = None;
        self.writes += 1;
        Ok(())
    }

    fn insert_style(&mut self, id: &str, css: &str) -> Result<(), DomError> {
        self.calls.push("insert_style");
        if self.failing_styles {
            return Err(DomError::Script(format!("cannot insert style '{id}'")));
        }
        self.styles.insert(id.to_string(), css.to_string());
        self.writes += 1;
        Ok(())
    }

    fn remove_style(&mut self, id: &str) -> Result<(), DomError> {
        self.calls.push("remove_style");
        if self.styles.remove(id).is_some() {
            self.writes += 1;
        }
        Ok(())
    }

    fn mount_overlay(&mut self, view: &OverlayView) -> Result<(), DomError> {
        self.calls.push("mount_overlay");
        self.overlay = Some(view.clone());
        self.writes += 1;
        Ok(())
    }

    fn unmount_overlay(&mut self) -> Result<(), DomError> {
        self.calls.push("unmount_overlay");
        if self.overlay.take().is_some() {
            self.writes += 1;
        }
        Ok(())
    }
}

// =============================================================================
// Manual Timers
// =============================================================================

/// Timer queue fired explicitly by the driver.
#[derive(Debug, Default)]
pub struct ManualTimers {
    now: Duration,
    next_id: u32,
    pending: Vec<(TimerId, Duration, TimerTask)>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_scheduled(&self, task: TimerTask) -> bool {
        self.pending.iter().any(|(_, _, t)| *t == task)
    }

    /// Elapsed virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Pop the earliest pending timer and advance the clock to it.
    pub fn fire_next(&mut self) -> Option<(TimerId, TimerTask)> {
        let idx = self
            .pending
            .iter()
            .enumerate()
            .min_by_key(|(_, (id, due, _))| (*due, *id))
            .map(|(i, _)| i)?;
        let (id, due, task) = self.pending.remove(idx);
        self.now = self.now.max(due);
        Some((id, task))
    }
}

impl Timers for ManualTimers {
    fn schedule(&mut self, delay: Duration, task: TimerTask) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.push((id, self.now + delay, task));
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.pending.retain(|(pending, _, _)| *pending != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_by_exact_selector() {
        let mut dom = MemoryDom::new("/");
        let a = dom.add_region("#a");
        dom.add_region("#b");
        assert_eq!(dom.query_all("#a").unwrap(), vec![a]);
        dom.remove_region(a);
        assert!(dom.query_all("#a").unwrap().is_empty());
    }

    #[test]
    fn test_broken_selector() {
        let mut dom = MemoryDom::new("/");
        dom.break_selector("#a");
        assert_eq!(dom.query_all("#a"), Err(DomError::InvalidSelector("#a".into())));
    }

    #[test]
    fn test_timers_fire_in_due_order() {
        let mut timers = ManualTimers::new();
        let late = timers.schedule(Duration::from_millis(200), TimerTask::Navigation);
        let early = timers.schedule(Duration::from_millis(100), TimerTask::Retry(FeatureId::HideShorts));
        let cancelled = timers.schedule(Duration::from_millis(50), TimerTask::Navigation);
        timers.cancel(cancelled);

        assert_eq!(timers.fire_next(), Some((early, TimerTask::Retry(FeatureId::HideShorts))));
        assert_eq!(timers.now(), Duration::from_millis(100));
        assert_eq!(timers.fire_next(), Some((late, TimerTask::Navigation)));
        assert_eq!(timers.fire_next(), None);
    }
}
