//! Widget lifecycle: created, rendered, detached, attached, destroyed.
//!
//! Each widget carries a [`Lifecycle`] phase. The client-wide
//! `LifecycleTracker` records which widgets are live and accumulates
//! lifecycle events that tests and the application loop can drain.

use std::collections::HashSet;

use super::WidgetKey;

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Phase of a single widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Constructed but never rendered.
    #[default]
    Unattached,
    /// A render pass is in progress. Setters run during this phase.
    Rendering,
    /// Rendered and (if it has a parent) attached.
    Rendered,
    /// Rendered but detached from its parent's element.
    Detached,
    /// Torn down. No further protocol calls are honored.
    Destroyed,
}

impl Lifecycle {
    pub fn is_rendering(self) -> bool {
        self == Self::Rendering
    }

    pub fn is_destroyed(self) -> bool {
        self == Self::Destroyed
    }
}

// ---------------------------------------------------------------------------
// LifecycleEvent
// ---------------------------------------------------------------------------

/// Events that occur during the widget lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A widget was constructed and registered.
    Created { key: WidgetKey },
    /// A widget completed a render pass.
    Rendered { key: WidgetKey },
    /// A widget's element was reattached under its parent.
    Attached { key: WidgetKey },
    /// A widget's element was detached, keeping it alive.
    Detached { key: WidgetKey },
    /// A widget was destroyed.
    Destroyed { key: WidgetKey },
}

// ---------------------------------------------------------------------------
// LifecycleTracker
// ---------------------------------------------------------------------------

/// Tracks which widgets are live and accumulates lifecycle events.
#[derive(Debug)]
pub struct LifecycleTracker {
    live: HashSet<WidgetKey>,
    pending: Vec<LifecycleEvent>,
}

impl LifecycleTracker {
    /// Create a new, empty lifecycle tracker.
    pub fn new() -> Self {
        Self {
            live: HashSet::new(),
            pending: Vec::new(),
        }
    }

    /// Record that a widget was created.
    ///
    /// If the widget is already live, this is a no-op.
    pub fn on_create(&mut self, key: WidgetKey) {
        if self.live.insert(key) {
            self.pending.push(LifecycleEvent::Created { key });
        }
    }

    /// Record a completed render pass of a live widget.
    pub fn on_render(&mut self, key: WidgetKey) {
        if self.live.contains(&key) {
            self.pending.push(LifecycleEvent::Rendered { key });
        }
    }

    pub fn on_attach(&mut self, key: WidgetKey) {
        if self.live.contains(&key) {
            self.pending.push(LifecycleEvent::Attached { key });
        }
    }

    pub fn on_detach(&mut self, key: WidgetKey) {
        if self.live.contains(&key) {
            self.pending.push(LifecycleEvent::Detached { key });
        }
    }

    /// Record that a widget was destroyed.
    ///
    /// Only the first call for a given widget produces an event.
    pub fn on_destroy(&mut self, key: WidgetKey) {
        if self.live.remove(&key) {
            self.pending.push(LifecycleEvent::Destroyed { key });
        }
    }

    /// Check whether a widget is currently live.
    pub fn is_live(&self, key: WidgetKey) -> bool {
        self.live.contains(&key)
    }

    /// The number of live widgets.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Drain and return all pending lifecycle events.
    pub fn pending_events(&mut self) -> Vec<LifecycleEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Whether there are any pending events.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

impl Default for LifecycleTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn make_key(sm: &mut SlotMap<WidgetKey, ()>) -> WidgetKey {
        sm.insert(())
    }

    #[test]
    fn default_phase_is_unattached() {
        assert_eq!(Lifecycle::default(), Lifecycle::Unattached);
        assert!(Lifecycle::Rendering.is_rendering());
        assert!(Lifecycle::Destroyed.is_destroyed());
    }

    #[test]
    fn create_then_destroy() {
        let mut sm = SlotMap::with_key();
        let key = make_key(&mut sm);
        let mut tracker = LifecycleTracker::new();
        tracker.on_create(key);
        assert!(tracker.is_live(key));
        tracker.on_destroy(key);
        assert!(!tracker.is_live(key));
        assert_eq!(
            tracker.pending_events(),
            vec![LifecycleEvent::Created { key }, LifecycleEvent::Destroyed { key }]
        );
    }

    #[test]
    fn destroy_reported_once() {
        let mut sm = SlotMap::with_key();
        let key = make_key(&mut sm);
        let mut tracker = LifecycleTracker::new();
        tracker.on_create(key);
        tracker.on_destroy(key);
        tracker.on_destroy(key);
        let destroyed = tracker
            .pending_events()
            .into_iter()
            .filter(|e| matches!(e, LifecycleEvent::Destroyed { .. }))
            .count();
        assert_eq!(destroyed, 1);
    }

    #[test]
    fn events_ignored_for_unknown_widgets() {
        let mut sm = SlotMap::with_key();
        let key = make_key(&mut sm);
        let mut tracker = LifecycleTracker::new();
        tracker.on_render(key);
        tracker.on_detach(key);
        tracker.on_attach(key);
        assert!(!tracker.has_pending());
    }

    #[test]
    fn detach_attach_sequence() {
        let mut sm = SlotMap::with_key();
        let key = make_key(&mut sm);
        let mut tracker = LifecycleTracker::default();
        tracker.on_create(key);
        tracker.on_render(key);
        tracker.on_detach(key);
        tracker.on_attach(key);
        assert_eq!(tracker.live_count(), 1);
        assert_eq!(
            tracker.pending_events(),
            vec![
                LifecycleEvent::Created { key },
                LifecycleEvent::Rendered { key },
                LifecycleEvent::Detached { key },
                LifecycleEvent::Attached { key },
            ]
        );
        assert!(!tracker.has_pending());
    }
}
