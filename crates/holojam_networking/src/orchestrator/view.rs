//! # Consumer Views
//!
//! The orchestrator does not know what a view is; the scene layer implements
//! [`TelemetryView`] for whatever it binds poses to.
//!
//! ```text
//!  orchestrator calls:        scene layer implements:
//! ┌──────────────────────┐    ┌──────────────────────┐
//! │ trait TelemetryView  │ ←─ │ impl TelemetryView   │
//! └──────────────────────┘    └──────────────────────┘
//! ```

use crate::object::TrackedObject;

/// One consumer-side binding to a labeled object.
pub trait TelemetryView {
    /// Label the view is bound to. An empty label is skipped.
    fn label(&self) -> &str;

    /// True if this node owns the object and sends it; false if it mirrors a
    /// remote one.
    fn is_local(&self) -> bool;

    /// Current state of a local view, to be sent.
    fn snapshot(&self) -> TrackedObject;

    /// Copies received state onto a remote view.
    fn apply(&mut self, remote: &TrackedObject);

    /// Marks a remote view as not currently tracked, keeping its pose.
    fn mark_untracked(&mut self);
}

impl<T: TelemetryView + ?Sized> TelemetryView for Box<T> {
    fn label(&self) -> &str {
        (**self).label()
    }

    fn is_local(&self) -> bool {
        (**self).is_local()
    }

    fn snapshot(&self) -> TrackedObject {
        (**self).snapshot()
    }

    fn apply(&mut self, remote: &TrackedObject) {
        (**self).apply(remote);
    }

    fn mark_untracked(&mut self) {
        (**self).mark_untracked();
    }
}

/// Plain view used by tools and tests.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewState {
    /// Object state; its label is the view's label.
    pub object: TrackedObject,
    /// Ownership.
    pub local: bool,
}

impl ViewState {
    /// A view mirroring a remote object.
    #[must_use]
    pub fn remote(label: impl Into<String>) -> Self {
        Self {
            object: TrackedObject::new(label),
            local: false,
        }
    }

    /// A view owning `object`.
    #[must_use]
    pub const fn local(object: TrackedObject) -> Self {
        Self { object, local: true }
    }
}

impl TelemetryView for ViewState {
    fn label(&self) -> &str {
        &self.object.label
    }

    fn is_local(&self) -> bool {
        self.local
    }

    fn snapshot(&self) -> TrackedObject {
        self.object.clone()
    }

    fn apply(&mut self, remote: &TrackedObject) {
        self.object.copy_state_from(remote);
    }

    fn mark_untracked(&mut self) {
        self.object.tracked = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holojam_shared::Vec3;

    #[test]
    fn test_remote_view_starts_untracked() {
        let view = ViewState::remote("VR1");
        assert_eq!(view.label(), "VR1");
        assert!(!view.is_local());
        assert!(!view.object.tracked);
    }

    #[test]
    fn test_apply_then_untrack_keeps_pose() {
        let mut view = ViewState::remote("VR1");
        let mut remote = TrackedObject::new("VR1");
        remote.position = Vec3::new(1.0, 2.0, 3.0);
        remote.tracked = true;

        view.apply(&remote);
        assert!(view.object.tracked);
        view.mark_untracked();
        assert!(!view.object.tracked);
        assert_eq!(view.object.position, Vec3::new(1.0, 2.0, 3.0));
    }
}
