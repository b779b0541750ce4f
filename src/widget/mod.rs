//! Widget system: classes, instances, lifecycle, and the base render protocol.

use slotmap::new_key_type;

pub mod args;
pub mod base;
pub mod class;
pub mod instance;
pub mod lifecycle;
pub mod template;

new_key_type! {
    /// Handle to a widget in the registry arena.
    pub struct WidgetKey;
}

pub use args::{widget_ref, Arg, Args, WIDGET_MARKER};
pub use base::base_class;
pub use class::{Behavior, Class, ClassBuilder, Inherit, MethodFn, SetterFn, Super};
pub use instance::{Ancillary, Props, WidgetNode, CLASS_PREFIX};
pub use lifecycle::{Lifecycle, LifecycleEvent, LifecycleTracker};
