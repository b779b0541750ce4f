//! Event system: event objects, listeners, key capture and the outbound pipeline.

pub mod handler;
pub mod input;
pub mod message;
pub mod pipeline;

pub use handler::{handler, Handler, Listener};
pub use input::{KeyEvent, Modifiers, KEY_BACKSPACE, KEY_ENTER};
pub use message::{Event, EventValue};
pub use pipeline::{EventPipeline, PostProcessor};
