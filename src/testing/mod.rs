//! Headless testing framework: Pilot, snapshot helpers.
//!
//! Use the [`Pilot`] to drive a [`Client`](crate::client::Client) over an
//! in-memory connection, playing the server's part. Use
//! [`document_to_string`] and [`widget_tree`] to capture the document or the
//! widget tree as text for snapshot-style assertions.

pub mod pilot;
pub mod snapshot;

pub use pilot::Pilot;
pub use snapshot::{document_to_string, pretty_html, widget_tree};
