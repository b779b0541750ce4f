//! # statewire
//!
//! A server-driven widget runtime.
//!
//! The server owns the application logic and describes the user interface as
//! a tree of widgets. statewire keeps the client half of that contract: it
//! creates and destroys widgets on request, renders each one into a retained
//! document, keeps widget state in sync with the server, and reports user
//! events back over a single connection.
//!
//! ## Core Systems
//!
//! - **[`transport`]**: Packet codec and the connection abstraction
//! - **[`action`]**: Serial action processor: strictly ordered, suspendable batches
//! - **[`client`]**: The client context: document, registry, connection, listeners
//! - **[`registry`]**: Widget ids, module loading and the class cache
//! - **[`widget`]**: Classes with inheritance, widget instances, the base render protocol
//! - **[`widgets`]**: Built-in classes: Page, Div, Button, inputs, Timer, Popup, Upload
//! - **[`event`]**: Listeners, event forwarding and post-processing
//! - **[`dom`]**: Slotmap-backed document arena with tree operations and markup output
//! - **[`host`]**: Hosting foreign component trees inside a widget
//! - **[`app`]**: Application loop tying a client to its streams
//! - **[`config`]**, **[`logging`]**, **[`error`]**: Ambient concerns
//! - **[`testing`]**: Headless pilot and snapshot helpers

// Foundation
pub mod error;
pub mod geometry;
pub mod util;

// Wire
pub mod config;
pub mod transport;

// Core systems
pub mod dom;
pub mod registry;

// Widget system
pub mod widget;
pub mod widgets;

// Events and actions
pub mod action;
pub mod event;

// Application
pub mod app;
pub mod client;
pub mod host;
pub mod logging;

// Test support
pub mod testing;

pub use app::App;
pub use client::{Client, Signal};
pub use config::ClientConfig;
pub use error::{Error, Result};
