//! DOM arena: slotmap-backed element tree with id/class queries and markup output.

pub mod node;
pub mod query;
pub mod tree;

pub use node::{NodeData, NodeId};
pub use tree::{Dom, APP_ROOT_ID};
