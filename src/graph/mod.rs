//! Persistent link graphs.
//!
//! A [`GraphStore`] is the live picture of one connected region for one cargo
//! type. Gameplay mutates it at any tick; the scheduler snapshots it into
//! computation jobs.

mod edge;
mod node;
mod pool;
mod store;

pub use edge::{Edge, EdgeUpdateMode, Restriction, UpdatePolicy};
pub use node::{EdgeIter, HubNode, NodeMut, NodeRef};
pub use pool::GraphPool;
pub use store::{scale, GraphStore, NodeRelocated, COMPRESSION_INTERVAL, MAX_HUBS, MIN_TIMEOUT_DISTANCE};
