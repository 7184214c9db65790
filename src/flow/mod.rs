//! Flow-share records.
//!
//! After a job is joined, every hub carries a [`FlowStatMap`] telling the
//! simulation how to split waiting cargo among next hops, per origin.

mod map;
mod stat;

pub use map::FlowStatMap;
pub use stat::{FlowStat, SharesMap};
