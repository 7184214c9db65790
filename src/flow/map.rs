//! Per-hub flow-share table keyed by origin station.

use std::collections::btree_map::{self, BTreeMap};

use serde::{Deserialize, Serialize};

use super::stat::FlowStat;
use crate::types::StationId;

/// Flow-share records of one hub, keyed by the station the cargo came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowStatMap {
    records: BTreeMap<StationId, FlowStat>,
}

impl FlowStatMap {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of origins with a record.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the table has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record for `origin`.
    #[must_use]
    pub fn get(&self, origin: StationId) -> Option<&FlowStat> {
        self.records.get(&origin)
    }

    /// Record for `origin`, mutably.
    pub fn get_mut(&mut self, origin: StationId) -> Option<&mut FlowStat> {
        self.records.get_mut(&origin)
    }

    /// Returns true if `origin` has a record.
    #[must_use]
    pub fn contains(&self, origin: StationId) -> bool {
        self.records.contains_key(&origin)
    }

    /// Inserts or replaces the record for `origin`.
    pub fn insert(&mut self, origin: StationId, record: FlowStat) -> Option<FlowStat> {
        debug_assert!(!record.is_empty());
        self.records.insert(origin, record)
    }

    /// Removes the record for `origin`.
    pub fn remove(&mut self, origin: StationId) -> Option<FlowStat> {
        self.records.remove(&origin)
    }

    /// Origins in ascending order.
    pub fn origins(&self) -> impl Iterator<Item = StationId> + '_ {
        self.records.keys().copied()
    }

    /// Records in origin order.
    pub fn iter(&self) -> btree_map::Iter<'_, StationId, FlowStat> {
        self.records.iter()
    }

    /// Records in origin order, mutably.
    pub fn iter_mut(&mut self) -> btree_map::IterMut<'_, StationId, FlowStat> {
        self.records.iter_mut()
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Adds `flow` from `origin` going via `via`.
    pub fn add_flow(&mut self, origin: StationId, via: StationId, flow: u32) {
        match self.records.get_mut(&origin) {
            Some(record) => {
                record.change_share(via, saturate_i32(flow));
                debug_assert!(!record.is_empty());
            }
            None => {
                self.records.insert(origin, FlowStat::new(via, flow, false));
            }
        }
    }

    /// Passes `flow` from `origin` on via `via`.
    ///
    /// The same amount is booked as local consumption so it can later be
    /// subtracted by [`finalize_local_consumption`](Self::finalize_local_consumption);
    /// shares are never negative, so passed-on flow is tracked this way.
    pub fn pass_on_flow(&mut self, origin: StationId, via: StationId, flow: u32) {
        match self.records.get_mut(&origin) {
            Some(record) => {
                record.change_share(via, saturate_i32(flow));
                record.change_share(StationId::INVALID, saturate_i32(flow));
                debug_assert!(!record.is_empty());
            }
            None => {
                let mut record = FlowStat::new(via, flow, false);
                record.append_share(StationId::INVALID, flow, false);
                self.records.insert(origin, record);
            }
        }
    }

    /// Subtracts passed-on flow from local consumption at station `this`.
    pub fn finalize_local_consumption(&mut self, this: StationId) {
        for record in self.records.values_mut() {
            let mut local = record.share(StationId::INVALID);
            while local > 0 {
                let chunk = local.min(i32::MAX as u32);
                record.change_share(this, -saturate_i32(chunk));
                record.change_share(StationId::INVALID, -saturate_i32(chunk));
                local -= chunk;
            }
            debug_assert!(!record.is_empty(), "local share used up without a remote share");
        }
        self.records.retain(|_, record| !record.is_empty());
    }

    /// Erases every share via `via`. Returns the origins whose record
    /// became empty and was dropped.
    pub fn delete_flows(&mut self, via: StationId) -> Vec<StationId> {
        let mut erased = Vec::new();
        self.records.retain(|&origin, record| {
            record.erase_share(via);
            if record.is_empty() {
                erased.push(origin);
                false
            } else {
                true
            }
        });
        erased
    }

    /// Restricts every share via `via`.
    pub fn restrict_flows(&mut self, via: StationId) {
        for record in self.records.values_mut() {
            record.restrict_share(via);
        }
    }

    /// Releases every share via `via`.
    pub fn release_flows(&mut self, via: StationId) {
        for record in self.records.values_mut() {
            record.release_share(via);
        }
    }

    /// Sum of all flows.
    #[must_use]
    pub fn flow(&self) -> u32 {
        self.records.values().fold(0, |acc, r| acc.saturating_add(r.total()))
    }

    /// Sum of all flows via `via`.
    #[must_use]
    pub fn flow_via(&self, via: StationId) -> u32 {
        self.records
            .values()
            .fold(0, |acc, r| acc.saturating_add(r.share(via)))
    }

    /// Sum of all flows originating at `from`.
    #[must_use]
    pub fn flow_from(&self, from: StationId) -> u32 {
        self.get(from).map_or(0, FlowStat::total)
    }

    /// Flow originating at `from` and going via `via`.
    #[must_use]
    pub fn flow_from_via(&self, from: StationId, via: StationId) -> u32 {
        self.get(from).map_or(0, |r| r.share(via))
    }
}

impl<'a> IntoIterator for &'a FlowStatMap {
    type Item = (&'a StationId, &'a FlowStat);
    type IntoIter = btree_map::Iter<'a, StationId, FlowStat>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for FlowStatMap {
    type Item = (StationId, FlowStat);
    type IntoIter = btree_map::IntoIter<StationId, FlowStat>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

fn saturate_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
