//! Directed link statistics between two hubs.

use serde::{Deserialize, Serialize};

use crate::time::Date;
use crate::types::NodeId;

/// How new capacity/usage measurements are folded into an existing edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdatePolicy {
    /// Add the measurement to the stored values.
    Increase,
    /// Raise the stored values to at least the measurement.
    Refresh,
}

/// Which freshness stamps an update refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Restriction {
    /// Traffic that may be used for automatic routing.
    Unrestricted,
    /// Traffic on a link excluded from automatic routing.
    Restricted,
}

/// Update mode for [`NodeMut::update_edge`](super::NodeMut::update_edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeUpdateMode {
    /// How values are combined.
    pub policy: UpdatePolicy,
    /// Which stamp is refreshed.
    pub restriction: Restriction,
}

impl EdgeUpdateMode {
    /// Additive update of unrestricted traffic.
    #[must_use]
    pub const fn increase() -> Self {
        Self {
            policy: UpdatePolicy::Increase,
            restriction: Restriction::Unrestricted,
        }
    }

    /// Floor refresh of unrestricted traffic.
    #[must_use]
    pub const fn refresh() -> Self {
        Self {
            policy: UpdatePolicy::Refresh,
            restriction: Restriction::Unrestricted,
        }
    }

    /// Same policy, stamping the restricted date instead.
    #[must_use]
    pub const fn restricted(self) -> Self {
        Self {
            policy: self.policy,
            restriction: Restriction::Restricted,
        }
    }
}

/// One cell of the edge matrix.
///
/// An edge with zero capacity is logically absent. `next_edge` links the
/// present edges leaving the same hub; on the self-edge it is the list head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub(crate) capacity: u32,
    pub(crate) usage: u32,
    pub(crate) last_unrestricted_update: Date,
    pub(crate) last_restricted_update: Date,
    pub(crate) next_edge: Option<NodeId>,
}

impl Edge {
    pub(crate) const EMPTY: Self = Self {
        capacity: 0,
        usage: 0,
        last_unrestricted_update: Date::INVALID,
        last_restricted_update: Date::INVALID,
        next_edge: None,
    };

    /// Maximum throughput.
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Observed throughput.
    #[must_use]
    pub const fn usage(&self) -> u32 {
        self.usage
    }

    /// Last time unrestricted traffic was seen.
    #[must_use]
    pub const fn last_unrestricted_update(&self) -> Date {
        self.last_unrestricted_update
    }

    /// Last time restricted traffic was seen.
    #[must_use]
    pub const fn last_restricted_update(&self) -> Date {
        self.last_restricted_update
    }

    /// Latest of both stamps. [`Date::INVALID`] if the edge was never updated.
    #[must_use]
    pub fn last_update(&self) -> Date {
        self.last_unrestricted_update.max(self.last_restricted_update)
    }

    /// Returns true if the edge has capacity.
    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.capacity > 0
    }

    /// Next present edge leaving the same hub.
    #[must_use]
    pub const fn next_edge(&self) -> Option<NodeId> {
        self.next_edge
    }

    pub(crate) fn update(&mut self, capacity: u32, usage: u32, mode: EdgeUpdateMode, now: Date) {
        debug_assert!(self.capacity > 0, "updating an absent edge");
        debug_assert!(usage <= capacity, "usage {usage} exceeds capacity {capacity}");
        match mode.policy {
            UpdatePolicy::Increase => {
                self.capacity = self.capacity.saturating_add(capacity);
                self.usage = self.usage.saturating_add(usage);
            }
            UpdatePolicy::Refresh => {
                self.capacity = self.capacity.max(capacity);
                self.usage = self.usage.max(usage);
            }
        }
        self.stamp(mode.restriction, now);
    }

    pub(crate) fn stamp(&mut self, restriction: Restriction, now: Date) {
        match restriction {
            Restriction::Unrestricted => self.last_unrestricted_update = now,
            Restriction::Restricted => self.last_restricted_update = now,
        }
    }

    /// Forgets unrestricted traffic; the link stays only for restricted use.
    pub(crate) fn restrict(&mut self) {
        self.last_unrestricted_update = Date::INVALID;
    }

    /// Forgets restricted traffic.
    pub(crate) fn release(&mut self) {
        self.last_restricted_update = Date::INVALID;
    }

    pub(crate) fn shift_dates(&mut self, interval: i32) {
        self.last_unrestricted_update = self.last_unrestricted_update.shifted(interval);
        self.last_restricted_update = self.last_restricted_update.shifted(interval);
    }

    /// Halves the statistics. Capacity rounds up so a live link never drops to zero.
    pub(crate) fn compress(&mut self) {
        if self.capacity > 0 {
            self.capacity = self.capacity / 2 + self.capacity % 2;
            self.usage /= 2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(capacity: u32, usage: u32) -> Edge {
        Edge {
            capacity,
            usage,
            ..Edge::EMPTY
        }
    }

    #[test]
    fn increase_adds_and_stamps() {
        let mut e = live(10, 2);
        e.update(5, 3, EdgeUpdateMode::increase(), Date::from_days(7));
        assert_eq!((e.capacity(), e.usage()), (15, 5));
        assert_eq!(e.last_unrestricted_update(), Date::from_days(7));
        assert_eq!(e.last_restricted_update(), Date::INVALID);
    }

    #[test]
    fn refresh_takes_floor() {
        let mut e = live(10, 8);
        e.update(6, 6, EdgeUpdateMode::refresh().restricted(), Date::from_days(3));
        assert_eq!((e.capacity(), e.usage()), (10, 8));
        e.update(20, 9, EdgeUpdateMode::refresh(), Date::from_days(4));
        assert_eq!((e.capacity(), e.usage()), (20, 9));
        assert_eq!(e.last_restricted_update(), Date::from_days(3));
        assert_eq!(e.last_update(), Date::from_days(4));
    }

    #[test]
    fn restrict_and_release_clear_stamps() {
        let mut e = live(1, 0);
        e.stamp(Restriction::Unrestricted, Date::from_days(1));
        e.stamp(Restriction::Restricted, Date::from_days(2));
        e.restrict();
        assert!(!e.last_unrestricted_update().is_valid());
        e.release();
        assert!(!e.last_update().is_valid());
    }

    #[test]
    fn compress_rounds_capacity_up() {
        let mut e = live(3, 3);
        e.compress();
        assert_eq!((e.capacity(), e.usage()), (2, 1));
        let mut e = live(1, 1);
        e.compress();
        assert_eq!((e.capacity(), e.usage()), (1, 0));
        let mut e = Edge::EMPTY;
        e.compress();
        assert_eq!(e.capacity(), 0);
    }
}
