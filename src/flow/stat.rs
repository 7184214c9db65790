//! Flow-share record: how cargo from one origin is split among next hops.

use std::collections::BTreeMap;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use crate::types::StationId;

/// Cumulative share boundaries mapped to next-hop stations.
pub type SharesMap = BTreeMap<u32, StationId>;

/// Splits the cargo of one origin among next hops.
///
/// Shares are stored cumulatively: a key is the upper boundary of the share
/// of its station, so the share of an entry is its key minus the previous key.
/// Entries up to `unrestricted` may be picked for automatic routing; the rest
/// are restricted and only serve cargo that is already on its way.
///
/// A share for [`StationId::INVALID`] means local consumption.
///
/// Lookups take a `draw` function. `draw(max)` must return a number in
/// `0..max`; the simulation passes its own random generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStat {
    shares: SharesMap,
    unrestricted: u32,
}

impl FlowStat {
    /// Creates a record with a single share.
    ///
    /// # Panics
    ///
    /// Panics if `flow` is zero; a record is never empty.
    #[must_use]
    pub fn new(via: StationId, flow: u32, restricted: bool) -> Self {
        assert!(flow > 0, "a flow record needs a non-empty share");
        let mut shares = SharesMap::new();
        shares.insert(flow, via);
        Self {
            shares,
            unrestricted: if restricted { 0 } else { flow },
        }
    }

    /// Appends a share for a station that is not in the record yet.
    pub fn append_share(&mut self, via: StationId, flow: u32, restricted: bool) {
        debug_assert!(flow > 0);
        debug_assert_eq!(self.share(via), 0, "{via} already has a share");
        self.shares.insert(self.total() + flow, via);
        if !restricted {
            self.unrestricted += flow;
        }
    }

    /// Cumulative shares.
    #[must_use]
    pub const fn shares(&self) -> &SharesMap {
        &self.shares
    }

    /// Limit of the unrestricted shares.
    #[must_use]
    pub const fn unrestricted(&self) -> u32 {
        self.unrestricted
    }

    /// Sum of all shares.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.shares.last_key_value().map_or(0, |(&k, _)| k)
    }

    /// Returns true once every share has been removed. An empty record must
    /// be dropped from its table.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// Share of `via`, zero if absent.
    #[must_use]
    pub fn share(&self, via: StationId) -> u32 {
        let mut prev = 0;
        for (&boundary, &st) in &self.shares {
            if st == via {
                return boundary - prev;
            }
            prev = boundary;
        }
        0
    }

    /// Adds `delta` to the share of `via`, or removes up to `-delta` from it.
    ///
    /// A share that drops to zero is removed. A new share is unrestricted.
    pub fn change_share(&mut self, via: StationId, delta: i32) {
        self.apply_change(via, Some(i64::from(delta)));
    }

    /// Removes the share of `via` entirely.
    pub fn erase_share(&mut self, via: StationId) {
        self.apply_change(via, None);
    }

    fn apply_change(&mut self, st: StationId, change: Option<i64>) {
        debug_assert!(!self.shares.is_empty());
        let erase = change.is_none();
        let mut flow = change.unwrap_or(0);
        let mut removed: u32 = 0;
        let mut added: u32 = 0;
        let mut last_share: u32 = 0;
        let mut new_shares = SharesMap::new();

        for (&boundary, &via) in &self.shares {
            if via == st {
                let share = boundary - last_share;
                if erase || (flow < 0 && -flow >= i64::from(share)) {
                    removed += share;
                    if boundary <= self.unrestricted {
                        self.unrestricted -= share;
                    }
                    if !erase {
                        flow += i64::from(share);
                    }
                    last_share = boundary;
                    continue;
                }
                let amount = clamp_u32(flow.abs());
                if flow < 0 {
                    removed += amount;
                    if boundary <= self.unrestricted {
                        self.unrestricted -= amount;
                    }
                } else {
                    added += amount;
                    if boundary <= self.unrestricted {
                        self.unrestricted += amount;
                    }
                }
                flow = 0;
            }
            new_shares.insert(boundary + added - removed, via);
            last_share = boundary;
        }

        let last_share = last_share + added - removed;
        self.shares = new_shares;
        if flow > 0 {
            let flow = clamp_u32(flow);
            self.shares.insert(last_share + flow, st);
            if self.unrestricted < last_share {
                self.release_share(st);
            } else {
                self.unrestricted += flow;
            }
        }
    }

    /// Moves the share of `via` behind the unrestricted limit.
    pub fn restrict_share(&mut self, via: StationId) {
        debug_assert!(!self.shares.is_empty());
        let mut flow = 0;
        let mut last_share = 0;
        let mut new_shares = SharesMap::new();
        for (&boundary, &st) in &self.shares {
            if flow == 0 {
                if boundary > self.unrestricted {
                    // Absent or already restricted.
                    return;
                }
                if st == via {
                    flow = boundary - last_share;
                } else {
                    new_shares.insert(boundary, st);
                }
            } else {
                new_shares.insert(boundary - flow, st);
            }
            last_share = boundary;
        }
        if flow == 0 {
            return;
        }
        self.unrestricted -= flow;
        new_shares.insert(last_share, via);
        self.shares = new_shares;
    }

    /// Moves a restricted share of `via` to the front, making it unrestricted.
    pub fn release_share(&mut self, via: StationId) {
        debug_assert!(!self.shares.is_empty());
        let mut flow = 0;
        let mut next_share = 0;
        let mut found = false;
        for (&boundary, &st) in self.shares.iter().rev() {
            // Not <= as the share may end exactly on the limit.
            if boundary < self.unrestricted {
                return;
            }
            if found {
                flow = next_share - boundary;
                break;
            }
            if boundary == self.unrestricted {
                return;
            }
            if st == via {
                found = true;
            }
            next_share = boundary;
        }
        if !found {
            return;
        }
        if flow == 0 {
            // The share starts at zero.
            flow = next_share;
        }
        self.unrestricted += flow;

        let mut new_shares = SharesMap::new();
        new_shares.insert(flow, via);
        let mut offset = flow;
        for (&boundary, &st) in &self.shares {
            if st == via {
                offset = 0;
            } else {
                new_shares.insert(offset + boundary, st);
            }
        }
        self.shares = new_shares;
    }

    /// Shrinks every share to 1, keeping order and the restricted split.
    ///
    /// Used when a link graph no longer produces flows for an origin: the
    /// record keeps routing waiting cargo without weighing on link usage.
    pub fn invalidate(&mut self) {
        debug_assert!(!self.shares.is_empty());
        let mut new_shares = SharesMap::new();
        let limit = self.unrestricted;
        for (i, (&boundary, &st)) in (1u32..).zip(&self.shares) {
            new_shares.insert(i, st);
            if boundary == limit {
                self.unrestricted = i;
            }
        }
        self.shares = new_shares;
    }

    /// Rescales shares accumulated over `runtime` days to 30-day values.
    /// Every share stays at least 1.
    ///
    /// # Panics
    ///
    /// Panics if `runtime` is zero.
    pub fn scale_to_monthly(&mut self, runtime: u32) {
        assert!(runtime > 0, "runtime must be positive");
        let mut new_shares = SharesMap::new();
        let mut share = 0u32;
        let limit = self.unrestricted;
        for (&boundary, &st) in &self.shares {
            let monthly = u64::from(boundary) * 30 / u64::from(runtime);
            share = (share + 1).max(u32::try_from(monthly).unwrap_or(u32::MAX));
            new_shares.insert(share, st);
            if boundary == limit {
                self.unrestricted = share;
            }
        }
        self.shares = new_shares;
    }

    /// Exchanges contents with `other`.
    pub fn swap_shares(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }

    /// Picks an unrestricted next hop weighted by share, or
    /// [`StationId::INVALID`] if everything is restricted.
    pub fn via<F>(&self, mut draw: F) -> StationId
    where
        F: FnMut(u32) -> u32,
    {
        if self.unrestricted == 0 {
            return StationId::INVALID;
        }
        self.upper_bound(draw(self.unrestricted))
            .map_or(StationId::INVALID, |(_, st)| st)
    }

    /// Picks any next hop weighted by share. The flag tells whether the pick
    /// came from the restricted part.
    pub fn via_with_restricted<F>(&self, mut draw: F) -> (StationId, bool)
    where
        F: FnMut(u32) -> u32,
    {
        debug_assert!(!self.shares.is_empty());
        let rand = draw(self.total());
        let via = self.upper_bound(rand).map_or(StationId::INVALID, |(_, st)| st);
        (via, rand >= self.unrestricted)
    }

    /// Picks an unrestricted next hop other than `excluded` and `excluded2`.
    ///
    /// When a draw hits an excluded share, the next draw is taken from the
    /// remaining range so the other shares keep their relative weights.
    pub fn via_excluding<F>(&self, mut draw: F, excluded: StationId, excluded2: StationId) -> StationId
    where
        F: FnMut(u32) -> u32,
    {
        if self.unrestricted == 0 {
            return StationId::INVALID;
        }
        let Some((end, st)) = self.upper_bound(draw(self.unrestricted)) else {
            return StationId::INVALID;
        };
        if st != excluded && st != excluded2 {
            return st;
        }

        let mut end = end;
        let mut begin = self.lower_boundary(end);
        let mut interval = end - begin;
        if interval >= self.unrestricted {
            // Only one station in the record.
            return StationId::INVALID;
        }
        let mut new_max = self.unrestricted - interval;
        let rand = draw(new_max);
        let probe = if rand < begin { rand } else { rand + interval };
        let Some((end2, st2)) = self.upper_bound(probe) else {
            return StationId::INVALID;
        };
        if st2 != excluded && st2 != excluded2 {
            return st2;
        }

        let mut end2 = end2;
        let mut begin2 = self.lower_boundary(end2);
        let mut interval2 = end2 - begin2;
        if interval2 >= new_max {
            // Only the excluded stations in the record.
            return StationId::INVALID;
        }
        new_max -= interval2;
        if begin > begin2 {
            std::mem::swap(&mut begin, &mut begin2);
            std::mem::swap(&mut end, &mut end2);
            std::mem::swap(&mut interval, &mut interval2);
        }
        let rand = draw(new_max);
        let probe = if rand < begin {
            rand
        } else if rand < begin2 - interval {
            rand + interval
        } else {
            rand + interval + interval2
        };
        self.upper_bound(probe).map_or(StationId::INVALID, |(_, st)| st)
    }

    /// First entry whose boundary is strictly greater than `value`.
    fn upper_bound(&self, value: u32) -> Option<(u32, StationId)> {
        self.shares
            .range((Bound::Excluded(value), Bound::Unbounded))
            .next()
            .map(|(&k, &v)| (k, v))
    }

    /// Boundary of the entry before the one ending at `end`, or zero.
    fn lower_boundary(&self, end: u32) -> u32 {
        self.shares.range(..end).next_back().map_or(0, |(&k, _)| k)
    }
}

fn clamp_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
