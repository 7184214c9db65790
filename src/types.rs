//! Identifiers and small value types shared across the crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of a hub inside one [`GraphStore`](crate::graph::GraphStore).
///
/// Only meaningful together with the graph it was handed out by. Indices are
/// reused after a hub is removed.
pub type NodeId = u16;

/// Sentinel for "no hub".
pub const INVALID_NODE: NodeId = NodeId::MAX;

/// Identity of a real-world station mirrored by a hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StationId(pub u16);

impl StationId {
    /// Sentinel station. Used as the next hop for cargo consumed locally.
    pub const INVALID: Self = Self(u16::MAX);

    /// Returns true unless this is [`StationId::INVALID`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != u16::MAX
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "station#{}", self.0)
        } else {
            f.write_str("station#invalid")
        }
    }
}

/// Cargo type. Every cargo type has its own set of link graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CargoId(pub u8);

impl fmt::Display for CargoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cargo#{}", self.0)
    }
}

/// Identity of a live link graph in the [`GraphPool`](crate::graph::GraphPool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphId(pub u16);

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph#{}", self.0)
    }
}

/// Identity of a computation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u16);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// Map position of a station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl Position {
    /// Creates a position.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to `other`.
    #[must_use]
    pub const fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Larger axis distance counted twice plus the smaller one.
    ///
    /// Used as the leg length when rating paths: diagonal-ish links are
    /// punished less than with a plain Manhattan metric.
    #[must_use]
    pub const fn max_plus_manhattan(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        if dx > dy {
            dx * 2 + dy
        } else {
            dy * 2 + dx
        }
    }
}
