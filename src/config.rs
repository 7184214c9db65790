//! Link graph settings and resource limits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DistError, DistResult, ValidationError};
use crate::types::{CargoId, NodeId, INVALID_NODE};

/// How cargo of one type is distributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionType {
    /// Cargo goes wherever the next vehicle takes it.
    #[default]
    Manual,
    /// Demand is calculated per direction.
    Asymmetric,
    /// Demand is calculated symmetrically between hub pairs.
    Symmetric,
}

impl DistributionType {
    /// Returns true for the automatic modes.
    #[must_use]
    pub const fn is_automatic(self) -> bool {
        !matches!(self, Self::Manual)
    }
}

/// Decides the distribution mode of a cargo type at reconciliation time.
///
/// The mode taxonomy belongs to the gameplay layer; the engine only asks.
pub trait DistributionPolicy: Send + Sync {
    /// Returns the distribution mode for `cargo`.
    fn distribution_type(&self, cargo: CargoId) -> DistributionType;
}

/// Link graph settings.
///
/// Every job keeps the copy that was current when it was spawned, so a
/// settings change never affects a running computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkGraphSettings {
    /// Days between two job spawns. Jobs are joined halfway through.
    pub recalc_interval: u16,
    /// Days a job may run before it is joined.
    pub recalc_time: u16,
    /// Distribution mode for cargo types without an override.
    pub distribution_default: DistributionType,
    /// Per-cargo distribution overrides.
    pub distribution_overrides: BTreeMap<CargoId, DistributionType>,
    /// Accuracy of the flow solver. Read by external stages.
    pub accuracy: u8,
    /// Influence of distance on demand, in percent. Read by external stages.
    pub demand_distance: u8,
    /// Influence of supply size on symmetric demand, in percent. Read by external stages.
    pub demand_size: u8,
    /// Saturation of short paths before longer ones are used, in percent.
    pub short_path_saturation: u8,
    /// Run jobs on worker threads. When false, jobs run inline at spawn time.
    pub threaded: bool,
    /// Ask the simulation to pause while a due job is still computing.
    pub pause_on_join: bool,
}

impl Default for LinkGraphSettings {
    fn default() -> Self {
        Self {
            recalc_interval: 4,
            recalc_time: 16,
            distribution_default: DistributionType::Manual,
            distribution_overrides: BTreeMap::new(),
            accuracy: 16,
            demand_distance: 100,
            demand_size: 100,
            short_path_saturation: 80,
            threaded: true,
            pause_on_join: true,
        }
    }
}

impl LinkGraphSettings {
    /// Parses settings from JSON. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the JSON is malformed or the parsed
    /// settings fail [`validate`](Self::validate).
    pub fn from_json(json: &str) -> DistResult<Self> {
        let settings: Self = serde_json::from_str(json).map_err(|e| {
            DistError::from(ValidationError::InvalidSetting {
                setting: "<document>".to_string(),
                reason: e.to_string(),
            })
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.recalc_interval < 2 {
            return Err(invalid("recalc_interval", "must be >= 2"));
        }
        if self.recalc_time == 0 {
            return Err(invalid("recalc_time", "must be > 0"));
        }
        if self.accuracy == 0 {
            return Err(invalid("accuracy", "must be > 0"));
        }
        if self.short_path_saturation == 0 {
            return Err(invalid("short_path_saturation", "must be > 0"));
        }
        Ok(())
    }

    /// Sets the distribution mode for one cargo type.
    #[must_use]
    pub fn with_distribution(mut self, cargo: CargoId, mode: DistributionType) -> Self {
        self.distribution_overrides.insert(cargo, mode);
        self
    }

    /// Recalculation interval in days, as a signed day count.
    #[must_use]
    pub fn recalc_interval_days(&self) -> i32 {
        i32::from(self.recalc_interval.max(1))
    }

    /// Job runtime in days, as a signed day count.
    #[must_use]
    pub fn recalc_time_days(&self) -> i32 {
        i32::from(self.recalc_time.max(1))
    }
}

impl DistributionPolicy for LinkGraphSettings {
    fn distribution_type(&self, cargo: CargoId) -> DistributionType {
        self.distribution_overrides
            .get(&cargo)
            .copied()
            .unwrap_or(self.distribution_default)
    }
}

fn invalid(setting: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidSetting {
        setting: setting.to_string(),
        reason: reason.to_string(),
    }
}

/// Identifier budgets.
///
/// Exceeding the hub budget is fatal. The graph budget is checked before a
/// graph is created and a full pool just leaves the link untracked. The job
/// budget must cover every graph that can be running at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkLimits {
    /// Maximum number of live link graphs.
    pub max_graphs: usize,
    /// Maximum number of jobs in flight.
    pub max_jobs: usize,
    /// Maximum number of hubs per graph.
    pub max_hubs: usize,
}

impl Default for NetworkLimits {
    fn default() -> Self {
        Self {
            max_graphs: 0xFFFF,
            max_jobs: 0xFFFF,
            max_hubs: usize::from(INVALID_NODE),
        }
    }
}

impl NetworkLimits {
    /// Validate limits against the identifier widths.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_limit("max_graphs", self.max_graphs, 0xFFFF)?;
        check_limit("max_jobs", self.max_jobs, 0xFFFF)?;
        check_limit("max_hubs", self.max_hubs, usize::from(NodeId::MAX))?;
        Ok(())
    }
}

fn check_limit(limit: &str, actual: usize, max: usize) -> Result<(), ValidationError> {
    if actual == 0 || actual > max {
        return Err(ValidationError::LimitOutOfRange {
            limit: limit.to_string(),
            max,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        LinkGraphSettings::default().validate().unwrap();
        NetworkLimits::default().validate().unwrap();
    }

    #[test]
    fn settings_reject_zero_values() {
        let mut s = LinkGraphSettings::default();
        s.recalc_interval = 0;
        assert!(s.validate().is_err());

        let mut s = LinkGraphSettings::default();
        s.recalc_time = 0;
        assert!(s.validate().is_err());

        let mut s = LinkGraphSettings::default();
        s.accuracy = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn limits_reject_out_of_range() {
        let mut l = NetworkLimits::default();
        l.max_graphs = 0;
        assert!(l.validate().is_err());

        let mut l = NetworkLimits::default();
        l.max_hubs = 70_000;
        assert!(l.validate().is_err());
    }

    #[test]
    fn from_json_fills_defaults() {
        let s = LinkGraphSettings::from_json(r#"{"recalc_interval": 8, "distribution_default": "asymmetric"}"#)
            .unwrap();
        assert_eq!(s.recalc_interval, 8);
        assert_eq!(s.recalc_time, 16);
        assert_eq!(s.distribution_default, DistributionType::Asymmetric);
    }

    #[test]
    fn from_json_rejects_invalid() {
        let err = LinkGraphSettings::from_json(r#"{"recalc_time": 0}"#).unwrap_err();
        assert!(err.is_validation());
        let err = LinkGraphSettings::from_json("not json").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn overrides_take_precedence() {
        let s = LinkGraphSettings::default().with_distribution(CargoId(3), DistributionType::Symmetric);
        assert_eq!(s.distribution_type(CargoId(3)), DistributionType::Symmetric);
        assert_eq!(s.distribution_type(CargoId(4)), DistributionType::Manual);
        assert!(s.distribution_type(CargoId(3)).is_automatic());
    }
}
