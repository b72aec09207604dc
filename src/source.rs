use crate::error::ChoroplethError;
use crate::model::{AggregateRecord, BaseFeature};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Case status category a filter selects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HealthStatus {
    #[default]
    All,
    Active,
    Recovered,
    Asymptomatic,
    Mild,
    Severe,
    Critical,
    Died,
}

impl HealthStatus {
    pub const ALL: [HealthStatus; 8] = [
        HealthStatus::All,
        HealthStatus::Active,
        HealthStatus::Recovered,
        HealthStatus::Asymptomatic,
        HealthStatus::Mild,
        HealthStatus::Severe,
        HealthStatus::Critical,
        HealthStatus::Died,
    ];

    /// Key used by aggregate sources for this status
    pub fn key(self) -> &'static str {
        match self {
            HealthStatus::All => "all",
            HealthStatus::Active => "active",
            HealthStatus::Recovered => "recovered",
            HealthStatus::Asymptomatic => "asymptomatic",
            HealthStatus::Mild => "mild",
            HealthStatus::Severe => "severe",
            HealthStatus::Critical => "critical",
            HealthStatus::Died => "died",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HealthStatus::All => "All",
            HealthStatus::Active => "Active",
            HealthStatus::Recovered => "Recovered",
            HealthStatus::Asymptomatic => "Asymptomatic",
            HealthStatus::Mild => "Mild",
            HealthStatus::Severe => "Severe",
            HealthStatus::Critical => "Critical",
            HealthStatus::Died => "Deaths",
        }
    }

    fn position(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.position() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.position() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for HealthStatus {
    type Err = ChoroplethError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        if wanted.is_empty() {
            return Ok(HealthStatus::All);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.key().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ChoroplethError::InvalidConfiguration(format!("unknown health status {s:?}")))
    }
}

/// Criterion passed to the aggregate source
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Filter {
    pub status: HealthStatus,
    /// ISO date; interpreted by the source only
    pub as_of: Option<String>,
}

impl Filter {
    pub fn new(status: HealthStatus) -> Self {
        Self { status, as_of: None }
    }

    pub fn with_as_of(mut self, as_of: impl Into<String>) -> Self {
        self.as_of = Some(as_of.into());
        self
    }
}

/// Headline totals shown next to the map
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseSummary {
    pub new_active: u64,
    pub active: u64,
    pub recovered: u64,
    pub died: u64,
    /// Latest report date the totals cover
    #[serde(alias = "maxDate")]
    pub max_date: Option<String>,
}

impl CaseSummary {
    /// Active + recovered + died
    pub fn total(&self) -> u64 {
        self.active.saturating_add(self.recovered).saturating_add(self.died)
    }
}

/// Returns `(regionKey, count)` records for a filter. Results are never cached.
pub trait AggregateSource: Send + Sync {
    fn fetch(&self, filter: &Filter) -> Result<Vec<AggregateRecord>>;

    fn summary(&self) -> Result<Option<CaseSummary>> {
        Ok(None)
    }
}

/// Returns the static base feature collection.
pub trait GeometrySource<G>: Send + Sync {
    fn load(&self) -> Result<Vec<BaseFeature<G>>>;
}

/// Caller-owned cache of the base geometry, loaded at most once per session
pub struct GeometryCache<G> {
    features: Option<Arc<Vec<BaseFeature<G>>>>,
}

impl<G> GeometryCache<G> {
    pub fn new() -> Self {
        Self { features: None }
    }

    pub fn get_or_load(&mut self, source: &dyn GeometrySource<G>) -> Result<Arc<Vec<BaseFeature<G>>>> {
        if let Some(features) = &self.features {
            return Ok(Arc::clone(features));
        }
        let features = Arc::new(source.load()?);
        info!(features = features.len(), "loaded base geometry");
        self.features = Some(Arc::clone(&features));
        Ok(features)
    }

    pub fn is_loaded(&self) -> bool {
        self.features.is_some()
    }

    pub fn invalidate(&mut self) {
        self.features = None;
    }
}

impl<G> Default for GeometryCache<G> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        loads: AtomicUsize,
    }

    impl GeometrySource<()> for Counting {
        fn load(&self) -> Result<Vec<BaseFeature<()>>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(vec![BaseFeature::new(Default::default(), ())])
        }
    }

    #[test]
    fn geometry_loads_once() {
        let source = Counting { loads: AtomicUsize::new(0) };
        let mut cache: GeometryCache<()> = GeometryCache::new();
        assert!(!cache.is_loaded());
        let a = cache.get_or_load(&source).unwrap();
        let b = cache.get_or_load(&source).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);

        cache.invalidate();
        cache.get_or_load(&source).unwrap();
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn summary_total_saturates() {
        let summary = CaseSummary {
            active: 40,
            recovered: 100,
            died: 2,
            ..CaseSummary::default()
        };
        assert_eq!(summary.total(), 142);
        let huge = CaseSummary {
            active: u64::MAX,
            died: 1,
            ..CaseSummary::default()
        };
        assert_eq!(huge.total(), u64::MAX);
    }

    #[test]
    fn status_parsing_and_cycling() {
        assert_eq!("".parse::<HealthStatus>().unwrap(), HealthStatus::All);
        assert_eq!("Died".parse::<HealthStatus>().unwrap(), HealthStatus::Died);
        assert!("zombie".parse::<HealthStatus>().is_err());
        assert_eq!(HealthStatus::Died.next(), HealthStatus::All);
        assert_eq!(HealthStatus::All.prev(), HealthStatus::Died);
        assert_eq!(HealthStatus::Active.next().prev(), HealthStatus::Active);
    }
}
