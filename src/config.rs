use crate::data::{demo_dataset, FileAggregateSource, Geo, GeoJsonGeometrySource, StaticGeometrySource};
use crate::model::KeyFields;
use crate::scale::ColorRamp;
use crate::source::{AggregateSource, Filter, GeometrySource};
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Runtime settings, filled from the command line
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// GeoJSON FeatureCollection; `None` together with `cases` selects the demo
    pub geometry: Option<PathBuf>,
    pub cases: Option<PathBuf>,
    pub fields: KeyFields,
    pub filter: Filter,
    pub ramp: ColorRamp,
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn uses_demo(&self) -> bool {
        self.geometry.is_none() && self.cases.is_none()
    }

    /// Build the geometry and aggregate collaborators this config points at.
    pub fn open_sources(&self) -> Result<(Box<dyn GeometrySource<Geo>>, Arc<dyn AggregateSource>)> {
        match (&self.geometry, &self.cases) {
            (Some(geometry), Some(cases)) => {
                info!(geometry = %geometry.display(), cases = %cases.display(), "using file sources");
                let geometry: Box<dyn GeometrySource<Geo>> = Box::new(GeoJsonGeometrySource::new(geometry));
                let cases: Arc<dyn AggregateSource> =
                    Arc::new(FileAggregateSource::new(cases, self.fields.clone()));
                Ok((geometry, cases))
            }
            (None, None) => {
                info!("no data files given, using built-in demo dataset");
                let (features, source) = demo_dataset(&self.fields);
                let geometry: Box<dyn GeometrySource<Geo>> = Box::new(StaticGeometrySource::new(features));
                let cases: Arc<dyn AggregateSource> = Arc::new(source);
                Ok((geometry, cases))
            }
            (Some(_), None) => bail!("--geometry needs --cases"),
            (None, Some(_)) => bail!("--cases needs --geometry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::HealthStatus;

    #[test]
    fn default_config_opens_demo() {
        let config = Config::default();
        assert!(config.uses_demo());
        let (geometry, cases) = config.open_sources().unwrap();
        assert!(!geometry.load().unwrap().is_empty());
        assert!(!cases.fetch(&Filter::new(HealthStatus::All)).unwrap().is_empty());
    }

    #[test]
    fn half_configured_files_are_rejected() {
        let config = Config {
            geometry: Some("provinces.geojson".into()),
            ..Config::default()
        };
        assert!(config.open_sources().is_err());
    }
}
