//! Choropleth data join and quantile color-scale engine.
//!
//! [`join::merge`] folds per-region aggregate counts onto a base feature
//! collection and [`scale::build`] derives the breakpoints, colors and legend
//! used to paint it. [`refresh`] runs both for each filter change and drops
//! responses that arrive after a newer request. The remaining modules make up
//! the Braille terminal map that renders the result.

pub mod braille;
pub mod config;
pub mod data;
pub mod error;
pub mod join;
pub mod map;
pub mod model;
pub mod refresh;
pub mod scale;
pub mod source;

pub use error::{ChoroplethError, Result};
pub use join::merge;
pub use model::{AggregateKey, AggregateRecord, BaseFeature, Feature, KeyFields, MergedCollection, RawCount, RegionKey};
pub use scale::{build, ColorRamp, ColorScale, Rgb};
pub use source::{AggregateSource, CaseSummary, Filter, GeometryCache, GeometrySource, HealthStatus};
