use crate::error::ChoroplethError;
use crate::model::{AggregateKey, AggregateRecord, BaseFeature, KeyFields, RawCount, RegionKey};
use crate::source::{AggregateSource, CaseSummary, Filter, GeometrySource, HealthStatus};
use anyhow::{bail, Context, Result};
use geojson::{GeoJson, Geometry, JsonObject, JsonValue, Value};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Geometry payload carried through the join for GeoJSON inputs
pub type Geo = Option<Geometry>;

/// Base geometry read from a GeoJSON FeatureCollection on disk
pub struct GeoJsonGeometrySource {
    path: PathBuf,
}

impl GeoJsonGeometrySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl GeometrySource<Geo> for GeoJsonGeometrySource {
    fn load(&self) -> Result<Vec<BaseFeature<Geo>>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading geometry {}", self.path.display()))?;
        parse_features(&content).with_context(|| format!("parsing geometry {}", self.path.display()))
    }
}

/// Split GeoJSON text into base features; properties default to empty.
pub fn parse_features(content: &str) -> Result<Vec<BaseFeature<Geo>>> {
    let geojson: GeoJson = content.parse()?;
    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => bail!("expected a Feature or FeatureCollection, found a bare geometry"),
    };

    Ok(features
        .into_iter()
        .map(|f| BaseFeature::new(f.properties.unwrap_or_default(), f.geometry))
        .collect())
}

/// On-disk case table: one record list per status, optionally per date
#[derive(Debug, Default, Deserialize)]
pub struct CaseTable {
    #[serde(default)]
    pub summary: Option<CaseSummary>,
    #[serde(default)]
    pub dates: HashMap<String, HashMap<String, Vec<JsonObject>>>,
    #[serde(flatten)]
    pub statuses: HashMap<String, Vec<JsonObject>>,
}

impl CaseTable {
    /// Raw record objects for a filter; unknown statuses and dates are empty.
    pub fn rows(&self, filter: &Filter) -> &[JsonObject] {
        let tables = match &filter.as_of {
            Some(date) => match self.dates.get(date) {
                Some(tables) => tables,
                None => return &[],
            },
            None => &self.statuses,
        };
        tables
            .get(filter.status.key())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Parse a case table with simd-json. The buffer is used as scratch space.
pub fn parse_case_table(bytes: &mut [u8]) -> Result<CaseTable> {
    let table: CaseTable = simd_json::serde::from_slice(bytes)?;
    Ok(table)
}

/// Turn one raw row into a record, honouring `_id` composite keys.
pub fn record_from_row(row: &JsonObject, fields: &KeyFields) -> std::result::Result<AggregateRecord, ChoroplethError> {
    let key = match row.get("_id") {
        Some(JsonValue::String(id)) => AggregateKey::Composite(id.clone()),
        Some(JsonValue::Null) | None => AggregateKey::Pair(fields.key_of(row)?),
        Some(other) => {
            return Err(ChoroplethError::MalformedInput(format!(
                "_id is not a string: {other}"
            )))
        }
    };
    let count = row.get("count").map(RawCount::from).unwrap_or(RawCount::Invalid);
    Ok(AggregateRecord { key, count })
}

/// Aggregate records read fresh from a JSON file on every fetch
pub struct FileAggregateSource {
    path: PathBuf,
    fields: KeyFields,
}

impl FileAggregateSource {
    pub fn new(path: impl Into<PathBuf>, fields: KeyFields) -> Self {
        Self {
            path: path.into(),
            fields,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<CaseTable> {
        let mut bytes = fs::read(&self.path)
            .with_context(|| format!("reading cases {}", self.path.display()))?;
        parse_case_table(&mut bytes).with_context(|| format!("parsing cases {}", self.path.display()))
    }
}

impl AggregateSource for FileAggregateSource {
    fn fetch(&self, filter: &Filter) -> Result<Vec<AggregateRecord>> {
        let table = self.read()?;
        let rows = table.rows(filter);
        if rows.is_empty() {
            warn!(status = %filter.status, as_of = ?filter.as_of, "no case rows for filter");
        }
        let records = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                record_from_row(row, &self.fields).with_context(|| format!("case row {i} for {}", filter.status))
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(records = records.len(), status = %filter.status, "fetched cases");
        Ok(records)
    }

    fn summary(&self) -> Result<Option<CaseSummary>> {
        Ok(self.read()?.summary)
    }
}

/// In-memory aggregate source keyed by status
#[derive(Debug, Clone, Default)]
pub struct MemoryAggregateSource {
    tables: HashMap<HealthStatus, Vec<AggregateRecord>>,
    summary: Option<CaseSummary>,
}

impl MemoryAggregateSource {
    pub fn with(mut self, status: HealthStatus, records: Vec<AggregateRecord>) -> Self {
        self.tables.insert(status, records);
        self
    }

    pub fn with_summary(mut self, summary: CaseSummary) -> Self {
        self.summary = Some(summary);
        self
    }
}

impl AggregateSource for MemoryAggregateSource {
    fn fetch(&self, filter: &Filter) -> Result<Vec<AggregateRecord>> {
        Ok(self.tables.get(&filter.status).cloned().unwrap_or_default())
    }

    fn summary(&self) -> Result<Option<CaseSummary>> {
        Ok(self.summary.clone())
    }
}

/// Geometry source over features already in memory
pub struct StaticGeometrySource {
    features: Vec<BaseFeature<Geo>>,
}

impl StaticGeometrySource {
    pub fn new(features: Vec<BaseFeature<Geo>>) -> Self {
        Self { features }
    }
}

impl GeometrySource<Geo> for StaticGeometrySource {
    fn load(&self) -> Result<Vec<BaseFeature<Geo>>> {
        Ok(self.features.clone())
    }
}

/// (region, province, west, south, east, north)
const DEMO_PROVINCES: &[(&str, &str, f64, f64, f64, f64)] = &[
    ("Region I", "Pangasinan", 119.8, 15.7, 120.9, 16.4),
    ("Region III", "Bulacan", 120.6, 14.7, 121.3, 15.2),
    ("Region III", "Pampanga", 120.4, 14.8, 120.8, 15.3),
    ("NCR", "Manila", 120.95, 14.55, 121.05, 14.65),
    ("NCR", "Quezon City", 121.0, 14.6, 121.15, 14.78),
    ("Region IV-A", "Cavite", 120.6, 14.1, 121.0, 14.5),
    ("Region IV-A", "Laguna", 121.0, 14.0, 121.6, 14.5),
    ("Region IV-A", "Batangas", 120.6, 13.5, 121.4, 14.1),
    ("Region VI", "Iloilo", 122.0, 10.5, 123.0, 11.5),
    ("Region VII", "Cebu", 123.3, 9.5, 124.1, 11.3),
    ("Region VII", "Bohol", 123.7, 9.6, 124.6, 10.2),
    ("Region XI", "Davao del Sur", 125.0, 6.4, 125.7, 7.4),
];

/// Small built-in dataset used when no files are given
pub fn demo_dataset(fields: &KeyFields) -> (Vec<BaseFeature<Geo>>, MemoryAggregateSource) {
    let features = DEMO_PROVINCES
        .iter()
        .map(|&(region, province, w, s, e, n)| {
            let ring = vec![vec![w, s], vec![e, s], vec![e, n], vec![w, n], vec![w, s]];
            let geometry = Geometry::new(Value::Polygon(vec![ring]));
            BaseFeature::keyed(fields, &RegionKey::new(region, province), Some(geometry))
        })
        .collect();

    // Right-skewed: a couple of hot spots, most provinces near zero.
    let all: [u64; 12] = [14, 220, 35, 1830, 960, 410, 388, 51, 6, 740, 0, 97];
    let mut source = MemoryAggregateSource::default();
    for (s, status) in HealthStatus::ALL.iter().enumerate() {
        let mut records: Vec<AggregateRecord> = DEMO_PROVINCES
            .iter()
            .zip(all)
            .enumerate()
            .filter_map(|(i, (&(region, province, ..), total))| {
                let count = if s == 0 { total } else { total * ((i + s) % 5) as u64 / (3 + s as u64) };
                (count > 0).then(|| AggregateRecord::new(region, province, count))
            })
            .collect();
        records.push(AggregateRecord::new("Unknown", "Unknown", 25u64));
        source = source.with(*status, records);
    }

    let summary = CaseSummary {
        new_active: 412,
        active: 2_118,
        recovered: 2_390,
        died: 243,
        max_date: Some("2021-03-18".to_string()),
    };
    (features, source.with_summary(summary))
}
