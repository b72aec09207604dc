use crate::error::{ChoroplethError, Result};
use geojson::feature::Id;
use geojson::{Feature as GeoFeature, FeatureCollection, Geometry, JsonObject, JsonValue};
use std::fmt;

/// Separator between the two halves of a composite region key string.
pub const COMPOSITE_SEPARATOR: char = '|';

/// Composite identifier joining aggregate data to geometry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionKey {
    pub primary: String,
    pub secondary: String,
}

impl RegionKey {
    pub fn new(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }

    /// Split `"primary|secondary"` on the first separator.
    pub fn parse_composite(raw: &str) -> Result<Self> {
        raw.split_once(COMPOSITE_SEPARATOR)
            .map(|(primary, secondary)| Self::new(primary, secondary))
            .ok_or_else(|| {
                ChoroplethError::MalformedInput(format!(
                    "composite key {raw:?} has no '{COMPOSITE_SEPARATOR}' separator"
                ))
            })
    }

    pub fn composite(&self) -> String {
        format!("{}{}{}", self.primary, COMPOSITE_SEPARATOR, self.secondary)
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.secondary, self.primary)
    }
}

/// Key carried by an aggregate record, either already split or as one string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AggregateKey {
    Pair(RegionKey),
    Composite(String),
}

impl AggregateKey {
    pub fn resolve(&self) -> Result<RegionKey> {
        match self {
            AggregateKey::Pair(key) => Ok(key.clone()),
            AggregateKey::Composite(raw) => RegionKey::parse_composite(raw),
        }
    }
}

/// Count value exactly as the aggregate source delivered it
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawCount {
    Integer(i64),
    Number(f64),
    Invalid,
}

impl RawCount {
    /// Integral, non-negative counts pass through; everything else is 0.
    pub fn as_count(&self) -> u64 {
        match *self {
            RawCount::Integer(n) => u64::try_from(n).unwrap_or(0),
            RawCount::Number(x) if x.is_finite() && x >= 0.0 && x.fract() == 0.0 => {
                if x <= u64::MAX as f64 {
                    x as u64
                } else {
                    0
                }
            }
            _ => 0,
        }
    }
}

impl From<u64> for RawCount {
    fn from(n: u64) -> Self {
        i64::try_from(n).map_or(RawCount::Number(n as f64), RawCount::Integer)
    }
}

impl From<f64> for RawCount {
    fn from(x: f64) -> Self {
        RawCount::Number(x)
    }
}

impl From<&JsonValue> for RawCount {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Number(n) => n
                .as_i64()
                .map(RawCount::Integer)
                .or_else(|| n.as_f64().map(RawCount::Number))
                .unwrap_or(RawCount::Invalid),
            _ => RawCount::Invalid,
        }
    }
}

/// One `(regionKey, count)` row returned by an aggregate source
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRecord {
    pub key: AggregateKey,
    pub count: RawCount,
}

impl AggregateRecord {
    pub fn new(primary: impl Into<String>, secondary: impl Into<String>, count: impl Into<RawCount>) -> Self {
        Self {
            key: AggregateKey::Pair(RegionKey::new(primary, secondary)),
            count: count.into(),
        }
    }

    pub fn composite(key: impl Into<String>, count: impl Into<RawCount>) -> Self {
        Self {
            key: AggregateKey::Composite(key.into()),
            count: count.into(),
        }
    }
}

/// Names of the feature properties holding the two halves of the region key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFields {
    pub primary: String,
    pub secondary: String,
}

impl KeyFields {
    pub fn new(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }

    /// Read the region key out of a property object.
    pub fn key_of(&self, properties: &JsonObject) -> Result<RegionKey> {
        let field = |name: &str| -> Result<String> {
            match properties.get(name) {
                Some(JsonValue::String(s)) => Ok(s.clone()),
                Some(other) => Err(ChoroplethError::MalformedInput(format!(
                    "key property {name:?} is not a string: {other}"
                ))),
                None => Err(ChoroplethError::MalformedInput(format!(
                    "missing key property {name:?}"
                ))),
            }
        };
        Ok(RegionKey {
            primary: field(&self.primary)?,
            secondary: field(&self.secondary)?,
        })
    }
}

impl Default for KeyFields {
    fn default() -> Self {
        Self::new("region", "province")
    }
}

/// Feature as delivered by the base geometry source, before the join
#[derive(Debug, Clone, PartialEq)]
pub struct BaseFeature<G> {
    pub properties: JsonObject,
    pub geometry: G,
}

impl<G> BaseFeature<G> {
    pub fn new(properties: JsonObject, geometry: G) -> Self {
        Self { properties, geometry }
    }

    /// Convenience constructor keyed with the given field names.
    pub fn keyed(fields: &KeyFields, key: &RegionKey, geometry: G) -> Self {
        let mut properties = JsonObject::new();
        properties.insert(fields.primary.clone(), JsonValue::from(key.primary.as_str()));
        properties.insert(fields.secondary.clone(), JsonValue::from(key.secondary.as_str()));
        Self { properties, geometry }
    }
}

/// A base feature annotated with its joined count
#[derive(Debug, Clone, PartialEq)]
pub struct Feature<G> {
    /// Position in the base collection for this render pass
    pub id: usize,
    pub key: RegionKey,
    pub geometry: G,
    pub count: u64,
}

/// Output of one merge pass, in base-geometry order
#[derive(Debug, Clone, PartialEq)]
pub struct MergedCollection<G> {
    pub features: Vec<Feature<G>>,
    pub fields: KeyFields,
    /// Aggregate keys that matched no base feature
    pub dropped: usize,
}

impl<G> MergedCollection<G> {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Feature<G>> {
        self.features.get(id)
    }

    pub fn counts(&self) -> impl Iterator<Item = u64> + '_ {
        self.features.iter().map(|f| f.count)
    }

    pub fn total(&self) -> u64 {
        self.counts().fold(0u64, |acc, c| acc.saturating_add(c))
    }

    /// Features with a non-zero count
    pub fn reporting(&self) -> usize {
        self.features.iter().filter(|f| f.count > 0).count()
    }
}

impl MergedCollection<Option<Geometry>> {
    /// Export as GeoJSON with numeric ids and `{primary, secondary, count}` properties.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .features
            .iter()
            .map(|f| {
                let mut properties = JsonObject::new();
                properties.insert(self.fields.primary.clone(), JsonValue::from(f.key.primary.as_str()));
                properties.insert(self.fields.secondary.clone(), JsonValue::from(f.key.secondary.as_str()));
                properties.insert("count".to_string(), JsonValue::from(f.count));
                GeoFeature {
                    bbox: None,
                    geometry: f.geometry.clone(),
                    id: Some(Id::Number(f.id.into())),
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_splits_on_first_separator() {
        let key = RegionKey::parse_composite("NCR|Manila|East").unwrap();
        assert_eq!(key, RegionKey::new("NCR", "Manila|East"));
        assert_eq!(RegionKey::new("A", "X").composite(), "A|X");
    }

    #[test]
    fn composite_without_separator_is_malformed() {
        let err = RegionKey::parse_composite("NCR").unwrap_err();
        assert!(matches!(err, ChoroplethError::MalformedInput(_)));
    }

    #[test]
    fn raw_count_coercion() {
        assert_eq!(RawCount::Integer(12).as_count(), 12);
        assert_eq!(RawCount::Integer(-3).as_count(), 0);
        assert_eq!(RawCount::Number(7.0).as_count(), 7);
        assert_eq!(RawCount::Number(7.5).as_count(), 0);
        assert_eq!(RawCount::Number(f64::NAN).as_count(), 0);
        assert_eq!(RawCount::Invalid.as_count(), 0);
        assert_eq!(RawCount::from(&JsonValue::from("12")).as_count(), 0);
        assert_eq!(RawCount::from(&serde_json::json!(4)).as_count(), 4);
    }

    #[test]
    fn key_fields_reject_missing_and_non_string() {
        let fields = KeyFields::default();
        let mut props = JsonObject::new();
        props.insert("region".into(), JsonValue::from("NCR"));
        assert!(fields.key_of(&props).is_err());

        props.insert("province".into(), JsonValue::from(3));
        assert!(fields.key_of(&props).is_err());

        props.insert("province".into(), JsonValue::from("Manila"));
        assert_eq!(fields.key_of(&props).unwrap(), RegionKey::new("NCR", "Manila"));
    }

    #[test]
    fn export_carries_ids_and_counts() {
        let merged = MergedCollection {
            features: vec![Feature {
                id: 0,
                key: RegionKey::new("A", "X"),
                geometry: None,
                count: 12,
            }],
            fields: KeyFields::default(),
            dropped: 0,
        };
        let fc = merged.to_feature_collection();
        let props = fc.features[0].properties.as_ref().unwrap();
        assert_eq!(props.get("count"), Some(&JsonValue::from(12u64)));
        assert_eq!(props.get("region"), Some(&JsonValue::from("A")));
        assert_eq!(fc.features[0].id, Some(Id::Number(0u64.into())));
    }
}
