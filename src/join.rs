use crate::error::{ChoroplethError, Result};
use crate::model::{AggregateRecord, BaseFeature, Feature, KeyFields, MergedCollection, RegionKey};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Join aggregate counts onto base features.
///
/// Every base feature produces exactly one output feature, in the same order,
/// with `id` reset to its index. When several records share a key the first
/// one wins; counts are never summed. Features with no matching record get 0.
/// Records whose key names no base feature are dropped.
///
/// Fails with [`ChoroplethError::MalformedInput`] before producing anything if
/// a base feature lacks a key property or a record carries an unusable key.
pub fn merge<G>(
    base: &[BaseFeature<G>],
    aggregates: &[AggregateRecord],
    fields: &KeyFields,
) -> Result<MergedCollection<G>>
where
    G: Clone + Send + Sync,
{
    let index = index_aggregates(aggregates)?;

    // Keys are read in order so the first malformed feature is the one reported
    let keys = base
        .iter()
        .enumerate()
        .map(|(id, feature)| {
            fields.key_of(&feature.properties).map_err(|err| match err {
                ChoroplethError::MalformedInput(msg) => {
                    ChoroplethError::MalformedInput(format!("base feature {id}: {msg}"))
                }
                other => other,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let features: Vec<Feature<G>> = base
        .par_iter()
        .zip(keys)
        .enumerate()
        .map(|(id, (feature, key))| {
            let count = index.get(&key).copied().unwrap_or(0);
            Feature {
                id,
                key,
                geometry: feature.geometry.clone(),
                count,
            }
        })
        .collect();

    let known: HashSet<&RegionKey> = features.iter().map(|f| &f.key).collect();
    let dropped = index.keys().filter(|key| !known.contains(key)).count();
    if dropped > 0 {
        debug!(dropped, "aggregate keys with no matching feature");
    }
    debug!(features = features.len(), records = aggregates.len(), "merged aggregates");

    Ok(MergedCollection {
        features,
        fields: fields.clone(),
        dropped,
    })
}

/// First-wins map from region key to coerced count
fn index_aggregates(aggregates: &[AggregateRecord]) -> Result<HashMap<RegionKey, u64>> {
    let mut index = HashMap::with_capacity(aggregates.len());
    for (pos, record) in aggregates.iter().enumerate() {
        let key = record.key.resolve().map_err(|err| match err {
            ChoroplethError::MalformedInput(msg) => {
                ChoroplethError::MalformedInput(format!("aggregate record {pos}: {msg}"))
            }
            other => other,
        })?;
        index.entry(key).or_insert_with(|| record.count.as_count());
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawCount;
    use geojson::{JsonObject, JsonValue};

    fn base(keys: &[(&str, &str)]) -> Vec<BaseFeature<u32>> {
        let fields = KeyFields::default();
        keys.iter()
            .enumerate()
            .map(|(i, (p, s))| BaseFeature::keyed(&fields, &RegionKey::new(*p, *s), i as u32 * 10))
            .collect()
    }

    fn counts<G>(merged: &MergedCollection<G>) -> Vec<u64> {
        merged.counts().collect()
    }

    #[test]
    fn fills_unmatched_with_zero() {
        let b = base(&[("A", "X"), ("A", "Y")]);
        let a = vec![AggregateRecord::new("A", "X", 12u64)];
        let merged = merge(&b, &a, &KeyFields::default()).unwrap();
        assert_eq!(counts(&merged), vec![12, 0]);
        assert_eq!(merged.features[1].id, 1);
        assert_eq!(merged.features[1].geometry, 10);
    }

    #[test]
    fn first_match_wins() {
        let b = base(&[("A", "X")]);
        let a = vec![
            AggregateRecord::new("A", "X", 7u64),
            AggregateRecord::new("A", "X", 20u64),
        ];
        let merged = merge(&b, &a, &KeyFields::default()).unwrap();
        assert_eq!(counts(&merged), vec![7]);
    }

    #[test]
    fn first_match_is_coerced_even_if_later_is_valid() {
        let b = base(&[("A", "X")]);
        let a = vec![
            AggregateRecord::new("A", "X", 2.5),
            AggregateRecord::new("A", "X", 20u64),
        ];
        let merged = merge(&b, &a, &KeyFields::default()).unwrap();
        assert_eq!(counts(&merged), vec![0]);
    }

    #[test]
    fn composite_keys_join_like_pairs() {
        let b = base(&[("NCR", "Manila"), ("NCR", "Pasig")]);
        let a = vec![AggregateRecord::composite("NCR|Pasig", 4u64)];
        let merged = merge(&b, &a, &KeyFields::default()).unwrap();
        assert_eq!(counts(&merged), vec![0, 4]);
    }

    #[test]
    fn matching_is_exact() {
        let b = base(&[("NCR", "Manila")]);
        let a = vec![
            AggregateRecord::new("ncr", "manila", 9u64),
            AggregateRecord::new("NCR ", "Manila", 9u64),
        ];
        let merged = merge(&b, &a, &KeyFields::default()).unwrap();
        assert_eq!(counts(&merged), vec![0]);
        assert_eq!(merged.dropped, 2);
    }

    #[test]
    fn unknown_keys_are_dropped_quietly() {
        let b = base(&[("A", "X")]);
        let a = vec![
            AggregateRecord::new("Unknown", "Unknown", 99u64),
            AggregateRecord::new("A", "X", 1u64),
        ];
        let merged = merge(&b, &a, &KeyFields::default()).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.dropped, 1);
        assert_eq!(counts(&merged), vec![1]);
    }

    #[test]
    fn empty_inputs() {
        let merged = merge::<u32>(&[], &[AggregateRecord::new("A", "X", 1u64)], &KeyFields::default()).unwrap();
        assert!(merged.is_empty());

        let b = base(&[("A", "X"), ("B", "Y")]);
        let merged = merge(&b, &[], &KeyFields::default()).unwrap();
        assert_eq!(counts(&merged), vec![0, 0]);
    }

    #[test]
    fn missing_base_key_is_malformed() {
        let mut props = JsonObject::new();
        props.insert("region".into(), JsonValue::from("A"));
        let b = vec![BaseFeature::new(props, 0u32)];
        let err = merge(&b, &[], &KeyFields::default()).unwrap_err();
        assert!(matches!(err, ChoroplethError::MalformedInput(_)));
    }

    #[test]
    fn first_malformed_feature_is_reported() {
        let mut b = base(&vec![("A", "X"); 1000]);
        for id in [900, 1, 512] {
            b[id].properties.remove("province");
        }
        for _ in 0..20 {
            let err = merge(&b, &[], &KeyFields::default()).unwrap_err();
            assert!(
                matches!(&err, ChoroplethError::MalformedInput(msg) if msg.starts_with("base feature 1:")),
                "{err}"
            );
        }
    }

    #[test]
    fn malformed_composite_fails_whole_merge() {
        let b = base(&[("A", "X")]);
        let a = vec![
            AggregateRecord::new("A", "X", 1u64),
            AggregateRecord::composite("no-separator", RawCount::Integer(3)),
        ];
        let err = merge(&b, &a, &KeyFields::default()).unwrap_err();
        assert!(matches!(err, ChoroplethError::MalformedInput(msg) if msg.contains("record 1")));
    }

    #[test]
    fn merge_is_idempotent() {
        let b = base(&[("A", "X"), ("A", "Y"), ("B", "Z")]);
        let a = vec![
            AggregateRecord::new("B", "Z", 3u64),
            AggregateRecord::new("A", "X", 5u64),
        ];
        let first = merge(&b, &a, &KeyFields::default()).unwrap();
        let second = merge(&b, &a, &KeyFields::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn custom_key_fields() {
        let fields = KeyFields::new("regionResGeo", "provResGeo");
        let b = vec![BaseFeature::keyed(&fields, &RegionKey::new("R1", "P1"), ())];
        let a = vec![AggregateRecord::new("R1", "P1", 8u64)];
        assert!(merge(&b, &a, &KeyFields::default()).is_err());
        let merged = merge(&b, &a, &fields).unwrap();
        assert_eq!(counts(&merged), vec![8]);
    }
}
