use crate::domain::errors::ValuationError;
use crate::domain::property::{PropertyAttributes, PropertyType};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::warn;

/// Ordered list of feature names.
/// This order MUST match exactly with the order used by the training
/// pipeline. Any change here is a breaking change for the model artifacts and
/// must be accompanied by a new model version tag.
pub const FEATURE_NAMES: &[&str] = &[
    "square_feet",
    "num_floors",
    "num_units",
    "parking_spots",
    "occupancy_rate",
    "annual_revenue",
    "annual_expenses",
    "net_operating_income",
    "cap_rate",
    "walk_score",
    "transit_score",
    "building_age",
    "distance_to_downtown",
    "city_index",
    "type_office",
    "type_retail",
    "type_industrial",
    "type_multifamily",
    "type_hotel",
    "type_mixed_use",
];

pub const IDX_SQUARE_FEET: usize = 0;
pub const IDX_NET_OPERATING_INCOME: usize = 7;
pub const IDX_CAP_RATE: usize = 8;

/// City vocabulary frozen at training time, ordinal-encoded.
/// Cities outside the vocabulary map to the "other" bucket (index = len) so
/// the engine stays available for unseen markets instead of rejecting them.
pub const CITY_VOCABULARY: &[&str] = &[
    "New York",
    "Los Angeles",
    "Chicago",
    "Houston",
    "Phoenix",
    "Philadelphia",
    "San Antonio",
    "San Diego",
    "Dallas",
    "San Jose",
    "Austin",
    "Seattle",
    "Denver",
    "Boston",
    "Miami",
];

/// Inputs are rounded to this precision before hashing so that field-wise
/// equal attributes produce byte-identical canonical encodings.
const CANONICAL_PRECISION: f64 = 1e6;

/// Fixed-order numeric encoding of one property.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Canonical byte representation: big-endian IEEE-754 bits of each
    /// rounded value, in registry order.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.values.len() * 8);
        for v in &self.values {
            bytes.extend_from_slice(&v.to_bits().to_be_bytes());
        }
        bytes
    }
}

/// Deterministic digest identifying an equivalence class of inputs for
/// caching. Includes the active model version tag, so redeploying estimators
/// naturally invalidates stale cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn round_canonical(value: f64) -> f64 {
    (value * CANONICAL_PRECISION).round() / CANONICAL_PRECISION
}

fn city_index(city: &str) -> usize {
    let normalized = city.trim();
    match CITY_VOCABULARY
        .iter()
        .position(|c| c.eq_ignore_ascii_case(normalized))
    {
        Some(idx) => idx,
        None => {
            warn!(
                "City '{}' not in training vocabulary, mapping to 'other' bucket",
                normalized
            );
            CITY_VOCABULARY.len()
        }
    }
}

/// Validate attributes and encode them into a feature vector plus cache
/// fingerprint. Never clamps: out-of-domain values fail with `InvalidInput`.
pub fn build(
    attrs: &PropertyAttributes,
    model_version: &str,
) -> Result<(FeatureVector, Fingerprint), ValuationError> {
    attrs.validate()?;

    let mut values = vec![
        attrs.square_feet,
        attrs.num_floors,
        attrs.num_units,
        attrs.parking_spots,
        attrs.occupancy_rate,
        attrs.annual_revenue,
        attrs.annual_expenses,
        attrs.net_operating_income,
        attrs.cap_rate,
        attrs.walk_score / 100.0,
        attrs.transit_score / 100.0,
        attrs.building_age,
        attrs.distance_to_downtown,
        city_index(&attrs.city) as f64,
    ];
    for property_type in PropertyType::ALL {
        values.push(if attrs.property_type == property_type {
            1.0
        } else {
            0.0
        });
    }
    for v in values.iter_mut() {
        *v = round_canonical(*v);
    }

    debug_assert_eq!(values.len(), FEATURE_NAMES.len());
    let vector = FeatureVector { values };

    let mut hasher = Sha256::new();
    hasher.update(vector.canonical_bytes());
    hasher.update(model_version.as_bytes());
    let fingerprint = Fingerprint(hex::encode(hasher.finalize()));

    Ok((vector, fingerprint))
}
