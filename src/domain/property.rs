use crate::domain::errors::ValuationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Commercial property category.
///
/// Closed set matching the training vocabulary; an out-of-vocabulary type
/// cannot be constructed, so the unknown-category fallback only applies to
/// cities (see `domain::features`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyType {
    Office,
    Retail,
    Industrial,
    Multifamily,
    Hotel,
    #[serde(rename = "Mixed-Use")]
    MixedUse,
}

impl PropertyType {
    pub const ALL: [PropertyType; 6] = [
        PropertyType::Office,
        PropertyType::Retail,
        PropertyType::Industrial,
        PropertyType::Multifamily,
        PropertyType::Hotel,
        PropertyType::MixedUse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Office => "Office",
            PropertyType::Retail => "Retail",
            PropertyType::Industrial => "Industrial",
            PropertyType::Multifamily => "Multifamily",
            PropertyType::Hotel => "Hotel",
            PropertyType::MixedUse => "Mixed-Use",
        }
    }

    /// Position in the one-hot block of the feature vector.
    pub fn ordinal(&self) -> usize {
        Self::ALL.iter().position(|t| t == self).unwrap_or(0)
    }
}

impl FromStr for PropertyType {
    type Err = ValuationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "office" => Ok(PropertyType::Office),
            "retail" => Ok(PropertyType::Retail),
            "industrial" => Ok(PropertyType::Industrial),
            "multifamily" => Ok(PropertyType::Multifamily),
            "hotel" => Ok(PropertyType::Hotel),
            "mixed-use" | "mixeduse" | "mixed use" => Ok(PropertyType::MixedUse),
            other => Err(ValuationError::invalid_input(
                "property_type",
                format!("unknown property type '{}'", other),
            )),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable input record for one valuation request.
///
/// `net_operating_income` is expected to equal `annual_revenue -
/// annual_expenses`; the relationship is caller-enforced and the engine
/// consumes the value as provided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyAttributes {
    pub property_type: PropertyType,
    pub city: String,
    pub square_feet: f64,
    #[serde(default = "default_one")]
    pub num_floors: f64,
    #[serde(default = "default_one")]
    pub num_units: f64,
    #[serde(default)]
    pub parking_spots: f64,
    /// Fraction of leasable space occupied, 0.0..=1.0.
    pub occupancy_rate: f64,
    pub annual_revenue: f64,
    pub annual_expenses: f64,
    pub net_operating_income: f64,
    /// Capitalization rate, 0.0 (exclusive)..=1.0.
    pub cap_rate: f64,
    #[serde(default = "default_score")]
    pub walk_score: f64,
    #[serde(default = "default_score")]
    pub transit_score: f64,
    #[serde(default)]
    pub building_age: f64,
    #[serde(default = "default_downtown_distance")]
    pub distance_to_downtown: f64,
}

fn default_one() -> f64 {
    1.0
}

fn default_score() -> f64 {
    50.0
}

fn default_downtown_distance() -> f64 {
    5.0
}

impl PropertyAttributes {
    /// Validate every field against its domain.
    ///
    /// Out-of-domain values fail with `InvalidInput`; nothing is ever
    /// silently clamped.
    pub fn validate(&self) -> Result<(), ValuationError> {
        if !self.square_feet.is_finite() || self.square_feet <= 0.0 {
            return Err(ValuationError::invalid_input(
                "square_feet",
                format!("{} must be a positive number", self.square_feet),
            ));
        }
        check_range("occupancy_rate", self.occupancy_rate, 0.0, 1.0)?;
        if !self.cap_rate.is_finite() || self.cap_rate <= 0.0 || self.cap_rate > 1.0 {
            return Err(ValuationError::invalid_input(
                "cap_rate",
                format!("{} must be within (0, 1]", self.cap_rate),
            ));
        }
        check_range("walk_score", self.walk_score, 0.0, 100.0)?;
        check_range("transit_score", self.transit_score, 0.0, 100.0)?;
        check_non_negative("num_floors", self.num_floors)?;
        check_non_negative("num_units", self.num_units)?;
        check_non_negative("parking_spots", self.parking_spots)?;
        check_non_negative("annual_revenue", self.annual_revenue)?;
        check_non_negative("annual_expenses", self.annual_expenses)?;
        check_non_negative("building_age", self.building_age)?;
        check_non_negative("distance_to_downtown", self.distance_to_downtown)?;
        if !self.net_operating_income.is_finite() {
            return Err(ValuationError::invalid_input(
                "net_operating_income",
                "must be a finite number",
            ));
        }
        Ok(())
    }
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), ValuationError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ValuationError::invalid_input(
            field,
            format!("{} must be within [{}, {}]", value, min, max),
        ));
    }
    Ok(())
}

fn check_non_negative(field: &str, value: f64) -> Result<(), ValuationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValuationError::invalid_input(
            field,
            format!("{} must be non-negative", value),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_attrs() -> PropertyAttributes {
        PropertyAttributes {
            property_type: PropertyType::Office,
            city: "Seattle".to_string(),
            square_feet: 15000.0,
            num_floors: 3.0,
            num_units: 12.0,
            parking_spots: 40.0,
            occupancy_rate: 0.92,
            annual_revenue: 525_000.0,
            annual_expenses: 157_500.0,
            net_operating_income: 367_500.0,
            cap_rate: 0.06,
            walk_score: 78.0,
            transit_score: 65.0,
            building_age: 12.0,
            distance_to_downtown: 2.5,
        }
    }

    #[test]
    fn test_valid_attributes_pass() {
        assert!(sample_attrs().validate().is_ok());
    }

    #[test]
    fn test_occupancy_above_one_rejected() {
        let mut attrs = sample_attrs();
        attrs.occupancy_rate = 1.2;
        let err = attrs.validate().unwrap_err();
        assert!(matches!(err, ValuationError::InvalidInput { ref field, .. } if field == "occupancy_rate"));
    }

    #[test]
    fn test_zero_square_feet_rejected() {
        let mut attrs = sample_attrs();
        attrs.square_feet = 0.0;
        assert!(attrs.validate().is_err());
    }

    #[test]
    fn test_cap_rate_bounds() {
        let mut attrs = sample_attrs();
        attrs.cap_rate = 0.0;
        assert!(attrs.validate().is_err());
        attrs.cap_rate = 1.0;
        assert!(attrs.validate().is_ok());
        attrs.cap_rate = 1.01;
        assert!(attrs.validate().is_err());
    }

    #[test]
    fn test_property_type_parsing() {
        assert_eq!(
            PropertyType::from_str("office").unwrap(),
            PropertyType::Office
        );
        assert_eq!(
            PropertyType::from_str("Mixed-Use").unwrap(),
            PropertyType::MixedUse
        );
        assert!(PropertyType::from_str("castle").is_err());
    }

    #[test]
    fn test_serde_defaults_for_optional_fields() {
        let json = r#"{
            "property_type": "Retail",
            "city": "Denver",
            "square_feet": 8000,
            "occupancy_rate": 0.85,
            "annual_revenue": 400000,
            "annual_expenses": 120000,
            "net_operating_income": 280000,
            "cap_rate": 0.055
        }"#;
        let attrs: PropertyAttributes = serde_json::from_str(json).unwrap();
        assert_eq!(attrs.num_floors, 1.0);
        assert_eq!(attrs.walk_score, 50.0);
        assert!(attrs.validate().is_ok());
    }
}
