//! # Field Registry
//!
//! The fixed set of form fields with their canonical unit, display precision
//! and example value, plus the field-aware side of the unit adapter: reading
//! a field's text as a [`Quantity`] and writing a quantity back as text.
//!
//! ## Usage
//!
//! ```rust
//! use cdicalc_core::fields::FieldId;
//!
//! let field: FieldId = "detector_pixelsize".parse().unwrap();
//! assert_eq!(field.spec().canonical_unit, "um");
//!
//! // bare numbers are read in the canonical unit
//! let q = field.to_quantity("55").unwrap();
//! assert_eq!(field.format(&q).unwrap(), "55 um");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::constants::{EMPTY_MSG, ERROR_MSG};
use crate::errors::{CalcError, CalcResult};
use crate::units::{parse_magnitude_and_unit, render, Quantity, Unit};

// ============================================================================
// Field Identifiers
// ============================================================================

/// Every field of the calculator form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldId {
    // -------------------------------------------------------------------------
    // Bragg CDI
    // -------------------------------------------------------------------------
    CrystalSize,
    DetectorDistance,
    DetectorPixelsize,
    FringeSpacing,
    RockingAngle,
    AngularSampling,
    MaxRockingAngle,
    MinDetectorDistance,
    XrayEnergy,
    XrayWavelength,

    // -------------------------------------------------------------------------
    // Coherence / secondary source
    // -------------------------------------------------------------------------
    PrimarySourceDistance,
    HorizontalSourceSize,
    VerticalSourceSize,
    HorizontalDivergence,
    VerticalDivergence,
    HorizontalCoherenceLength,
    VerticalCoherenceLength,
    SecondarySourceDistance,
    SecondarySlitsHorizontal,
    SecondarySlitsVertical,

    // -------------------------------------------------------------------------
    // Forward CDI
    // -------------------------------------------------------------------------
    BeamSize,
    SpeckleSize,
}

/// All fields, in form order.
pub static ALL_FIELDS: &[FieldId] = &[
    FieldId::CrystalSize,
    FieldId::DetectorDistance,
    FieldId::DetectorPixelsize,
    FieldId::FringeSpacing,
    FieldId::RockingAngle,
    FieldId::AngularSampling,
    FieldId::MaxRockingAngle,
    FieldId::MinDetectorDistance,
    FieldId::XrayEnergy,
    FieldId::XrayWavelength,
    FieldId::PrimarySourceDistance,
    FieldId::HorizontalSourceSize,
    FieldId::VerticalSourceSize,
    FieldId::HorizontalDivergence,
    FieldId::VerticalDivergence,
    FieldId::HorizontalCoherenceLength,
    FieldId::VerticalCoherenceLength,
    FieldId::SecondarySourceDistance,
    FieldId::SecondarySlitsHorizontal,
    FieldId::SecondarySlitsVertical,
    FieldId::BeamSize,
    FieldId::SpeckleSize,
];

static BY_NAME: Lazy<HashMap<&'static str, FieldId>> =
    Lazy::new(|| ALL_FIELDS.iter().map(|field| (field.name(), *field)).collect());

/// Static description of a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    /// Identifier used in config files and edit events
    pub name: &'static str,
    /// Unit every displayed value is converted to ("" = dimensionless)
    pub canonical_unit: &'static str,
    /// Number of decimals shown
    pub precision: usize,
    /// Example value quoted in the help line
    pub example: &'static str,
    /// False for fields that only display computed values
    pub editable: bool,
}

const fn spec(
    name: &'static str,
    canonical_unit: &'static str,
    precision: usize,
    example: &'static str,
    editable: bool,
) -> FieldSpec {
    FieldSpec {
        name,
        canonical_unit,
        precision,
        example,
        editable,
    }
}

impl FieldId {
    /// Registry entry for this field
    pub fn spec(&self) -> FieldSpec {
        match self {
            FieldId::CrystalSize => spec("crystal_size", "nm", 0, "250 nm", true),
            FieldId::DetectorDistance => spec("detector_distance", "m", 2, "1.5 m", true),
            FieldId::DetectorPixelsize => spec("detector_pixelsize", "um", 0, "55 um", true),
            FieldId::FringeSpacing => spec("fringe_spacing", "", 1, "5", true),
            FieldId::RockingAngle => spec("rocking_angle", "deg", 4, "0.01 deg", true),
            FieldId::AngularSampling => spec("angular_sampling", "", 1, "3", true),
            FieldId::MaxRockingAngle => spec("max_rocking_angle", "deg", 4, "0.01 deg", false),
            FieldId::MinDetectorDistance => spec("min_detector_distance", "m", 2, "1.5 m", false),
            FieldId::XrayEnergy => spec("xray_energy", "keV", 2, "10 keV", true),
            FieldId::XrayWavelength => spec("xray_wavelength", "angstrom", 4, "1.5 angstrom", true),
            FieldId::PrimarySourceDistance => spec("primary_source_distance", "m", 2, "31.5 m", true),
            FieldId::HorizontalSourceSize => spec("horizontal_source_size", "um", 1, "900 um", true),
            FieldId::VerticalSourceSize => spec("vertical_source_size", "um", 1, "20 um", true),
            FieldId::HorizontalDivergence => spec("horizontal_divergence", "urad", 2, "12.5 urad", false),
            FieldId::VerticalDivergence => spec("vertical_divergence", "urad", 2, "0.5 urad", false),
            FieldId::HorizontalCoherenceLength => spec("horizontal_coherence_length", "um", 1, "20 um", false),
            FieldId::VerticalCoherenceLength => spec("vertical_coherence_length", "um", 1, "100 um", false),
            FieldId::SecondarySourceDistance => spec("secondary_source_distance", "m", 2, "1.5 m", true),
            FieldId::SecondarySlitsHorizontal => spec("secondary_slits_horizontal", "um", 0, "20 um", false),
            FieldId::SecondarySlitsVertical => spec("secondary_slits_vertical", "um", 0, "20 um", false),
            FieldId::BeamSize => spec("beam_size", "um", 1, "1 um", true),
            FieldId::SpeckleSize => spec("speckle_size", "um", 0, "50 um", false),
        }
    }

    /// Identifier used in config files and edit events
    pub fn name(&self) -> &'static str {
        self.spec().name
    }

    /// Parsed canonical unit of this field
    pub fn canonical_unit(&self) -> CalcResult<Unit> {
        Unit::parse(self.spec().canonical_unit)
    }

    /// Help line shown when the field's text is rejected
    pub fn help_message(&self) -> String {
        let spec = self.spec();
        if spec.canonical_unit.is_empty() {
            format!("enter a valid {}: e.g. {}", spec.name, spec.example)
        } else {
            format!("enter a valid {} ({}): e.g. {}", spec.name, spec.canonical_unit, spec.example)
        }
    }

    // ========================================================================
    // Adapter: text <-> quantity
    // ========================================================================

    /// Parse `text` for this field, keeping the failure reason.
    ///
    /// * `Ok(None)` - the text is blank
    /// * `Ok(Some(q))` - a quantity compatible with the canonical unit; a bare
    ///   number is taken to be in the canonical unit
    /// * `Err(_)` - invalid syntax, unknown unit, or incompatible dimension
    pub fn parse(&self, text: &str) -> CalcResult<Option<Quantity>> {
        let canonical = self.canonical_unit()?;
        let Some((magnitude, unit)) = parse_magnitude_and_unit(text).map_err(|e| match e {
            CalcError::InvalidInput { value, reason, .. } => CalcError::invalid_input(self.name(), value, reason),
            other => other,
        })?
        else {
            return Ok(None);
        };
        let quantity = match unit {
            None => Quantity::new(magnitude, &canonical),
            Some(unit) => {
                if unit.dimension() != canonical.dimension() {
                    return Err(CalcError::dimension_mismatch(unit.symbol(), self.spec().canonical_unit));
                }
                Quantity::new(magnitude, &unit)
            }
        };
        Ok(Some(quantity))
    }

    /// Lenient read used by formulas: `None` for blank, invalid, ERROR or
    /// incompatible text.
    pub fn to_quantity(&self, text: &str) -> Option<Quantity> {
        if text.trim() == ERROR_MSG {
            return None;
        }
        match self.parse(text) {
            Ok(value) => value,
            Err(e) => {
                tracing::trace!(field = self.name(), text, error = %e, "cannot read field as a quantity");
                None
            }
        }
    }

    /// Convert to the canonical unit and render at the field's precision
    pub fn format(&self, quantity: &Quantity) -> CalcResult<String> {
        let spec = self.spec();
        let value = quantity.value_in(&self.canonical_unit()?)?;
        Ok(render(value, spec.precision, spec.canonical_unit))
    }

    /// Reformat raw text in the canonical unit: formatted text, `""` for blank
    /// text, `"ERROR"` for text that does not parse.
    pub fn normalize(&self, text: &str) -> String {
        match self.parse(text) {
            Ok(Some(quantity)) => self.format(&quantity).unwrap_or_else(|_| ERROR_MSG.to_string()),
            Ok(None) => EMPTY_MSG.to_string(),
            Err(_) => ERROR_MSG.to_string(),
        }
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for FieldId {
    type Err = CalcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BY_NAME.get(s).copied().ok_or_else(|| CalcError::unknown_field(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn test_registry_is_complete_and_consistent() {
        assert_eq!(ALL_FIELDS.len(), 22);
        for field in ALL_FIELDS {
            // canonical units must parse and names must resolve back
            assert!(field.canonical_unit().is_ok(), "{} unit", field);
            assert_eq!(field.name().parse::<FieldId>().unwrap(), *field);
            // the example itself is a valid entry
            assert!(field.parse(field.spec().example).unwrap().is_some(), "{} example", field);
        }
    }

    #[test]
    fn test_serde_names_match_registry() {
        for field in ALL_FIELDS {
            let json = serde_json::to_string(field).unwrap();
            assert_eq!(json, format!("\"{}\"", field.name()));
        }
    }

    #[test]
    fn test_unknown_field_name() {
        let err = "sampling_ratio".parse::<FieldId>().unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_FIELD");
    }

    #[test]
    fn test_bare_number_uses_canonical_unit() {
        let q = FieldId::CrystalSize.to_quantity("250").unwrap();
        assert!(approx_eq(q.si_value(), 250e-9));
    }

    #[test]
    fn test_explicit_unit_is_converted() {
        let q = FieldId::DetectorDistance.to_quantity("1500 mm").unwrap();
        assert_eq!(FieldId::DetectorDistance.format(&q).unwrap(), "1.50 m");
    }

    #[test]
    fn test_incompatible_unit_is_rejected() {
        let err = FieldId::DetectorDistance.parse("5 kg").unwrap_err();
        assert_eq!(err.error_code(), "DIMENSION_MISMATCH");
        assert!(FieldId::DetectorDistance.to_quantity("5 kg").is_none());
    }

    #[test]
    fn test_sentinels_read_as_missing() {
        assert!(FieldId::CrystalSize.to_quantity("").is_none());
        assert!(FieldId::CrystalSize.to_quantity("ERROR").is_none());
        assert!(FieldId::CrystalSize.to_quantity("abc nm").is_none());
    }

    #[test]
    fn test_invalid_text_names_the_field() {
        match FieldId::FringeSpacing.parse("five") {
            Err(CalcError::InvalidInput { field, .. }) => assert_eq!(field, "fringe_spacing"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(FieldId::XrayWavelength.normalize("0.15 nm"), "1.5000 angstrom");
        assert_eq!(FieldId::FringeSpacing.normalize("5"), "5.0");
        assert_eq!(FieldId::RockingAngle.normalize(""), "");
        assert_eq!(FieldId::RockingAngle.normalize("ten degrees"), "ERROR");
        assert_eq!(FieldId::RockingAngle.normalize("1 m"), "ERROR");
    }

    #[test]
    fn test_help_message() {
        assert_eq!(
            FieldId::CrystalSize.help_message(),
            "enter a valid crystal_size (nm): e.g. 250 nm"
        );
        assert_eq!(FieldId::FringeSpacing.help_message(), "enter a valid fringe_spacing: e.g. 5");
    }
}
