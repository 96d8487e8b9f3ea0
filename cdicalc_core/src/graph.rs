//! # Dependency Graph
//!
//! The static wiring of the calculator: which formulas react to an edit of
//! each field, in which order, and which fields they write.
//!
//! Three tables drive propagation:
//!
//! - [`reactions`] - what runs when the user edits a field
//! - [`Formula::chain`] - what runs after a formula, because it changed
//!   derived state or a field other formulas read
//! - [`write_notifications`] - what runs whenever a field's text changes,
//!   whoever changed it (only the X-ray wavelength has any)
//!
//! ```text
//! detector_distance ─┐
//! fringe_spacing ────┼─> pixel_angular_step ─> momentum_transfer_delta ─> crystal_size_from_dq
//! detector_pixelsize ┘                                                      │
//!                                                     angular_sampling <────┤
//!                                                    max_rocking_angle <────┘
//! primary_source_distance ─> horizontal/vertical_divergence
//!                              └─> transverse_coherence_length ─> secondary_slit_opening
//! ```
//!
//! The graph is acyclic. The only back-and-forth is between alternate display
//! slots (detector_distance / min_detector_distance and
//! rocking_angle / max_rocking_angle), where writing one blanks the other
//! without triggering anything.

use serde::{Deserialize, Serialize};

use crate::fields::FieldId;
use crate::form::Form;

/// Every operation the engine can schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formula {
    /// Blank the targets
    Clear,
    AngularSampling,
    MaxRockingAngle,
    /// d2θ, stored as derived state
    PixelAngularStep,
    /// dq, stored as derived state
    MomentumTransferDelta,
    CrystalSizeFromDq,
    MinDetectorDistance,
    EnergyWavelengthConversion,
    HorizontalDivergence,
    VerticalDivergence,
    TransverseCoherenceLength,
    SecondarySlitOpening,
    SpeckleSize,
}

/// All formulas, for settings and diagnostics.
pub static ALL_FORMULAS: &[Formula] = &[
    Formula::Clear,
    Formula::AngularSampling,
    Formula::MaxRockingAngle,
    Formula::PixelAngularStep,
    Formula::MomentumTransferDelta,
    Formula::CrystalSizeFromDq,
    Formula::MinDetectorDistance,
    Formula::EnergyWavelengthConversion,
    Formula::HorizontalDivergence,
    Formula::VerticalDivergence,
    Formula::TransverseCoherenceLength,
    Formula::SecondarySlitOpening,
    Formula::SpeckleSize,
];

/// One edge of the graph: a formula and the fields it declares as targets.
///
/// Formulas that only update derived state declare no targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reaction {
    pub formula: Formula,
    pub targets: &'static [FieldId],
}

impl Reaction {
    pub const fn new(formula: Formula, targets: &'static [FieldId]) -> Self {
        Self { formula, targets }
    }
}

use FieldId::*;
use Formula as F;

const ANGULAR_SAMPLING: Reaction = Reaction::new(F::AngularSampling, &[AngularSampling]);
const MAX_ROCKING_ANGLE: Reaction = Reaction::new(F::MaxRockingAngle, &[MaxRockingAngle]);
const PIXEL_ANGULAR_STEP: Reaction = Reaction::new(F::PixelAngularStep, &[]);
const MOMENTUM_TRANSFER: Reaction = Reaction::new(F::MomentumTransferDelta, &[]);
const CRYSTAL_SIZE_FROM_DQ: Reaction = Reaction::new(F::CrystalSizeFromDq, &[CrystalSize]);
const MIN_DETECTOR_DISTANCE: Reaction = Reaction::new(F::MinDetectorDistance, &[MinDetectorDistance]);
const HORIZONTAL_DIVERGENCE: Reaction = Reaction::new(F::HorizontalDivergence, &[HorizontalDivergence]);
const VERTICAL_DIVERGENCE: Reaction = Reaction::new(F::VerticalDivergence, &[VerticalDivergence]);
const COHERENCE_LENGTHS: Reaction = Reaction::new(
    F::TransverseCoherenceLength,
    &[HorizontalCoherenceLength, VerticalCoherenceLength],
);
const SECONDARY_SLITS: Reaction = Reaction::new(
    F::SecondarySlitOpening,
    &[SecondarySlitsHorizontal, SecondarySlitsVertical],
);
const SPECKLE_SIZE: Reaction = Reaction::new(F::SpeckleSize, &[SpeckleSize]);
const CLEAR_ROCKING: Reaction = Reaction::new(F::Clear, &[RockingAngle]);
const CLEAR_DISTANCE: Reaction = Reaction::new(F::Clear, &[DetectorDistance]);
const TO_WAVELENGTH: Reaction = Reaction::new(F::EnergyWavelengthConversion, &[XrayWavelength]);
const TO_ENERGY: Reaction = Reaction::new(F::EnergyWavelengthConversion, &[XrayEnergy]);

/// Ordered reactions to a user edit of `source`.
///
/// Order matters: a formula that blanks a field runs before any formula that
/// would read it.
pub fn reactions(source: FieldId) -> &'static [Reaction] {
    match source {
        AngularSampling => &[CLEAR_ROCKING, MAX_ROCKING_ANGLE],
        CrystalSize => &[
            CLEAR_DISTANCE,
            MIN_DETECTOR_DISTANCE,
            ANGULAR_SAMPLING,
            MAX_ROCKING_ANGLE,
            SPECKLE_SIZE,
        ],
        DetectorDistance => &[PIXEL_ANGULAR_STEP, MIN_DETECTOR_DISTANCE, SPECKLE_SIZE],
        DetectorPixelsize | FringeSpacing => &[PIXEL_ANGULAR_STEP, MIN_DETECTOR_DISTANCE],
        RockingAngle => &[ANGULAR_SAMPLING, MAX_ROCKING_ANGLE],
        XrayEnergy => &[TO_WAVELENGTH],
        XrayWavelength => &[TO_ENERGY],
        PrimarySourceDistance => &[HORIZONTAL_DIVERGENCE, VERTICAL_DIVERGENCE],
        HorizontalSourceSize => &[HORIZONTAL_DIVERGENCE],
        VerticalSourceSize => &[VERTICAL_DIVERGENCE],
        SecondarySourceDistance => &[SECONDARY_SLITS],
        BeamSize => &[SPECKLE_SIZE],
        MaxRockingAngle
        | MinDetectorDistance
        | HorizontalDivergence
        | VerticalDivergence
        | HorizontalCoherenceLength
        | VerticalCoherenceLength
        | SecondarySlitsHorizontal
        | SecondarySlitsVertical
        | SpeckleSize => &[],
    }
}

/// Formulas notified whenever the text of `field` changes.
pub fn write_notifications(field: FieldId) -> &'static [Reaction] {
    match field {
        XrayWavelength => &[
            PIXEL_ANGULAR_STEP,
            MIN_DETECTOR_DISTANCE,
            ANGULAR_SAMPLING,
            MAX_ROCKING_ANGLE,
            COHERENCE_LENGTHS,
            SPECKLE_SIZE,
        ],
        _ => &[],
    }
}

impl Formula {
    /// Formulas to run after this one has run
    pub fn chain(&self) -> &'static [Reaction] {
        match self {
            F::PixelAngularStep => &[MOMENTUM_TRANSFER],
            F::MomentumTransferDelta => &[CRYSTAL_SIZE_FROM_DQ],
            F::CrystalSizeFromDq => &[ANGULAR_SAMPLING, MAX_ROCKING_ANGLE],
            F::HorizontalDivergence | F::VerticalDivergence => &[COHERENCE_LENGTHS],
            F::TransverseCoherenceLength => &[SECONDARY_SLITS],
            _ => &[],
        }
    }

    /// Field whose presence selects this formula's mode, if any.
    ///
    /// Angular sampling is only derived while a rocking angle is given; the
    /// crystal size is only derived from the detector geometry while a
    /// detector distance is given.
    pub fn mode_field(&self) -> Option<FieldId> {
        match self {
            F::AngularSampling => Some(RockingAngle),
            F::PixelAngularStep => Some(DetectorDistance),
            _ => None,
        }
    }

    /// Whether the formula runs in the current form state. Editing the mode
    /// field itself always lets the formula run, so blanking it blanks the
    /// results derived from it.
    pub fn applies<S: Form + ?Sized>(&self, form: &S, edited: FieldId) -> bool {
        match self.mode_field() {
            Some(mode) => mode == edited || !form.is_blank(mode),
            None => true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            F::Clear => "clear",
            F::AngularSampling => "angular_sampling",
            F::MaxRockingAngle => "max_rocking_angle",
            F::PixelAngularStep => "pixel_angular_step",
            F::MomentumTransferDelta => "momentum_transfer_delta",
            F::CrystalSizeFromDq => "crystal_size_from_dq",
            F::MinDetectorDistance => "min_detector_distance",
            F::EnergyWavelengthConversion => "energy_wavelength_conversion",
            F::HorizontalDivergence => "horizontal_divergence",
            F::VerticalDivergence => "vertical_divergence",
            F::TransverseCoherenceLength => "transverse_coherence_length",
            F::SecondarySlitOpening => "secondary_slit_opening",
            F::SpeckleSize => "speckle_size",
        }
    }
}
