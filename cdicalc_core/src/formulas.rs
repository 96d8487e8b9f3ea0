//! # Diffraction Geometry Formulas
//!
//! Pure functions behind every computed field. Each takes its sources as
//! `Option<Quantity>` (a missing or unreadable field is `None`) and returns an
//! [`Outcome`]:
//!
//! - any required source missing -> [`Outcome::Empty`]
//! - a zero divisor -> resolved by the formula's [`ZeroPolicy`]
//! - a non-finite result (e.g. `asin` of a ratio above 1) -> [`Outcome::Undefined`]
//! - otherwise -> [`Outcome::Value`]
//!
//! `Err` is reserved for internal dimension errors; since sources arrive in
//! their canonical units, it only fires when a formula is wired to the wrong
//! fields.
//!
//! ## Notation
//!
//! - `λ` = X-ray wavelength
//! - `D` = crystal size
//! - `p` = detector pixel size, `N` = fringe spacing in pixels
//! - `d2θ` = angle between adjacent pixels seen from the sample
//! - `dq` = momentum transfer between adjacent pixels
//!
//! ## References
//!
//! - Bragg CDI sampling: the crystal of size `D` produces fringes of angular
//!   period `λ/D`; oversampling asks for `N` pixels per fringe.
//! - Transverse coherence length `ξ = λ/(2Δθ)` up to the convention factor;
//!   the calculator uses `λ/Δθ`.

use serde::{Deserialize, Serialize};

use crate::constants::{EMPTY_MSG, ERROR_MSG, PI, PLANCK_TIMES_C};
use crate::errors::CalcResult;
use crate::fields::FieldId;
use crate::units::Quantity;

/// Result of evaluating a formula or a derived quantity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Outcome {
    /// A computed value
    Value(Quantity),
    /// Not enough inputs; shown as a blank field
    #[default]
    Empty,
    /// Inputs present but the result is mathematically undefined; shown as ERROR
    Undefined,
}

impl Outcome {
    /// Wrap a computed quantity, turning NaN and infinities into `Undefined`
    pub fn checked(quantity: Quantity) -> Self {
        if quantity.is_finite() {
            Outcome::Value(quantity)
        } else {
            Outcome::Undefined
        }
    }

    pub fn value(&self) -> Option<Quantity> {
        match self {
            Outcome::Value(q) => Some(*q),
            _ => None,
        }
    }

    /// Text written into `field` for this outcome
    pub fn render(&self, field: FieldId) -> CalcResult<String> {
        match self {
            Outcome::Value(q) => field.format(q),
            Outcome::Empty => Ok(EMPTY_MSG.to_string()),
            Outcome::Undefined => Ok(ERROR_MSG.to_string()),
        }
    }
}

/// What a zero divisor turns into.
///
/// The engine defaults to `Undefined`; each formula can be switched in
/// [`EngineSettings`](crate::engine::EngineSettings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroPolicy {
    /// Show ERROR
    #[default]
    Undefined,
    /// Show a blank field
    Empty,
}

impl ZeroPolicy {
    fn outcome(self) -> Outcome {
        match self {
            ZeroPolicy::Undefined => Outcome::Undefined,
            ZeroPolicy::Empty => Outcome::Empty,
        }
    }
}

/// Bind each `Option<Quantity>` argument or return `Outcome::Empty`
macro_rules! require {
    ($($source:ident),+ $(,)?) => {
        $(
            let Some($source) = $source else {
                return Ok(Outcome::Empty);
            };
        )+
    };
}

/// Propagate a derived outcome: undefined wins over everything, empty next
macro_rules! require_derived {
    ($source:ident) => {
        let $source = match $source {
            Outcome::Value(q) => q,
            Outcome::Empty => return Ok(Outcome::Empty),
            Outcome::Undefined => return Ok(Outcome::Undefined),
        };
    };
}

// =============================================================================
// BRAGG CDI: ANGULAR SAMPLING
// =============================================================================

/// Half the angular width of one fringe, `asin(λ / 2D)`, in radians
fn fringe_half_angle(crystal_size: Quantity, wavelength: Quantity) -> CalcResult<Quantity> {
    (wavelength / (crystal_size * 2.0)).asin()
}

/// Angular sampling ratio: fringe half-width over the rocking step.
///
/// # Formula
/// σ = asin(λ / 2D) / Δω
///
/// # Arguments
/// * `crystal_size` - D
/// * `rocking_angle` - Δω, the rocking-curve step
/// * `wavelength` - λ
///
/// # Example
/// ```rust
/// use cdicalc_core::fields::FieldId;
/// use cdicalc_core::formulas::{angular_sampling, ZeroPolicy};
///
/// let d = FieldId::CrystalSize.to_quantity("250 nm");
/// let w = FieldId::RockingAngle.to_quantity("0.01 deg");
/// let l = FieldId::XrayWavelength.to_quantity("1.5 angstrom");
/// let sigma = angular_sampling(d, w, l, ZeroPolicy::Undefined).unwrap();
/// let ratio = sigma.value().unwrap().as_dimensionless().unwrap();
/// assert!((ratio - 1.7189).abs() < 1e-3);
/// ```
pub fn angular_sampling(
    crystal_size: Option<Quantity>,
    rocking_angle: Option<Quantity>,
    wavelength: Option<Quantity>,
    zero: ZeroPolicy,
) -> CalcResult<Outcome> {
    require!(crystal_size, rocking_angle, wavelength);
    if rocking_angle.is_zero() {
        return Ok(zero.outcome());
    }
    let half_angle = fringe_half_angle(crystal_size, wavelength)?;
    Ok(Outcome::checked(half_angle / rocking_angle))
}

/// Largest rocking step still giving the requested angular sampling.
///
/// # Formula
/// Δω_max = asin(λ / 2D) / σ   (radians)
pub fn max_rocking_angle(
    crystal_size: Option<Quantity>,
    angular_sampling: Option<Quantity>,
    wavelength: Option<Quantity>,
    zero: ZeroPolicy,
) -> CalcResult<Outcome> {
    require!(crystal_size, angular_sampling, wavelength);
    if angular_sampling.is_zero() {
        return Ok(zero.outcome());
    }
    let half_angle = fringe_half_angle(crystal_size, wavelength)?;
    Ok(Outcome::checked(half_angle / angular_sampling))
}

// =============================================================================
// BRAGG CDI: DETECTOR SAMPLING
// =============================================================================

/// Angle subtended by one fringe on the detector, in radians.
///
/// # Formula
/// d2θ = N · p / L
pub fn pixel_angular_step(
    fringe_spacing: Option<Quantity>,
    pixel_size: Option<Quantity>,
    detector_distance: Option<Quantity>,
    zero: ZeroPolicy,
) -> CalcResult<Outcome> {
    require!(fringe_spacing, pixel_size, detector_distance);
    if detector_distance.is_zero() {
        return Ok(zero.outcome());
    }
    let step = fringe_spacing * pixel_size / detector_distance;
    // a dimension slip here would be a wiring bug
    step.as_dimensionless()?;
    Ok(Outcome::checked(step))
}

/// Momentum transfer spanned by the angular step.
///
/// # Formula
/// dq = 4π/λ · sin(d2θ / 2)
pub fn momentum_transfer_delta(
    wavelength: Option<Quantity>,
    angular_step: Outcome,
    zero: ZeroPolicy,
) -> CalcResult<Outcome> {
    require_derived!(angular_step);
    require!(wavelength);
    if wavelength.is_zero() {
        return Ok(zero.outcome());
    }
    let half_step = (angular_step / 2.0).sin()?;
    Ok(Outcome::checked((4.0 * PI / wavelength) * half_step))
}

/// Crystal size whose fringes have period `dq`.
///
/// # Formula
/// D = 2π / dq
pub fn crystal_size_from_dq(momentum_transfer: Outcome, zero: ZeroPolicy) -> CalcResult<Outcome> {
    require_derived!(momentum_transfer);
    if momentum_transfer.is_zero() {
        return Ok(zero.outcome());
    }
    Ok(Outcome::checked(2.0 * PI / momentum_transfer))
}

/// Shortest detector distance that still puts `N` pixels on one fringe.
///
/// # Formula
/// L_min = N · p / (2 · asin(λ / 2D))
pub fn min_detector_distance(
    fringe_spacing: Option<Quantity>,
    pixel_size: Option<Quantity>,
    crystal_size: Option<Quantity>,
    wavelength: Option<Quantity>,
    zero: ZeroPolicy,
) -> CalcResult<Outcome> {
    require!(fringe_spacing, pixel_size, crystal_size, wavelength);
    let half_angle = fringe_half_angle(crystal_size, wavelength)?;
    if half_angle.is_zero() {
        return Ok(zero.outcome());
    }
    Ok(Outcome::checked(fringe_spacing * pixel_size / (half_angle * 2.0)))
}

// =============================================================================
// X-RAYS
// =============================================================================

/// Photon energy <-> wavelength.
///
/// # Formula
/// E = h·c / λ  and  λ = h·c / E
///
/// The result carries the other dimension; the caller formats it in the
/// target field's unit.
///
/// # Example
/// ```rust
/// use cdicalc_core::fields::FieldId;
/// use cdicalc_core::formulas::{energy_wavelength_conversion, ZeroPolicy};
///
/// let energy = FieldId::XrayEnergy.to_quantity("10 keV");
/// let wavelength = energy_wavelength_conversion(energy, ZeroPolicy::Undefined).unwrap();
/// let text = FieldId::XrayWavelength.format(&wavelength.value().unwrap()).unwrap();
/// assert_eq!(text, "1.2398 angstrom");
/// ```
pub fn energy_wavelength_conversion(value: Option<Quantity>, zero: ZeroPolicy) -> CalcResult<Outcome> {
    require!(value);
    if value.is_zero() {
        return Ok(zero.outcome());
    }
    Ok(Outcome::checked(PLANCK_TIMES_C / value))
}

// =============================================================================
// COHERENCE
// =============================================================================

/// Beam divergence seen from the sample, in radians.
///
/// # Formula
/// Δθ = s / L_source
pub fn divergence(
    source_size: Option<Quantity>,
    source_distance: Option<Quantity>,
    zero: ZeroPolicy,
) -> CalcResult<Outcome> {
    require!(source_size, source_distance);
    if source_distance.is_zero() {
        return Ok(zero.outcome());
    }
    Ok(Outcome::checked(source_size / source_distance))
}

/// Transverse coherence length.
///
/// # Formula
/// ξ = λ / Δθ
pub fn transverse_coherence_length(
    wavelength: Option<Quantity>,
    divergence: Option<Quantity>,
    zero: ZeroPolicy,
) -> CalcResult<Outcome> {
    require!(wavelength, divergence);
    if divergence.is_zero() {
        return Ok(zero.outcome());
    }
    Ok(Outcome::checked(wavelength / divergence))
}

/// Opening of secondary slits placed at `distance` from the secondary source
/// to select a coherent part of the beam.
///
/// # Formula
/// a = L₂ · λ / ξ
pub fn secondary_slit_opening(
    secondary_source_distance: Option<Quantity>,
    wavelength: Option<Quantity>,
    coherence_length: Option<Quantity>,
    zero: ZeroPolicy,
) -> CalcResult<Outcome> {
    require!(secondary_source_distance, wavelength, coherence_length);
    if coherence_length.is_zero() {
        return Ok(zero.outcome());
    }
    Ok(Outcome::checked(secondary_source_distance * wavelength / coherence_length))
}

// =============================================================================
// FORWARD CDI
// =============================================================================

/// Speckle size on the detector.
///
/// # Formula
/// s = λ · L / b
pub fn speckle_size(
    wavelength: Option<Quantity>,
    detector_distance: Option<Quantity>,
    beam_size: Option<Quantity>,
    zero: ZeroPolicy,
) -> CalcResult<Outcome> {
    require!(wavelength, detector_distance, beam_size);
    if beam_size.is_zero() {
        return Ok(zero.outcome());
    }
    Ok(Outcome::checked(wavelength * detector_distance / beam_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Dimension;

    const STRICT: ZeroPolicy = ZeroPolicy::Undefined;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1e-30)
    }

    fn q(field: FieldId, text: &str) -> Option<Quantity> {
        field.to_quantity(text)
    }

    fn si(outcome: Outcome) -> f64 {
        outcome.value().expect("expected a value").si_value()
    }

    #[test]
    fn test_angular_sampling_scenario() {
        let out = angular_sampling(
            q(FieldId::CrystalSize, "250 nm"),
            q(FieldId::RockingAngle, "0.01 deg"),
            q(FieldId::XrayWavelength, "1.5 angstrom"),
            STRICT,
        )
        .unwrap();
        let expected = (1.5e-10_f64 / (2.0 * 250e-9)).asin() / 0.01_f64.to_radians();
        assert!(approx_eq(si(out), expected), "sigma = {}", si(out));
        assert_eq!(out.render(FieldId::AngularSampling).unwrap(), "1.7");
    }

    #[test]
    fn test_rocking_angle_round_trip() {
        let crystal = q(FieldId::CrystalSize, "480 nm");
        let wavelength = q(FieldId::XrayWavelength, "0.9 angstrom");
        for text in ["0.002 deg", "0.01 deg", "0.3 deg", "1e-5 rad"] {
            let rocking = q(FieldId::RockingAngle, text);
            let sigma = angular_sampling(crystal, rocking, wavelength, STRICT).unwrap().value();
            let back = max_rocking_angle(crystal, sigma, wavelength, STRICT).unwrap();
            assert!(approx_eq(si(back), rocking.unwrap().si_value()), "{}: {}", text, si(back));
        }
    }

    #[test]
    fn test_energy_wavelength_double_conversion() {
        for text in ["0.5 angstrom", "1.5 angstrom", "0.1 nm", "12 angstrom"] {
            let wavelength = q(FieldId::XrayWavelength, text);
            let energy = energy_wavelength_conversion(wavelength, STRICT).unwrap();
            assert_eq!(energy.value().unwrap().dimension(), Dimension::ENERGY);
            let back = energy_wavelength_conversion(energy.value(), STRICT).unwrap();
            assert!(approx_eq(si(back), wavelength.unwrap().si_value()), "{}", text);
        }
    }

    #[test]
    fn test_missing_sources_give_empty() {
        let crystal = q(FieldId::CrystalSize, "250 nm");
        assert_eq!(angular_sampling(crystal, None, None, STRICT).unwrap(), Outcome::Empty);
        assert_eq!(speckle_size(None, None, None, STRICT).unwrap(), Outcome::Empty);
        assert_eq!(energy_wavelength_conversion(None, STRICT).unwrap(), Outcome::Empty);
        assert_eq!(crystal_size_from_dq(Outcome::Empty, STRICT).unwrap(), Outcome::Empty);
    }

    #[test]
    fn test_zero_divisors_follow_policy() {
        let zero_distance = q(FieldId::DetectorDistance, "0 m");
        let fringe = q(FieldId::FringeSpacing, "5");
        let pixel = q(FieldId::DetectorPixelsize, "55 um");
        assert_eq!(pixel_angular_step(fringe, pixel, zero_distance, STRICT).unwrap(), Outcome::Undefined);
        assert_eq!(
            pixel_angular_step(fringe, pixel, zero_distance, ZeroPolicy::Empty).unwrap(),
            Outcome::Empty
        );
        assert_eq!(
            energy_wavelength_conversion(q(FieldId::XrayEnergy, "0"), STRICT).unwrap(),
            Outcome::Undefined
        );
        assert_eq!(
            divergence(q(FieldId::HorizontalSourceSize, "900 um"), q(FieldId::PrimarySourceDistance, "0"), STRICT)
                .unwrap(),
            Outcome::Undefined
        );
    }

    #[test]
    fn test_undefined_step_dominates_missing_wavelength() {
        let dq = momentum_transfer_delta(None, Outcome::Undefined, STRICT).unwrap();
        assert_eq!(dq, Outcome::Undefined);
        assert_eq!(crystal_size_from_dq(dq, STRICT).unwrap(), Outcome::Undefined);
    }

    #[test]
    fn test_asin_out_of_domain_is_undefined() {
        // λ/2D > 1
        let out = min_detector_distance(
            q(FieldId::FringeSpacing, "5"),
            q(FieldId::DetectorPixelsize, "55 um"),
            q(FieldId::CrystalSize, "0.01 nm"),
            q(FieldId::XrayWavelength, "1.5 angstrom"),
            STRICT,
        )
        .unwrap();
        assert_eq!(out, Outcome::Undefined);
    }

    #[test]
    fn test_detector_chain_recovers_crystal_size() {
        // the min distance for a crystal gives back that crystal through d2θ -> dq -> D
        let fringe = q(FieldId::FringeSpacing, "5");
        let pixel = q(FieldId::DetectorPixelsize, "55 um");
        let crystal = q(FieldId::CrystalSize, "250 nm");
        let wavelength = q(FieldId::XrayWavelength, "1.5 angstrom");

        let distance = min_detector_distance(fringe, pixel, crystal, wavelength, STRICT).unwrap();
        let step = pixel_angular_step(fringe, pixel, distance.value(), STRICT).unwrap();
        let dq = momentum_transfer_delta(wavelength, step, STRICT).unwrap();
        let size = crystal_size_from_dq(dq, STRICT).unwrap();
        assert!((si(size) - 250e-9).abs() < 1e-12, "D = {}", si(size));
    }

    #[test]
    fn test_min_detector_distance_value() {
        let out = min_detector_distance(
            q(FieldId::FringeSpacing, "5"),
            q(FieldId::DetectorPixelsize, "55 um"),
            q(FieldId::CrystalSize, "250 nm"),
            q(FieldId::XrayWavelength, "1.5 angstrom"),
            STRICT,
        )
        .unwrap();
        let expected = 5.0 * 55e-6 / (2.0 * (1.5e-10_f64 / 500e-9).asin());
        assert!(approx_eq(si(out), expected));
        assert_eq!(out.render(FieldId::MinDetectorDistance).unwrap(), "0.46 m");
    }

    #[test]
    fn test_coherence_chain() {
        let wavelength = q(FieldId::XrayWavelength, "1 angstrom");
        let div = divergence(
            q(FieldId::HorizontalSourceSize, "900 um"),
            q(FieldId::PrimarySourceDistance, "30 m"),
            STRICT,
        )
        .unwrap();
        assert_eq!(div.render(FieldId::HorizontalDivergence).unwrap(), "30.00 urad");

        let xi = transverse_coherence_length(wavelength, div.value(), STRICT).unwrap();
        assert!(approx_eq(si(xi), 1e-10 / 30e-6));

        let slit = secondary_slit_opening(q(FieldId::SecondarySourceDistance, "2 m"), wavelength, xi.value(), STRICT)
            .unwrap();
        // L2 · λ / (λ / Δθ) = L2 · Δθ
        assert!(approx_eq(si(slit), 2.0 * 30e-6));
        assert_eq!(slit.render(FieldId::SecondarySlitsHorizontal).unwrap(), "60 um");
    }

    #[test]
    fn test_speckle_size() {
        let out = speckle_size(
            q(FieldId::XrayWavelength, "1 angstrom"),
            q(FieldId::DetectorDistance, "5 m"),
            q(FieldId::BeamSize, "10 um"),
            STRICT,
        )
        .unwrap();
        assert_eq!(out.render(FieldId::SpeckleSize).unwrap(), "50 um");
        let zero_beam = speckle_size(
            q(FieldId::XrayWavelength, "1 angstrom"),
            q(FieldId::DetectorDistance, "5 m"),
            q(FieldId::BeamSize, "0"),
            STRICT,
        )
        .unwrap();
        assert_eq!(zero_beam.render(FieldId::SpeckleSize).unwrap(), "ERROR");
    }
}
