//! Physical constants in SI units (exact values of the 2019 SI redefinition).
//!
//! These are process-wide and immutable; the formulas read them directly.

use crate::units::{Dimension, Quantity};

/// Planck constant (J·s)
pub const PLANCK_CONSTANT: f64 = 6.626_070_15e-34;

/// Speed of light in vacuum (m/s)
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Elementary charge (C), i.e. the size of one electronvolt in joules
pub const ELEMENTARY_CHARGE: f64 = 1.602_176_634e-19;

/// Pi
pub const PI: f64 = std::f64::consts::PI;

/// h·c as a quantity (J·m), the constant linking photon energy and wavelength
pub const PLANCK_TIMES_C: Quantity = Quantity::from_si(PLANCK_CONSTANT * SPEED_OF_LIGHT, Dimension::new(3, 1, -2));

/// The sentinel shown in a field whose value could not be computed
pub const ERROR_MSG: &str = "ERROR";

/// The text of a cleared field
pub const EMPTY_MSG: &str = "";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hc_in_kev_angstrom() {
        // the usual beamline shortcut: lambda[Å] = 12.398 / E[keV]
        let kev_angstrom = PLANCK_TIMES_C.si_value() / (1e3 * ELEMENTARY_CHARGE * 1e-10);
        assert!((kev_angstrom - 12.398_419_84).abs() < 1e-6, "hc = {}", kev_angstrom);
    }
}
