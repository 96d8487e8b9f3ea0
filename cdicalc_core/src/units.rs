//! # Units and Quantities
//!
//! A small units-of-measure layer: a [`Quantity`] is a magnitude stored in SI
//! base units together with its [`Dimension`] (exponents of length, mass and
//! time). Units are looked up in a static table and may carry SI prefixes, so
//! `"55 um"`, `"1.5 angstrom"`, `"10 keV"` and `"0.01 deg"` all parse.
//!
//! ## Design Philosophy
//!
//! We use a hand-rolled dimension vector rather than a full units library because:
//! - The calculator only ever meets lengths, angles, energies and their ratios
//! - Field texts are user-facing, so the parser must be forgiving about spacing
//! - Conversions must fail loudly, never coerce silently
//!
//! Angles are dimensionless: one radian is the number 1, a degree is π/180.
//!
//! ## Example
//!
//! ```rust
//! use cdicalc_core::units::{parse_quantity, Unit};
//!
//! let q = parse_quantity("55 um").unwrap().unwrap();
//! let mm = Unit::parse("mm").unwrap();
//! assert!((q.value_in(&mm).unwrap() - 0.055).abs() < 1e-12);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::ops::{Div, Mul};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::constants::ELEMENTARY_CHARGE;
use crate::errors::{CalcError, CalcResult};

// ============================================================================
// Dimensions
// ============================================================================

/// Exponents of the base dimensions carried by a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dimension {
    pub length: i8,
    pub mass: i8,
    pub time: i8,
}

impl Dimension {
    pub const DIMENSIONLESS: Dimension = Dimension::new(0, 0, 0);
    pub const LENGTH: Dimension = Dimension::new(1, 0, 0);
    pub const MASS: Dimension = Dimension::new(0, 1, 0);
    pub const TIME: Dimension = Dimension::new(0, 0, 1);
    pub const ENERGY: Dimension = Dimension::new(2, 1, -2);

    pub const fn new(length: i8, mass: i8, time: i8) -> Self {
        Self { length, mass, time }
    }

    pub fn is_dimensionless(self) -> bool {
        self == Self::DIMENSIONLESS
    }

    /// Raise every exponent to an integer power
    pub fn powi(self, exponent: i8) -> Self {
        Self::new(self.length * exponent, self.mass * exponent, self.time * exponent)
    }

    /// `powi` that returns `None` when an exponent leaves the `i8` range
    pub fn checked_powi(self, exponent: i8) -> Option<Self> {
        Some(Self::new(
            self.length.checked_mul(exponent)?,
            self.mass.checked_mul(exponent)?,
            self.time.checked_mul(exponent)?,
        ))
    }

    /// Product of two dimensions, `None` on exponent overflow
    pub fn checked_mul(self, rhs: Self) -> Option<Self> {
        Some(Self::new(
            self.length.checked_add(rhs.length)?,
            self.mass.checked_add(rhs.mass)?,
            self.time.checked_add(rhs.time)?,
        ))
    }
}

impl Mul for Dimension {
    type Output = Dimension;
    fn mul(self, rhs: Self) -> Self::Output {
        Dimension::new(self.length + rhs.length, self.mass + rhs.mass, self.time + rhs.time)
    }
}

impl Div for Dimension {
    type Output = Dimension;
    fn div(self, rhs: Self) -> Self::Output {
        Dimension::new(self.length - rhs.length, self.mass - rhs.mass, self.time - rhs.time)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "dimensionless");
        }
        let parts: Vec<String> = [("[length]", self.length), ("[mass]", self.mass), ("[time]", self.time)]
            .iter()
            .filter(|(_, exp)| *exp != 0)
            .map(|(name, exp)| if *exp == 1 { name.to_string() } else { format!("{}^{}", name, exp) })
            .collect();
        write!(f, "{}", parts.join("*"))
    }
}

// ============================================================================
// Unit Table
// ============================================================================

/// Entry of the unit table: SI factor, dimension, and whether SI prefixes apply.
#[derive(Debug, Clone, Copy)]
struct UnitDef {
    factor: f64,
    dimension: Dimension,
    prefixable: bool,
}

const fn def(factor: f64, dimension: Dimension, prefixable: bool) -> UnitDef {
    UnitDef { factor, dimension, prefixable }
}

static UNIT_TABLE: Lazy<HashMap<&'static str, UnitDef>> = Lazy::new(|| {
    let degree = std::f64::consts::PI / 180.0;
    let electronvolt = ELEMENTARY_CHARGE;
    HashMap::from([
        // Length
        ("m", def(1.0, Dimension::LENGTH, true)),
        ("meter", def(1.0, Dimension::LENGTH, false)),
        ("meters", def(1.0, Dimension::LENGTH, false)),
        ("metre", def(1.0, Dimension::LENGTH, false)),
        ("micron", def(1e-6, Dimension::LENGTH, false)),
        ("microns", def(1e-6, Dimension::LENGTH, false)),
        ("angstrom", def(1e-10, Dimension::LENGTH, false)),
        ("Angstrom", def(1e-10, Dimension::LENGTH, false)),
        ("Å", def(1e-10, Dimension::LENGTH, false)),
        ("Ang", def(1e-10, Dimension::LENGTH, false)),
        // Angle
        ("rad", def(1.0, Dimension::DIMENSIONLESS, true)),
        ("radian", def(1.0, Dimension::DIMENSIONLESS, false)),
        ("radians", def(1.0, Dimension::DIMENSIONLESS, false)),
        ("deg", def(degree, Dimension::DIMENSIONLESS, false)),
        ("degree", def(degree, Dimension::DIMENSIONLESS, false)),
        ("degrees", def(degree, Dimension::DIMENSIONLESS, false)),
        ("°", def(degree, Dimension::DIMENSIONLESS, false)),
        // Mass
        ("g", def(1e-3, Dimension::MASS, true)),
        // Time and frequency
        ("s", def(1.0, Dimension::TIME, true)),
        ("second", def(1.0, Dimension::TIME, false)),
        ("Hz", def(1.0, Dimension::TIME.powi(-1), true)),
        // Energy
        ("J", def(1.0, Dimension::ENERGY, true)),
        ("eV", def(electronvolt, Dimension::ENERGY, true)),
    ])
});

/// SI prefixes accepted in front of prefixable units.
const PREFIXES: &[(&str, f64)] = &[
    ("T", 1e12),
    ("G", 1e9),
    ("M", 1e6),
    ("k", 1e3),
    ("c", 1e-2),
    ("m", 1e-3),
    ("u", 1e-6),
    ("µ", 1e-6),
    ("μ", 1e-6),
    ("n", 1e-9),
    ("p", 1e-12),
    ("f", 1e-15),
];

fn lookup_symbol(symbol: &str) -> CalcResult<(f64, Dimension)> {
    if let Some(unit) = UNIT_TABLE.get(symbol) {
        return Ok((unit.factor, unit.dimension));
    }
    for (prefix, scale) in PREFIXES {
        if let Some(base) = symbol.strip_prefix(prefix) {
            if let Some(unit) = UNIT_TABLE.get(base).filter(|u| u.prefixable) {
                return Ok((scale * unit.factor, unit.dimension));
            }
        }
    }
    Err(CalcError::unknown_unit(symbol))
}

fn is_symbol_char(c: char) -> bool {
    c.is_alphabetic() || c == '°'
}

// ============================================================================
// Unit
// ============================================================================

/// A (possibly compound) unit: the text it was parsed from, its SI factor and
/// its dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    symbol: String,
    factor: f64,
    dimension: Dimension,
}

impl Unit {
    /// The unit of plain numbers
    pub fn dimensionless() -> Self {
        Unit {
            symbol: String::new(),
            factor: 1.0,
            dimension: Dimension::DIMENSIONLESS,
        }
    }

    /// Parse a unit expression such as `"nm"`, `"kg*m^2/s^2"` or `"J s"`.
    ///
    /// Terms are joined by `*`, `/` or whitespace; each term may carry an
    /// integer power written `^n` or `**n`. A `/` applies to the term that
    /// follows it only, so `m/s/s` is an acceleration. The empty string is
    /// the dimensionless unit.
    pub fn parse(expr: &str) -> CalcResult<Self> {
        let chars: Vec<char> = expr.chars().collect();
        let mut factor = 1.0;
        let mut dimension = Dimension::DIMENSIONLESS;
        let mut dividing = false;
        let mut expecting_term = false;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c.is_whitespace() {
                i += 1;
            } else if c == '*' {
                if chars.get(i + 1) == Some(&'*') {
                    return Err(CalcError::invalid_input("unit", expr, "power without a unit"));
                }
                expecting_term = true;
                i += 1;
            } else if c == '/' {
                dividing = true;
                expecting_term = true;
                i += 1;
            } else if is_symbol_char(c) {
                let start = i;
                while i < chars.len() && is_symbol_char(chars[i]) {
                    i += 1;
                }
                let symbol: String = chars[start..i].iter().collect();
                let (term_factor, term_dim) = lookup_symbol(&symbol)?;

                let (power, next) = parse_power(&chars, i, expr)?;
                i = next;
                let out_of_range = || CalcError::invalid_input("unit", expr, "unit power out of range");
                let power = if dividing { power.checked_neg() } else { Some(power) }.ok_or_else(out_of_range)?;
                dimension = term_dim
                    .checked_powi(power)
                    .and_then(|d| dimension.checked_mul(d))
                    .ok_or_else(out_of_range)?;
                factor *= term_factor.powi(i32::from(power));
                dividing = false;
                expecting_term = false;
            } else {
                return Err(CalcError::invalid_input("unit", expr, format!("unexpected character '{}'", c)));
            }
        }

        if expecting_term {
            return Err(CalcError::invalid_input("unit", expr, "dangling operator"));
        }

        Ok(Unit {
            symbol: expr.trim().to_string(),
            factor,
            dimension,
        })
    }

    /// The text this unit was parsed from
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Multiplier taking a magnitude in this unit to SI base units
    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }
}

/// Read an optional `^n` / `**n` suffix starting at `i`; returns the power and
/// the index after it.
fn parse_power(chars: &[char], mut i: usize, expr: &str) -> CalcResult<(i8, usize)> {
    let mut j = i;
    while j < chars.len() && chars[j].is_whitespace() {
        j += 1;
    }
    let marker_len = match (chars.get(j), chars.get(j + 1)) {
        (Some('^'), _) => 1,
        (Some('*'), Some('*')) => 2,
        _ => return Ok((1, i)),
    };
    i = j + marker_len;
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    let start = i;
    if i < chars.len() && (chars[i] == '-' || chars[i] == '+') {
        i += 1;
    }
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    let digits: String = chars[start..i].iter().collect();
    let power = digits
        .parse::<i8>()
        .map_err(|_| CalcError::invalid_input("unit", expr, "power must be a small integer"))?;
    Ok((power, i))
}

// ============================================================================
// Quantity
// ============================================================================

/// A physical quantity: magnitude in SI base units plus its dimension.
///
/// Quantities are immutable; arithmetic returns new values. Multiplying or
/// dividing combines dimensions, conversions check them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    value_si: f64,
    dimension: Dimension,
}

impl Quantity {
    /// Create a quantity from a magnitude expressed in `unit`
    pub fn new(magnitude: f64, unit: &Unit) -> Self {
        Quantity {
            value_si: magnitude * unit.factor,
            dimension: unit.dimension,
        }
    }

    /// Create a quantity directly from its SI magnitude
    pub const fn from_si(value_si: f64, dimension: Dimension) -> Self {
        Quantity { value_si, dimension }
    }

    /// A plain number (also used for angles in radians)
    pub const fn dimensionless(value: f64) -> Self {
        Quantity::from_si(value, Dimension::DIMENSIONLESS)
    }

    /// Magnitude in SI base units
    pub fn si_value(&self) -> f64 {
        self.value_si
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn is_zero(&self) -> bool {
        self.value_si == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.value_si.is_finite()
    }

    /// Magnitude expressed in `unit`, failing on a dimension mismatch
    pub fn value_in(&self, unit: &Unit) -> CalcResult<f64> {
        if self.dimension != unit.dimension {
            return Err(CalcError::dimension_mismatch(self.dimension.to_string(), unit.dimension.to_string()));
        }
        Ok(self.value_si / unit.factor)
    }

    /// Magnitude of a dimensionless quantity (radians for angles)
    pub fn as_dimensionless(&self) -> CalcResult<f64> {
        self.value_in(&Unit::dimensionless())
    }

    /// Arc sine of a dimensionless quantity, in radians
    pub fn asin(self) -> CalcResult<Quantity> {
        Ok(Quantity::dimensionless(self.as_dimensionless()?.asin()))
    }

    /// Sine of an angle
    pub fn sin(self) -> CalcResult<Quantity> {
        Ok(Quantity::dimensionless(self.as_dimensionless()?.sin()))
    }
}

impl Mul for Quantity {
    type Output = Quantity;
    fn mul(self, rhs: Self) -> Self::Output {
        Quantity::from_si(self.value_si * rhs.value_si, self.dimension * rhs.dimension)
    }
}

impl Div for Quantity {
    type Output = Quantity;
    fn div(self, rhs: Self) -> Self::Output {
        Quantity::from_si(self.value_si / rhs.value_si, self.dimension / rhs.dimension)
    }
}

impl Mul<f64> for Quantity {
    type Output = Quantity;
    fn mul(self, rhs: f64) -> Self::Output {
        Quantity::from_si(self.value_si * rhs, self.dimension)
    }
}

impl Div<f64> for Quantity {
    type Output = Quantity;
    fn div(self, rhs: f64) -> Self::Output {
        Quantity::from_si(self.value_si / rhs, self.dimension)
    }
}

impl Div<Quantity> for f64 {
    type Output = Quantity;
    fn div(self, rhs: Quantity) -> Self::Output {
        Quantity::from_si(self / rhs.value_si, Dimension::DIMENSIONLESS / rhs.dimension)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dimension.is_dimensionless() {
            write!(f, "{}", self.value_si)
        } else {
            write!(f, "{} {}", self.value_si, self.dimension)
        }
    }
}

// ============================================================================
// Text Parsing
// ============================================================================

/// Split `text` into its leading number and the remaining unit text.
fn split_number(text: &str) -> Option<(f64, &str)> {
    let bytes = text.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    // at least one digit in the mantissa
    if !bytes[digits_start..i].iter().any(u8::is_ascii_digit) {
        return None;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    let number = text[..i].parse::<f64>().ok()?;
    Some((number, &text[i..]))
}

/// Parse free text into a magnitude and an optional unit.
///
/// Returns `Ok(None)` for blank text. A text without unit yields `unit = None`
/// so the caller decides which unit a bare number is expressed in.
pub fn parse_magnitude_and_unit(text: &str) -> CalcResult<Option<(f64, Option<Unit>)>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let (magnitude, rest) =
        split_number(text).ok_or_else(|| CalcError::invalid_input("quantity", text, "expected a number"))?;
    let rest = rest.trim();
    let rest = rest.strip_prefix('*').map(str::trim_start).unwrap_or(rest);
    if rest.is_empty() {
        return Ok(Some((magnitude, None)));
    }
    Ok(Some((magnitude, Some(Unit::parse(rest)?))))
}

/// Parse free text into a quantity; a bare number is dimensionless.
///
/// ```rust
/// use cdicalc_core::units::parse_quantity;
///
/// let energy = parse_quantity("10 keV").unwrap().unwrap();
/// assert!((energy.si_value() - 1.602176634e-15).abs() < 1e-24);
/// assert!(parse_quantity("").unwrap().is_none());
/// assert!(parse_quantity("5 furlongs").is_err());
/// ```
pub fn parse_quantity(text: &str) -> CalcResult<Option<Quantity>> {
    Ok(parse_magnitude_and_unit(text)?.map(|(magnitude, unit)| match unit {
        Some(unit) => Quantity::new(magnitude, &unit),
        None => Quantity::dimensionless(magnitude),
    }))
}

/// Render `value` with `precision` decimals, followed by `symbol` unless it is
/// empty. Negative zero renders without a sign.
pub fn render(value: f64, precision: usize, symbol: &str) -> String {
    let mut number = format!("{:.*}", precision, value);
    if number.starts_with('-') && number[1..].chars().all(|c| c == '0' || c == '.') {
        number.remove(0);
    }
    if symbol.is_empty() {
        number
    } else {
        format!("{} {}", number, symbol)
    }
}
