//! # cdicalc_core - Coherent Diffraction Imaging Calculator Engine
//!
//! `cdicalc_core` computes the experimental parameters of a coherent X-ray
//! diffraction measurement: sampling of Bragg CDI rocking curves and detector
//! geometry, photon energy/wavelength, beam coherence and speckle size.
//!
//! The calculator is a form: the user edits one field, and every field that
//! depends on it is recomputed, possibly in a chain. Fields carry text with
//! units ("250 nm", "10 keV"); values that cannot be computed show `ERROR`,
//! values lacking inputs stay blank.
//!
//! ## Design Philosophy
//!
//! - **Static wiring**: the dependency graph is a set of match tables, not
//!   callbacks registered at runtime
//! - **Pure formulas**: physics lives in functions over unit-checked quantities
//! - **Explicit work-list**: propagation is bounded and depth-first
//! - **Rich Errors**: structured error types, not just strings
//!
//! ## Quick Start
//!
//! ```rust
//! use cdicalc_core::{EngineSettings, Session};
//!
//! let mut session = Session::new(EngineSettings::default());
//! session.edit("xray_wavelength", "1.5 angstrom").unwrap();
//! session.edit("rocking_angle", "0.01 deg").unwrap();
//! session.edit("crystal_size", "250 nm").unwrap();
//! assert_eq!(session.text("angular_sampling").unwrap(), "1.7");
//! ```
//!
//! ## Modules
//!
//! - [`units`] - Dimension-checked quantities and the unit parser
//! - [`fields`] - The field registry and text <-> quantity adapter
//! - [`formulas`] - Pure physics functions
//! - [`graph`] - Reaction table, chains and guards
//! - [`engine`] - Propagation passes and derived state
//! - [`form`] - The text storage the engine drives
//! - [`session`] - Engine + form facade for presentation layers
//! - [`config_file`] - Field texts on disk with atomic saves
//! - [`errors`] - Structured error types

pub mod config_file;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod fields;
pub mod form;
pub mod formulas;
pub mod graph;
pub mod session;
pub mod units;

// Re-export commonly used types at crate root for convenience
pub use engine::{Engine, EngineSettings, PassReport, Validation};
pub use errors::{CalcError, CalcResult};
pub use fields::FieldId;
pub use form::{Form, FormState};
pub use formulas::{Outcome, ZeroPolicy};
pub use session::Session;
pub use units::{Dimension, Quantity, Unit};
