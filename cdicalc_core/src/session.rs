//! # Session
//!
//! One engine bound to one form. This is what a presentation layer drives:
//! edits and blur normalization by field name, config load/save, and
//! snapshots for display.
//!
//! ## Example
//!
//! ```rust
//! use cdicalc_core::engine::EngineSettings;
//! use cdicalc_core::session::Session;
//!
//! let mut session = Session::new(EngineSettings::default());
//! session.edit("xray_energy", "10 keV")?;
//! assert_eq!(session.text("xray_wavelength")?, "1.2398 angstrom");
//!
//! // leaving a field reformats it in its canonical unit
//! assert_eq!(session.normalize("xray_energy", "10000 eV")?, "10.00 keV");
//! # Ok::<(), cdicalc_core::errors::CalcError>(())
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::error;

use crate::config_file;
use crate::engine::{Engine, EngineSettings, PassReport};
use crate::errors::CalcResult;
use crate::fields::{FieldId, ALL_FIELDS};
use crate::form::{Form, FormState};

#[derive(Debug, Clone)]
pub struct Session<F: Form = FormState> {
    engine: Engine,
    form: F,
}

impl Session<FormState> {
    /// A session over a blank in-memory form
    pub fn new(settings: EngineSettings) -> Self {
        Session::with_form(FormState::new(), settings)
    }
}

impl<F: Form> Session<F> {
    pub fn with_form(form: F, settings: EngineSettings) -> Self {
        Session {
            engine: Engine::new(settings),
            form,
        }
    }

    pub fn form(&self) -> &F {
        &self.form
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn status(&self) -> String {
        self.form.status()
    }

    /// Current text of the named field
    pub fn text(&self, name: &str) -> CalcResult<String> {
        Ok(self.form.text(name.parse()?))
    }

    /// Apply a user edit to the named field and propagate it
    pub fn edit(&mut self, name: &str, raw_text: &str) -> CalcResult<PassReport> {
        let field: FieldId = name.parse().inspect_err(|e| error!(error = %e, "edit of unknown field"))?;
        self.edit_field(field, raw_text)
    }

    pub fn edit_field(&mut self, field: FieldId, raw_text: &str) -> CalcResult<PassReport> {
        self.engine.field_changed(&mut self.form, field, raw_text)
    }

    /// Reformat the named field's text as on focus loss. Touches nothing else.
    pub fn normalize(&mut self, name: &str, raw_text: &str) -> CalcResult<String> {
        let field: FieldId = name.parse()?;
        let text = field.normalize(raw_text);
        self.form.set_text(field, &text);
        Ok(text)
    }

    /// Every field's current text
    pub fn snapshot(&self) -> BTreeMap<FieldId, String> {
        ALL_FIELDS.iter().map(|f| (*f, self.form.text(*f))).collect()
    }

    /// Put the texts from a config file into their fields.
    ///
    /// Formulas do not run: computed fields refresh on the next edit of
    /// one of their sources. Returns how many fields were set.
    pub fn load_config(&mut self, path: &Path) -> CalcResult<usize> {
        let texts = config_file::load_config(path)?;
        for (field, text) in &texts {
            self.form.set_text(*field, text);
        }
        Ok(texts.len())
    }

    /// Save the editable fields; computed fields are not persisted
    pub fn save_config(&self, path: &Path) -> CalcResult<PathBuf> {
        let texts: BTreeMap<FieldId, String> = ALL_FIELDS
            .iter()
            .filter(|f| f.spec().editable)
            .map(|f| (*f, self.form.text(*f)))
            .collect();
        config_file::save_config(path, &texts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_edit_by_name() {
        let mut session = Session::new(EngineSettings::default());
        let report = session.edit("xray_energy", "10 keV").unwrap();
        assert_eq!(report.field, FieldId::XrayEnergy);
        assert_eq!(session.text("xray_wavelength").unwrap(), "1.2398 angstrom");
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let mut session = Session::new(EngineSettings::default());
        let err = session.edit("sample_temperature", "300 K").unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_FIELD");
        assert!(session.text("sample_temperature").is_err());
        assert!(session.normalize("sample_temperature", "1").is_err());
    }

    #[test]
    fn test_normalize_touches_only_its_field() {
        let mut session = Session::new(EngineSettings::default());
        assert_eq!(session.normalize("xray_energy", "10000 eV").unwrap(), "10.00 keV");
        assert_eq!(session.text("xray_wavelength").unwrap(), "");
        assert_eq!(session.normalize("crystal_size", "0.25 um").unwrap(), "250 nm");
        assert_eq!(session.normalize("crystal_size", "").unwrap(), "");
        assert_eq!(session.normalize("crystal_size", "five").unwrap(), "ERROR");
        assert_eq!(session.text("crystal_size").unwrap(), "ERROR");
        assert_eq!(session.normalize("fringe_spacing", "4.96").unwrap(), "5.0");
    }

    #[test]
    fn test_config_round_trip_keeps_editable_fields() {
        let dir = tempdir().unwrap();
        let mut session = Session::new(EngineSettings::default());
        session.edit("xray_wavelength", "1.5 angstrom").unwrap();
        session.edit("fringe_spacing", "5").unwrap();
        session.edit("detector_pixelsize", "55 um").unwrap();
        session.edit("crystal_size", "250 nm").unwrap();
        assert_eq!(session.text("min_detector_distance").unwrap(), "0.46 m");

        let written = session.save_config(&dir.path().join("id01")).unwrap();
        let saved = config_file::load_config(&written).unwrap();
        assert_eq!(saved[&FieldId::CrystalSize], "250 nm");
        assert!(!saved.contains_key(&FieldId::MinDetectorDistance));

        let mut restored = Session::new(EngineSettings::default());
        let count = restored.load_config(&written).unwrap();
        assert_eq!(count, saved.len());
        assert_eq!(restored.text("xray_wavelength").unwrap(), "1.5 angstrom");
        // loading does not recompute
        assert_eq!(restored.text("min_detector_distance").unwrap(), "");
    }

    #[test]
    fn test_snapshot_covers_every_field() {
        let session = Session::new(EngineSettings::default());
        assert_eq!(session.snapshot().len(), ALL_FIELDS.len());
    }
}
