//! # Form
//!
//! The widget capability the engine drives: one text per field plus a shared
//! status line. A GUI binds this to its entry widgets; [`FormState`] is the
//! in-memory version used by the CLI and the tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::EMPTY_MSG;
use crate::fields::{FieldId, ALL_FIELDS};

/// Text storage the engine reads sources from and writes targets to.
pub trait Form {
    /// Current text of `field` (empty when never set)
    fn text(&self, field: FieldId) -> String;

    fn set_text(&mut self, field: FieldId, text: &str);

    fn status(&self) -> String;

    fn set_status(&mut self, message: &str);

    /// True when the field shows nothing but whitespace
    fn is_blank(&self, field: FieldId) -> bool {
        self.text(field).trim().is_empty()
    }
}

/// In-memory form: every field's text and the status line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormState {
    pub fields: BTreeMap<FieldId, String>,
    #[serde(default)]
    pub status: String,
}

impl FormState {
    /// A form with every field present and blank
    pub fn new() -> Self {
        FormState {
            fields: ALL_FIELDS.iter().map(|f| (*f, EMPTY_MSG.to_string())).collect(),
            status: String::new(),
        }
    }

    /// Fields with non-blank text, in registry order
    pub fn filled(&self) -> impl Iterator<Item = (FieldId, &str)> + '_ {
        self.fields
            .iter()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(field, text)| (*field, text.as_str()))
    }
}

impl Form for FormState {
    fn text(&self, field: FieldId) -> String {
        self.fields.get(&field).cloned().unwrap_or_default()
    }

    fn set_text(&mut self, field: FieldId, text: &str) {
        self.fields.insert(field, text.to_string());
    }

    fn status(&self) -> String {
        self.status.clone()
    }

    fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_form_is_blank() {
        let form = FormState::new();
        assert_eq!(form.fields.len(), ALL_FIELDS.len());
        assert!(ALL_FIELDS.iter().all(|f| form.is_blank(*f)));
        assert_eq!(form.filled().count(), 0);
    }

    #[test]
    fn test_whitespace_is_blank() {
        let mut form = FormState::new();
        form.set_text(FieldId::BeamSize, "   ");
        assert!(form.is_blank(FieldId::BeamSize));
        form.set_text(FieldId::BeamSize, "1 um");
        assert!(!form.is_blank(FieldId::BeamSize));
        assert_eq!(form.filled().collect::<Vec<_>>(), vec![(FieldId::BeamSize, "1 um")]);
    }

    #[test]
    fn test_serializes_with_field_names() {
        let mut form = FormState::new();
        form.set_text(FieldId::XrayEnergy, "10 keV");
        let json = serde_json::to_value(&form).unwrap();
        assert_eq!(json["fields"]["xray_energy"], "10 keV");
        assert_eq!(json["status"], "");
    }
}
