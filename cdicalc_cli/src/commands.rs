//! Line commands of the interactive calculator.
//!
//! ```text
//! crystal_size = 250 nm     edit a field and propagate
//! format crystal_size 0.25 um
//! show | fields | status | save <path> | load <path> | help | quit
//! ```

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Context, Result};
use cdicalc_core::fields::{FieldId, ALL_FIELDS};
use cdicalc_core::{Form, Session, Validation};

/// What the loop should do after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Print(String),
    Quit,
}

pub const HELP: &str = "\
Commands:
  <field> = <text>       set a field, e.g. crystal_size = 250 nm
  <field> =              clear a field
  format <field> <text>  reformat text in the field's unit
  show                   print the whole form
  fields                 list fields with units and examples
  status                 print the status line
  save <path>            save the input fields (.json added if missing)
  load <path>            load fields from a config file
  help                   this text
  quit                   leave";

/// Fields grouped as the calculator's tabs
const TABS: &[(&str, &[FieldId])] = &[
    (
        "Bragg CDI",
        &[
            FieldId::CrystalSize,
            FieldId::FringeSpacing,
            FieldId::DetectorPixelsize,
            FieldId::DetectorDistance,
            FieldId::MinDetectorDistance,
            FieldId::AngularSampling,
            FieldId::RockingAngle,
            FieldId::MaxRockingAngle,
        ],
    ),
    ("X-rays", &[FieldId::XrayEnergy, FieldId::XrayWavelength]),
    (
        "Coherence",
        &[
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
        ],
    ),
    ("Forward CDI", &[FieldId::BeamSize, FieldId::SpeckleSize]),
];

/// Run one input line against the session
pub fn execute(session: &mut Session, line: &str) -> Result<Reply> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Reply::Print(String::new()));
    }

    if let Some((name, text)) = line.split_once('=') {
        return edit(session, name.trim(), text.trim());
    }

    let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    match command {
        "show" => Ok(Reply::Print(render_form(session))),
        "fields" => Ok(Reply::Print(render_fields())),
        "status" => Ok(Reply::Print(session.status())),
        "format" => {
            let (name, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            let formatted = session.normalize(name, text.trim())?;
            Ok(Reply::Print(format!("{} = {}", name, formatted)))
        }
        "save" => {
            if rest.is_empty() {
                bail!("usage: save <path>");
            }
            let written = session
                .save_config(Path::new(rest))
                .with_context(|| format!("saving {}", rest))?;
            Ok(Reply::Print(format!("saved {}", written.display())))
        }
        "load" => {
            if rest.is_empty() {
                bail!("usage: load <path>");
            }
            let count = session
                .load_config(Path::new(rest))
                .with_context(|| format!("loading {}", rest))?;
            Ok(Reply::Print(format!("loaded {} fields", count)))
        }
        "help" | "?" => Ok(Reply::Print(HELP.to_string())),
        "quit" | "exit" | "q" => Ok(Reply::Quit),
        other => bail!("unknown command '{}' (try help)", other),
    }
}

/// Apply an edit and describe what changed
pub fn edit(session: &mut Session, name: &str, text: &str) -> Result<Reply> {
    let report = session.edit(name, text)?;

    let mut out = String::new();
    if let Validation::Rejected(_) = report.validation {
        let _ = writeln!(out, "! {}", session.status());
    }
    for field in &report.changed {
        let _ = writeln!(out, "  {} = {}", field, session.form().text(*field));
    }
    Ok(Reply::Print(out.trim_end().to_string()))
}

/// The whole form, one tab per block
pub fn render_form(session: &Session) -> String {
    let width = ALL_FIELDS.iter().map(|f| f.name().len()).max().unwrap_or(0);
    let mut out = String::new();
    for (title, fields) in TABS {
        let _ = writeln!(out, "[{}]", title);
        for field in fields.iter() {
            let marker = if field.spec().editable { ' ' } else { '*' };
            let _ = writeln!(out, " {}{:<width$}  {}", marker, field.name(), session.form().text(*field));
        }
    }
    let status = session.status();
    if !status.is_empty() {
        let _ = writeln!(out, "! {}", status);
    }
    out.trim_end().to_string()
}

fn render_fields() -> String {
    let mut out = String::new();
    for field in ALL_FIELDS {
        let spec = field.spec();
        let unit = if spec.canonical_unit.is_empty() { "-" } else { spec.canonical_unit };
        let kind = if spec.editable { "input" } else { "computed" };
        let _ = writeln!(out, "{:<28} {:<9} {:<9} {}", spec.name, unit, kind, spec.example);
    }
    out.trim_end().to_string()
}

/// Parse a `field=value` argument
pub fn parse_assignment(arg: &str) -> Result<(String, String)> {
    let Some((name, text)) = arg.split_once('=') else {
        bail!("expected field=value, got '{}'", arg);
    };
    Ok((name.trim().to_string(), text.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdicalc_core::EngineSettings;

    fn session() -> Session {
        Session::new(EngineSettings::default())
    }

    fn printed(reply: Reply) -> String {
        match reply {
            Reply::Print(text) => text,
            Reply::Quit => panic!("unexpected quit"),
        }
    }

    #[test]
    fn test_edit_reports_changes() {
        let mut s = session();
        let out = printed(execute(&mut s, "xray_energy = 10 keV").unwrap());
        assert_eq!(out, "  xray_wavelength = 1.2398 angstrom");
    }

    #[test]
    fn test_rejected_edit_shows_status() {
        let mut s = session();
        let out = printed(execute(&mut s, "xray_energy = 3 m").unwrap());
        assert!(out.starts_with("! enter a valid xray_energy (keV)"), "{}", out);
        assert!(out.contains("xray_wavelength = ERROR"));
    }

    #[test]
    fn test_unknown_field_and_command() {
        let mut s = session();
        assert!(execute(&mut s, "temperature = 300").is_err());
        assert!(execute(&mut s, "frobnicate").is_err());
        assert!(execute(&mut s, "save").is_err());
    }

    #[test]
    fn test_format_and_quit() {
        let mut s = session();
        let out = printed(execute(&mut s, "format crystal_size 0.25 um").unwrap());
        assert_eq!(out, "crystal_size = 250 nm");
        assert_eq!(execute(&mut s, "quit").unwrap(), Reply::Quit);
    }

    #[test]
    fn test_show_lists_every_field() {
        let mut s = session();
        execute(&mut s, "beam_size = 1 um").unwrap();
        let out = printed(execute(&mut s, "show").unwrap());
        for field in ALL_FIELDS {
            assert!(out.contains(field.name()), "{} missing", field);
        }
        assert!(out.contains("1 um"));
        let listed: usize = TABS.iter().map(|(_, fields)| fields.len()).sum();
        assert_eq!(listed, ALL_FIELDS.len());
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("crystal_size=250 nm").unwrap(),
            ("crystal_size".to_string(), "250 nm".to_string())
        );
        assert!(parse_assignment("crystal_size").is_err());
    }
}
