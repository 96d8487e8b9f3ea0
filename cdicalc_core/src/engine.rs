//! # Recalculation Engine
//!
//! Propagates one field edit through the [dependency graph](crate::graph).
//!
//! A pass is run-to-completion over an explicit work-list:
//!
//! 1. The raw text is written to the edited field and validated.
//! 2. A valid or blank value schedules the field's reactions. A rejected value
//!    writes `ERROR` to the targets of every reaction whose guard applies,
//!    and the status line gets the field's help message.
//! 3. Each formula re-reads its sources from the form, writes its targets, and
//!    schedules its chain. Writing the X-ray wavelength also schedules the
//!    formulas that read it, but only when its text actually changed.
//!
//! Follow-ups run depth-first: everything a formula schedules runs before the
//! formula's remaining siblings. A pass that takes more than
//! [`EngineSettings::max_steps`] steps is a wiring error.
//!
//! ## Example
//!
//! ```rust
//! use cdicalc_core::engine::Engine;
//! use cdicalc_core::fields::FieldId;
//! use cdicalc_core::form::{Form, FormState};
//!
//! let mut engine = Engine::default();
//! let mut form = FormState::new();
//! engine.field_changed(&mut form, FieldId::XrayEnergy, "10 keV").unwrap();
//! assert_eq!(form.text(FieldId::XrayWavelength), "1.2398 angstrom");
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::constants::{EMPTY_MSG, ERROR_MSG};
use crate::errors::{CalcError, CalcResult};
use crate::fields::FieldId;
use crate::form::Form;
use crate::formulas::{self, Outcome, ZeroPolicy};
use crate::graph::{reactions, write_notifications, Formula, Reaction, ALL_FORMULAS};
use crate::units::Quantity;

/// Default work-list bound. The deepest legitimate pass takes a few dozen steps.
pub const DEFAULT_MAX_STEPS: usize = 256;

// =============================================================================
// SETTINGS
// =============================================================================

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Zero-divisor handling per formula; formulas not listed use the default
    #[serde(default)]
    pub zero_policies: BTreeMap<Formula, ZeroPolicy>,

    /// Maximum formulas run in a single pass
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            zero_policies: BTreeMap::new(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl EngineSettings {
    /// Settings where every zero divisor blanks the target instead of showing ERROR
    pub fn zero_as_empty() -> Self {
        let zero_policies = ALL_FORMULAS.iter().map(|f| (*f, ZeroPolicy::Empty)).collect();
        EngineSettings {
            zero_policies,
            ..Default::default()
        }
    }

    pub fn with_zero_policy(mut self, formula: Formula, policy: ZeroPolicy) -> Self {
        self.zero_policies.insert(formula, policy);
        self
    }

    pub fn zero_policy(&self, formula: Formula) -> ZeroPolicy {
        self.zero_policies.get(&formula).copied().unwrap_or_default()
    }
}

// =============================================================================
// PASS REPORT
// =============================================================================

/// How the edited field's text was judged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validation {
    Valid,
    Empty,
    Rejected(CalcError),
}

/// Summary of one propagation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    pub field: FieldId,
    pub validation: Validation,
    /// Work-list steps taken, guarded-out formulas included
    pub steps: usize,
    /// Fields whose text the engine changed, in order of first change
    pub changed: Vec<FieldId>,
}

/// Live read of a source field
fn read<S: Form + ?Sized>(form: &S, field: FieldId) -> Option<Quantity> {
    field.to_quantity(&form.text(field))
}

/// Work-list bookkeeping for one pass.
struct Pass {
    edited: FieldId,
    stack: Vec<Reaction>,
    /// Notifications raised by writes of the running formula
    pending: Vec<Reaction>,
    steps: usize,
    changed: Vec<FieldId>,
}

impl Pass {
    fn new(edited: FieldId) -> Self {
        Pass {
            edited,
            stack: Vec::new(),
            pending: Vec::new(),
            steps: 0,
            changed: Vec::new(),
        }
    }

    /// Push so that `reactions[0]` is popped first
    fn schedule(&mut self, reactions: &[Reaction]) {
        self.stack.extend(reactions.iter().rev());
    }

    fn flush_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        self.schedule(&pending);
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Owns the derived (non-field) state and runs propagation passes.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    settings: EngineSettings,
    /// d2θ, angle between adjacent fringes seen from the sample
    angular_separation: Outcome,
    /// dq, momentum transfer spanned by d2θ
    momentum_transfer: Outcome,
}

impl Engine {
    pub fn new(settings: EngineSettings) -> Self {
        Engine {
            settings,
            ..Default::default()
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn angular_separation(&self) -> Outcome {
        self.angular_separation
    }

    pub fn momentum_transfer(&self) -> Outcome {
        self.momentum_transfer
    }

    /// Handle a user edit of `field` and propagate it.
    ///
    /// Rejected text is not an error of the pass: it is reported in
    /// [`PassReport::validation`] and shown on the form. `Err` means the
    /// wiring itself is broken (bad target list, runaway pass, dimension slip
    /// inside a formula).
    pub fn field_changed<S: Form + ?Sized>(
        &mut self,
        form: &mut S,
        field: FieldId,
        raw_text: &str,
    ) -> CalcResult<PassReport> {
        debug!(field = %field, text = raw_text, "field edited");

        let validation = match field.parse(raw_text) {
            Ok(Some(_)) => Validation::Valid,
            Ok(None) => Validation::Empty,
            Err(e) => Validation::Rejected(e),
        };

        let text_changed = form.text(field) != raw_text;
        form.set_text(field, raw_text);

        let mut pass = Pass::new(field);
        if text_changed {
            pass.schedule(write_notifications(field));
        }

        match &validation {
            Validation::Rejected(reason) => {
                debug!(field = %field, reason = %reason, "input rejected");
                form.set_status(&field.help_message());
                for reaction in reactions(field) {
                    if reaction.formula.applies(&*form, field) {
                        self.invalidate(reaction.formula);
                        for target in reaction.targets {
                            self.write(form, &mut pass, *target, ERROR_MSG);
                        }
                    }
                }
                pass.flush_pending();
            }
            Validation::Valid | Validation::Empty => {
                form.set_status(EMPTY_MSG);
                pass.schedule(reactions(field));
            }
        }

        if let Err(e) = self.drain(form, &mut pass) {
            error!(field = %field, error = %e, "propagation aborted");
            return Err(e);
        }

        debug!(field = %field, steps = pass.steps, changed = pass.changed.len(), "pass complete");
        Ok(PassReport {
            field,
            validation,
            steps: pass.steps,
            changed: pass.changed,
        })
    }

    fn drain<S: Form + ?Sized>(&mut self, form: &mut S, pass: &mut Pass) -> CalcResult<()> {
        while let Some(reaction) = pass.stack.pop() {
            pass.steps += 1;
            if pass.steps > self.settings.max_steps {
                return Err(CalcError::internal(format!(
                    "propagation exceeded {} steps at {}",
                    self.settings.max_steps,
                    reaction.formula.name()
                )));
            }

            if !reaction.formula.applies(&*form, pass.edited) {
                trace!(formula = reaction.formula.name(), "guarded out");
                if reaction.formula == Formula::PixelAngularStep {
                    self.forget_geometry();
                }
                continue;
            }

            self.run(form, pass, reaction)?;
            pass.schedule(reaction.formula.chain());
            pass.flush_pending();
        }
        Ok(())
    }

    /// Evaluate one formula and write its targets.
    fn run<S: Form + ?Sized>(&mut self, form: &mut S, pass: &mut Pass, reaction: Reaction) -> CalcResult<()> {
        use FieldId::*;

        let formula = reaction.formula;
        let zero = self.settings.zero_policy(formula);
        debug!(formula = formula.name(), "running");

        match formula {
            Formula::Clear => {
                for target in reaction.targets {
                    self.write(form, pass, *target, EMPTY_MSG);
                }
            }
            Formula::AngularSampling => {
                let out = formulas::angular_sampling(
                    read(&*form, CrystalSize),
                    read(&*form, RockingAngle),
                    read(&*form, XrayWavelength),
                    zero,
                )?;
                self.write_outcome(form, pass, reaction.targets, out)?;
            }
            Formula::MaxRockingAngle => {
                if !form.is_blank(RockingAngle) {
                    self.write_outcome(form, pass, reaction.targets, Outcome::Empty)?;
                    return Ok(());
                }
                let out = formulas::max_rocking_angle(
                    read(&*form, CrystalSize),
                    read(&*form, AngularSampling),
                    read(&*form, XrayWavelength),
                    zero,
                )?;
                self.write_outcome(form, pass, reaction.targets, out)?;
                self.write(form, pass, RockingAngle, EMPTY_MSG);
            }
            Formula::PixelAngularStep => {
                let distance = read(&*form, DetectorDistance).or_else(|| read(&*form, MinDetectorDistance));
                self.angular_separation =
                    formulas::pixel_angular_step(read(&*form, FringeSpacing), read(&*form, DetectorPixelsize), distance, zero)?;
                trace!(d2theta = ?self.angular_separation, "angular separation updated");
            }
            Formula::MomentumTransferDelta => {
                self.momentum_transfer =
                    formulas::momentum_transfer_delta(read(&*form, XrayWavelength), self.angular_separation, zero)?;
                trace!(dq = ?self.momentum_transfer, "momentum transfer updated");
            }
            Formula::CrystalSizeFromDq => {
                let out = formulas::crystal_size_from_dq(self.momentum_transfer, zero)?;
                self.write_outcome(form, pass, reaction.targets, out)?;
            }
            Formula::MinDetectorDistance => {
                if !form.is_blank(DetectorDistance) {
                    self.write_outcome(form, pass, reaction.targets, Outcome::Empty)?;
                    return Ok(());
                }
                let out = formulas::min_detector_distance(
                    read(&*form, FringeSpacing),
                    read(&*form, DetectorPixelsize),
                    read(&*form, CrystalSize),
                    read(&*form, XrayWavelength),
                    zero,
                )?;
                self.write_outcome(form, pass, reaction.targets, out)?;
                self.write(form, pass, DetectorDistance, EMPTY_MSG);
            }
            Formula::EnergyWavelengthConversion => {
                let [target] = reaction.targets else {
                    return Err(CalcError::internal(format!(
                        "energy/wavelength conversion needs exactly one target, got {}",
                        reaction.targets.len()
                    )));
                };
                let source = match target {
                    XrayWavelength => XrayEnergy,
                    XrayEnergy => XrayWavelength,
                    other => {
                        return Err(CalcError::internal(format!("cannot convert into {}", other)));
                    }
                };
                let out = formulas::energy_wavelength_conversion(read(&*form, source), zero)?;
                self.write_outcome(form, pass, reaction.targets, out)?;
            }
            Formula::HorizontalDivergence => {
                let out = formulas::divergence(read(&*form, HorizontalSourceSize), read(&*form, PrimarySourceDistance), zero)?;
                self.write_outcome(form, pass, reaction.targets, out)?;
            }
            Formula::VerticalDivergence => {
                let out = formulas::divergence(read(&*form, VerticalSourceSize), read(&*form, PrimarySourceDistance), zero)?;
                self.write_outcome(form, pass, reaction.targets, out)?;
            }
            Formula::TransverseCoherenceLength => {
                for target in reaction.targets {
                    let divergence = match target {
                        HorizontalCoherenceLength => HorizontalDivergence,
                        VerticalCoherenceLength => VerticalDivergence,
                        other => return Err(CalcError::internal(format!("no divergence feeds {}", other))),
                    };
                    let out =
                        formulas::transverse_coherence_length(read(&*form, XrayWavelength), read(&*form, divergence), zero)?;
                    self.write_outcome(form, pass, &[*target], out)?;
                }
            }
            Formula::SecondarySlitOpening => {
                for target in reaction.targets {
                    let coherence = match target {
                        SecondarySlitsHorizontal => HorizontalCoherenceLength,
                        SecondarySlitsVertical => VerticalCoherenceLength,
                        other => return Err(CalcError::internal(format!("no coherence length feeds {}", other))),
                    };
                    let out = formulas::secondary_slit_opening(
                        read(&*form, SecondarySourceDistance),
                        read(&*form, XrayWavelength),
                        read(&*form, coherence),
                        zero,
                    )?;
                    self.write_outcome(form, pass, &[*target], out)?;
                }
            }
            Formula::SpeckleSize => {
                let out = formulas::speckle_size(
                    read(&*form, XrayWavelength),
                    read(&*form, DetectorDistance),
                    read(&*form, BeamSize),
                    zero,
                )?;
                self.write_outcome(form, pass, reaction.targets, out)?;
            }
        }
        Ok(())
    }

    fn write_outcome<S: Form + ?Sized>(
        &mut self,
        form: &mut S,
        pass: &mut Pass,
        targets: &[FieldId],
        outcome: Outcome,
    ) -> CalcResult<()> {
        for target in targets {
            let text = outcome.render(*target)?;
            self.write(form, pass, *target, &text);
        }
        Ok(())
    }

    /// Write `text` into `field` if it differs, queueing the field's notifications
    fn write<S: Form + ?Sized>(&mut self, form: &mut S, pass: &mut Pass, field: FieldId, text: &str) {
        if form.text(field) == text {
            return;
        }
        trace!(field = %field, text, "write");
        form.set_text(field, text);
        if !pass.changed.contains(&field) {
            pass.changed.push(field);
        }
        pass.pending.extend_from_slice(write_notifications(field));
        if field == FieldId::DetectorDistance && text.trim().is_empty() {
            self.forget_geometry();
        }
    }

    /// Derived state produced by `formula` no longer matches its sources
    fn invalidate(&mut self, formula: Formula) {
        match formula {
            Formula::PixelAngularStep => {
                self.angular_separation = Outcome::Undefined;
                self.momentum_transfer = Outcome::Undefined;
            }
            Formula::MomentumTransferDelta => self.momentum_transfer = Outcome::Undefined,
            _ => {}
        }
    }

    /// The detector geometry is incomplete; drop d2θ and dq
    fn forget_geometry(&mut self) {
        self.angular_separation = Outcome::Empty;
        self.momentum_transfer = Outcome::Empty;
    }
}
