use serde::{Deserialize, Serialize};
use std::fmt;

/// Etapa del wizard de intake.
///
/// Transiciones válidas:
/// - `Form` -> `Complete` (alta sin adjunto)
/// - `Form` -> `GoalSelection` (alta + extracción)
/// - `GoalSelection` -> `Complete` (selección guardada)
/// - `GoalSelection` -> `Form` (`back`)
/// - `Complete` -> `Form` (sólo vía `reset`)
///
/// `abandon` lleva cualquier etapa a `Form` con una generación nueva.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WizardStep {
    #[default]
    Form,
    GoalSelection,
    Complete,
}

impl WizardStep {
    pub fn is_terminal(self) -> bool {
        matches!(self, WizardStep::Complete)
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
                        WizardStep::Form => "form",
                        WizardStep::GoalSelection => "goal_selection",
                        WizardStep::Complete => "complete",
                    })
    }
}
