use serde::{Deserialize, Serialize};
use std::fmt;

/// Objetivo de aprendizaje extraído de un documento IEP.
///
/// La identidad es estructural (`text` + `baseline`): dos objetivos
/// deserializados en momentos distintos son el mismo si coinciden en ambos
/// campos. Nunca se usa la posición en la lista.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Goal {
    #[serde(rename = "goal")]
    pub text: String,
    pub baseline: String,
}

impl Goal {
    pub fn new(text: impl Into<String>, baseline: impl Into<String>) -> Self {
        Self { text: text.into(),
               baseline: baseline.into() }
    }

    /// Resumen corto para listados (50 caracteres).
    pub fn preview(&self) -> String {
        const PREVIEW_CHARS: usize = 50;
        if self.text.chars().count() <= PREVIEW_CHARS {
            return self.text.clone();
        }
        let head: String = self.text.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (baseline: {})", self.text, self.baseline)
    }
}

/// Objetivo ya persistido en el backend para un alumno.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredGoal {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(rename = "goal_text")]
    pub text: String,
    #[serde(default)]
    pub baseline: Option<String>,
}
