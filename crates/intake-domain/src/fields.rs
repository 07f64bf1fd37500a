//! Campos de la entidad primaria (alumno) y reglas de validación.
//!
//! Las reglas se configuran desde fuera: el core sólo sabe que debe validar
//! `PrimaryFields` contra un `FieldRules` antes de tocar la red.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Grados aceptados por el formulario de alta (Kindergarten a 5º).
pub const STUDENT_GRADES: &[&str] = &["K", "1", "2", "3", "4", "5"];

/// Reglas por defecto del alumno: `name` (<=100) y `grade` (<=10, lista cerrada).
pub static STUDENT_FIELD_RULES: Lazy<FieldRules> = Lazy::new(|| {
    FieldRules::new(vec![FieldRule::required("name").max_len(100),
                         FieldRule::required("grade").max_len(10).allowed(STUDENT_GRADES.iter().copied())])
});

/// Valores introducidos por el usuario, en el orden del formulario.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrimaryFields(IndexMap<String, String>);

impl PrimaryFields {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Builder: añade o reemplaza un campo.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copia con los valores recortados (lo que realmente se envía).
    pub fn trimmed(&self) -> Self {
        Self(self.0.iter().map(|(k, v)| (k.clone(), v.trim().to_string())).collect())
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(self.0.iter()
                                        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                                        .collect())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PrimaryFields {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Regla de un campo concreto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    pub name: String,
    pub required: bool,
    pub max_len: Option<usize>,
    pub allowed: Option<Vec<String>>,
}

impl FieldRule {
    pub fn required(name: impl Into<String>) -> Self {
        Self { name: name.into(),
               required: true,
               max_len: None,
               allowed: None }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self { required: false,
               ..Self::required(name) }
    }

    pub fn max_len(mut self, max: usize) -> Self {
        self.max_len = Some(max);
        self
    }

    pub fn allowed<I, S>(mut self, values: I) -> Self
        where I: IntoIterator<Item = S>,
              S: Into<String>
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    fn check(&self, fields: &PrimaryFields) -> Result<(), DomainError> {
        let value = fields.get(&self.name).map(str::trim).unwrap_or("");
        if value.is_empty() {
            if self.required {
                return Err(DomainError::MissingField { field: self.name.clone() });
            }
            return Ok(());
        }
        if let Some(max) = self.max_len {
            if value.chars().count() > max {
                return Err(DomainError::TooLong { field: self.name.clone(),
                                                  max });
            }
        }
        if let Some(allowed) = &self.allowed {
            if !allowed.iter().any(|a| a == value) {
                return Err(DomainError::NotAllowed { field: self.name.clone(),
                                                     value: value.to_string() });
            }
        }
        Ok(())
    }
}

/// Conjunto ordenado de reglas. La validación se detiene en el primer fallo,
/// siguiendo el orden de declaración.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldRules {
    rules: Vec<FieldRule>,
}

impl FieldRules {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }

    /// Reglas mínimas: sólo obligatoriedad, sin límites ni listas cerradas.
    pub fn required_names<I, S>(names: I) -> Self
        where I: IntoIterator<Item = S>,
              S: Into<String>
    {
        Self::new(names.into_iter().map(FieldRule::required).collect())
    }

    pub fn student() -> Self {
        STUDENT_FIELD_RULES.clone()
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    pub fn validate(&self, fields: &PrimaryFields) -> Result<(), DomainError> {
        self.rules.iter().try_for_each(|r| r.check(fields))
    }
}
