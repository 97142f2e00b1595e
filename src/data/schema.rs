//! Declarative parameter schema for the DR methods
//!
//! Each method exposes a basic and an advanced tier of tunable fields plus a
//! set of named presets. The schema is plain serializable data; the form
//! renderer walks it to build its controls.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current or default value of one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Number(v) => write!(f, "{}", v),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Number(v as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

/// Kind and constraints of one tunable field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldSpec {
    /// Slider over `[min, max]` stepped by `step`
    Range {
        min: f64,
        max: f64,
        step: f64,
        default: f64,
    },
    /// Closed set of string options
    Select {
        options: Vec<String>,
        default: String,
    },
    /// On/off toggle
    Checkbox { default: bool },
}

impl FieldSpec {
    pub fn default_value(&self) -> FieldValue {
        match self {
            FieldSpec::Range { min, max, step, default } => {
                FieldValue::Number(snap_to_step(*default, *min, *max, *step))
            }
            FieldSpec::Select { default, .. } => FieldValue::Text(default.clone()),
            FieldSpec::Checkbox { default } => FieldValue::Bool(*default),
        }
    }

    /// Coerce an incoming value the way a native control would accept it.
    ///
    /// Numbers are clamped into range and snapped to the step grid; options
    /// outside the closed set are refused (`None`).
    pub fn sanitize(&self, value: &FieldValue) -> Option<FieldValue> {
        match self {
            FieldSpec::Range { min, max, step, .. } => {
                let v = value.as_f64().filter(|v| v.is_finite())?;
                Some(FieldValue::Number(snap_to_step(v, *min, *max, *step)))
            }
            FieldSpec::Select { options, .. } => {
                let s = value.as_str()?;
                options
                    .iter()
                    .any(|o| o == s)
                    .then(|| FieldValue::Text(s.to_string()))
            }
            FieldSpec::Checkbox { .. } => match value {
                FieldValue::Bool(b) => Some(FieldValue::Bool(*b)),
                FieldValue::Number(v) => Some(FieldValue::Bool(*v != 0.0)),
                FieldValue::Text(_) => None,
            },
        }
    }
}

/// Number of fractional digits needed to print `x` exactly
fn decimals(x: f64) -> i32 {
    let s = format!("{}", x.abs());
    match s.find('.') {
        Some(dot) => (s.len() - dot - 1) as i32,
        None => 0,
    }
}

/// Clamp `v` into `[min, max]` and move it onto the grid `min + n * step`.
pub fn snap_to_step(v: f64, min: f64, max: f64, step: f64) -> f64 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    if !(step > 0.0) {
        return v.clamp(lo, hi);
    }
    let last = ((hi - lo) / step + 1e-9).floor();
    let n = ((v - lo) / step).round().clamp(0.0, last);
    let scale = 10f64.powi(decimals(step).max(decimals(lo)).min(300));
    let snapped = lo + n * step;
    let rounded = (snapped * scale).round() / scale;
    if rounded.is_finite() {
        rounded.clamp(lo, hi)
    } else {
        snapped.clamp(lo, hi)
    }
}

/// Which tier of a method panel a field lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    Basic,
    Advanced,
}

impl Scope {
    pub const ALL: [Scope; 2] = [Scope::Basic, Scope::Advanced];
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Basic => write!(f, "basic"),
            Scope::Advanced => write!(f, "advanced"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub spec: FieldSpec,
}

impl Field {
    pub fn new(name: &str, spec: FieldSpec) -> Self {
        Self {
            name: name.to_string(),
            spec,
        }
    }
}

/// Named partial override; fields it omits keep their current value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub values: Vec<(String, FieldValue)>,
}

impl Preset {
    pub fn new(name: &str, values: Vec<(String, FieldValue)>) -> Self {
        Self {
            name: name.to_string(),
            values,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSchema {
    /// Display name, unique across the registry
    pub name: String,
    /// Module name understood by the runner script
    pub module: String,
    pub basic: Vec<Field>,
    pub advanced: Vec<Field>,
    pub presets: Vec<Preset>,
}

impl MethodSchema {
    pub fn fields(&self, scope: Scope) -> &[Field] {
        match scope {
            Scope::Basic => &self.basic,
            Scope::Advanced => &self.advanced,
        }
    }

    pub fn field(&self, scope: Scope, name: &str) -> Option<&FieldSpec> {
        self.fields(scope)
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.spec)
    }

    /// Looks a field up in the basic tier first, then the advanced one
    pub fn find_field(&self, name: &str) -> Option<(Scope, &FieldSpec)> {
        Scope::ALL
            .iter()
            .find_map(|&scope| self.field(scope, name).map(|spec| (scope, spec)))
    }

    pub fn preset(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.name == name)
    }
}

/// Contract violations found by [`Registry::validate`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("duplicate method name: {0}")]
    DuplicateMethod(String),
    #[error("{method}: preset '{preset}' references unknown field '{field}'")]
    UnknownPresetField {
        method: String,
        preset: String,
        field: String,
    },
    #[error("{method}: field '{field}' has an invalid default")]
    InvalidDefault { method: String, field: String },
    #[error("{method}: field '{field}' has an empty or inverted range")]
    InvalidRange { method: String, field: String },
}

/// Lookup table of every known method schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    methods: Vec<MethodSchema>,
}

impl Registry {
    pub fn new(methods: Vec<MethodSchema>) -> Self {
        Self { methods }
    }

    /// The built-in registry
    pub fn global() -> &'static Registry {
        static REGISTRY: OnceLock<Registry> = OnceLock::new();
        REGISTRY.get_or_init(|| Registry::new(super::registry::builtin_methods()))
    }

    pub fn get(&self, name: &str) -> Option<&MethodSchema> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn methods(&self) -> &[MethodSchema] {
        &self.methods
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn validate(&self) -> Result<(), Vec<SchemaError>> {
        let mut errors = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for method in &self.methods {
            if !seen.insert(method.name.as_str()) {
                errors.push(SchemaError::DuplicateMethod(method.name.clone()));
            }

            for field in method.basic.iter().chain(method.advanced.iter()) {
                match &field.spec {
                    FieldSpec::Range { min, max, step, default } => {
                        if !(min < max) || !(*step > 0.0) {
                            errors.push(SchemaError::InvalidRange {
                                method: method.name.clone(),
                                field: field.name.clone(),
                            });
                        } else if default < min || default > max {
                            errors.push(SchemaError::InvalidDefault {
                                method: method.name.clone(),
                                field: field.name.clone(),
                            });
                        }
                    }
                    FieldSpec::Select { options, default } => {
                        if !options.contains(default) {
                            errors.push(SchemaError::InvalidDefault {
                                method: method.name.clone(),
                                field: field.name.clone(),
                            });
                        }
                    }
                    FieldSpec::Checkbox { .. } => {}
                }
            }

            for preset in &method.presets {
                for (field, _) in &preset.values {
                    if method.find_field(field).is_none() {
                        errors.push(SchemaError::UnknownPresetField {
                            method: method.name.clone(),
                            preset: preset.name.clone(),
                            field: field.clone(),
                        });
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
