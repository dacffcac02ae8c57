//! Typed strategy parameters — specs, values, and validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Kind of a strategy parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Integer,
    Float,
    Boolean,
    Enum,
}

/// A parameter value as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Enum(String),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Integer(_) => ParamKind::Integer,
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Boolean(_) => ParamKind::Boolean,
            ParamValue::Enum(_) => ParamKind::Enum,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Integer(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

/// Declarative description of one parameter.
#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: ParamValue,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub choices: Vec<&'static str>,
    pub description: &'static str,
}

impl ParamSpec {
    pub fn integer(name: &'static str, default: i64, min: i64, max: i64, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Integer,
            default: ParamValue::Integer(default),
            min: Some(min as f64),
            max: Some(max as f64),
            choices: Vec::new(),
            description,
        }
    }

    pub fn float(name: &'static str, default: f64, min: f64, max: f64, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Float,
            default: ParamValue::Float(default),
            min: Some(min),
            max: Some(max),
            choices: Vec::new(),
            description,
        }
    }

    pub fn boolean(name: &'static str, default: bool, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Boolean,
            default: ParamValue::Boolean(default),
            min: None,
            max: None,
            choices: Vec::new(),
            description,
        }
    }

    pub fn enumeration(
        name: &'static str,
        default: &'static str,
        choices: Vec<&'static str>,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            kind: ParamKind::Enum,
            default: ParamValue::Enum(default.to_string()),
            min: None,
            max: None,
            choices,
            description,
        }
    }
}

/// Caller-supplied parameter overrides, keyed by spec name.
pub type ParamMap = BTreeMap<String, ParamValue>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParamError {
    #[error("unknown parameter '{0}'")]
    Unknown(String),

    #[error("parameter '{name}' expects {expected:?}, got {actual:?}")]
    WrongKind {
        name: String,
        expected: ParamKind,
        actual: ParamKind,
    },

    #[error("parameter '{name}' value {value} outside [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("parameter '{name}' value '{value}' is not one of the declared choices")]
    BadChoice { name: String, value: String },
}

/// Validate a parameter map against specs: every key must name a spec, match
/// its kind, and fall inside its range/choices.
pub fn validate_params(specs: &[ParamSpec], params: &ParamMap) -> Result<(), ParamError> {
    for (name, value) in params {
        let spec = specs
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ParamError::Unknown(name.clone()))?;

        // An integer supplied where a float is expected is acceptable.
        let kind_ok = value.kind() == spec.kind
            || (spec.kind == ParamKind::Float && value.kind() == ParamKind::Integer);
        if !kind_ok {
            return Err(ParamError::WrongKind {
                name: name.clone(),
                expected: spec.kind,
                actual: value.kind(),
            });
        }

        if let (Some(number), Some(min), Some(max)) = (value.as_number(), spec.min, spec.max) {
            if number < min || number > max {
                return Err(ParamError::OutOfRange {
                    name: name.clone(),
                    value: number,
                    min,
                    max,
                });
            }
        }

        if spec.kind == ParamKind::Enum {
            if let ParamValue::Enum(choice) = value {
                if !spec.choices.iter().any(|c| c == choice) {
                    return Err(ParamError::BadChoice {
                        name: name.clone(),
                        value: choice.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Resolve a parameter to its supplied value or the spec default.
pub fn resolve<'a>(specs: &'a [ParamSpec], params: &'a ParamMap, name: &str) -> Option<&'a ParamValue> {
    if let Some(value) = params.get(name) {
        return Some(value);
    }
    specs.iter().find(|s| s.name == name).map(|s| &s.default)
}

/// Convenience accessors used by strategies after validation.
pub fn resolve_usize(specs: &[ParamSpec], params: &ParamMap, name: &str) -> usize {
    match resolve(specs, params, name) {
        Some(ParamValue::Integer(v)) => (*v).max(0) as usize,
        Some(ParamValue::Float(v)) => v.max(0.0) as usize,
        _ => 0,
    }
}

pub fn resolve_f64(specs: &[ParamSpec], params: &ParamMap, name: &str) -> f64 {
    match resolve(specs, params, name) {
        Some(ParamValue::Float(v)) => *v,
        Some(ParamValue::Integer(v)) => *v as f64,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs() -> Vec<ParamSpec> {
        vec![
            ParamSpec::integer("period", 14, 2, 250, "lookback window"),
            ParamSpec::float("threshold", 0.5, 0.0, 1.0, "trigger level"),
            ParamSpec::boolean("strict", false, "strict mode"),
            ParamSpec::enumeration("ma_type", "sma", vec!["sma", "ema"], "MA flavor"),
        ]
    }

    #[test]
    fn empty_params_validate() {
        assert!(validate_params(&specs(), &ParamMap::new()).is_ok());
    }

    #[test]
    fn unknown_param_rejected() {
        let mut params = ParamMap::new();
        params.insert("bogus".into(), ParamValue::Integer(1));
        assert!(matches!(
            validate_params(&specs(), &params),
            Err(ParamError::Unknown(_))
        ));
    }

    #[test]
    fn wrong_kind_rejected() {
        let mut params = ParamMap::new();
        params.insert("period".into(), ParamValue::Boolean(true));
        assert!(matches!(
            validate_params(&specs(), &params),
            Err(ParamError::WrongKind { .. })
        ));
    }

    #[test]
    fn integer_accepted_for_float_spec() {
        let mut params = ParamMap::new();
        params.insert("threshold".into(), ParamValue::Integer(1));
        assert!(validate_params(&specs(), &params).is_ok());
    }

    #[test]
    fn out_of_range_rejected() {
        let mut params = ParamMap::new();
        params.insert("period".into(), ParamValue::Integer(1000));
        assert!(matches!(
            validate_params(&specs(), &params),
            Err(ParamError::OutOfRange { .. })
        ));
    }

    #[test]
    fn bad_enum_choice_rejected() {
        let mut params = ParamMap::new();
        params.insert("ma_type".into(), ParamValue::Enum("wma".into()));
        assert!(matches!(
            validate_params(&specs(), &params),
            Err(ParamError::BadChoice { .. })
        ));
    }

    #[test]
    fn resolve_falls_back_to_default() {
        let specs = specs();
        let params = ParamMap::new();
        assert_eq!(resolve_usize(&specs, &params, "period"), 14);
        assert_eq!(resolve_f64(&specs, &params, "threshold"), 0.5);
    }

    #[test]
    fn resolve_prefers_supplied_value() {
        let specs = specs();
        let mut params = ParamMap::new();
        params.insert("period".into(), ParamValue::Integer(30));
        assert_eq!(resolve_usize(&specs, &params, "period"), 30);
    }

    #[test]
    fn param_value_json_shapes() {
        // Untagged: plain JSON scalars map onto the right variants.
        let v: ParamValue = serde_json::from_str("14").unwrap();
        assert_eq!(v, ParamValue::Integer(14));
        let v: ParamValue = serde_json::from_str("0.5").unwrap();
        assert_eq!(v, ParamValue::Float(0.5));
        let v: ParamValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, ParamValue::Boolean(true));
        let v: ParamValue = serde_json::from_str("\"ema\"").unwrap();
        assert_eq!(v, ParamValue::Enum("ema".into()));
    }
}
