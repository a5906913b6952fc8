//! Data-quality checks for card datasets. Problems are collected into a
//! report rather than failing fast; the calculator itself degrades gracefully
//! on the same input.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::calc::abilities::{parse_target, parse_timing, EffectStat};
use crate::data::card::{Attribute, RawTarget, SkillTarget};
use crate::data::error::DataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValidationSeverity {
    Error,
    Warning,
    Info,
}

impl ValidationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for ValidationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDiagnostic {
    pub severity: ValidationSeverity,
    pub context: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub cards_checked: usize,
    pub diagnostics: Vec<ValidationDiagnostic>,
}

impl ValidationReport {
    pub fn push(
        &mut self,
        severity: ValidationSeverity,
        context: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(ValidationDiagnostic {
            severity,
            context: context.into(),
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diag| diag.severity == ValidationSeverity::Error)
    }

    pub fn count(&self, severity: ValidationSeverity) -> usize {
        self.diagnostics
            .iter()
            .filter(|diag| diag.severity == severity)
            .count()
    }
}

const SKILL_TRIGGERS: &[&str] = &["on_skill", "skill"];

pub fn validate_card_dataset(path: impl AsRef<Path>) -> Result<ValidationReport, DataError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let payload: Value = serde_json::from_str(&raw).map_err(|source| DataError::Json {
        path: path.display().to_string(),
        source,
    })?;
    Ok(validate_card_value(&payload))
}

pub fn validate_card_value(payload: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();
    let Some(entries) = payload
        .get("cards")
        .and_then(Value::as_array)
        .or_else(|| payload.as_array())
    else {
        report.push(
            ValidationSeverity::Error,
            "<root>",
            "expected top-level JSON array or { cards: [...] }",
        );
        return report;
    };

    let mut seen_ids = HashSet::new();
    for (index, entry) in entries.iter().enumerate() {
        report.cards_checked += 1;
        let base_context = format!("entry[{index}]");
        let Some(object) = entry.as_object() else {
            report.push(ValidationSeverity::Error, base_context, "entry is not an object");
            continue;
        };

        let card_id = match object.get("id").and_then(Value::as_str) {
            Some(id) if !id.trim().is_empty() => {
                if !seen_ids.insert(id.to_string()) {
                    report.push(
                        ValidationSeverity::Error,
                        format!("{base_context}.id"),
                        format!("duplicate id '{id}'"),
                    );
                }
                id.to_string()
            }
            _ => {
                report.push(
                    ValidationSeverity::Error,
                    format!("{base_context}.id"),
                    "missing non-empty 'id'",
                );
                "<missing-id>".to_string()
            }
        };
        let context = format!("{base_context} id='{card_id}'");

        match object.get("name").and_then(Value::as_str) {
            Some(name) if !name.trim().is_empty() => {}
            _ => report.push(
                ValidationSeverity::Error,
                format!("{context}.name"),
                "missing non-empty 'name'",
            ),
        }

        match object.get("attribute").and_then(Value::as_str) {
            Some(attribute) if Attribute::from_name(attribute).is_some() => {}
            Some(attribute) => report.push(
                ValidationSeverity::Error,
                format!("{context}.attribute"),
                format!("unknown attribute '{attribute}'"),
            ),
            None => report.push(
                ValidationSeverity::Error,
                format!("{context}.attribute"),
                "missing 'attribute'",
            ),
        }

        validate_level_curve(&mut report, object, &context);
        validate_skill(&mut report, object, &context);
        validate_abilities(&mut report, object, &context);
    }
    report
}

fn number(object: &Map<String, Value>, key: &str) -> Option<f64> {
    object.get(key).and_then(Value::as_f64)
}

fn validate_level_curve(report: &mut ValidationReport, object: &Map<String, Value>, context: &str) {
    for key in ["max_level", "base_atk", "max_atk"] {
        if number(object, key).is_none() {
            report.push(
                ValidationSeverity::Error,
                format!("{context}.{key}"),
                format!("missing numeric '{key}'"),
            );
        }
    }

    let min_level = number(object, "min_level").unwrap_or(1.0);
    if let Some(max_level) = number(object, "max_level") {
        if max_level <= min_level {
            report.push(
                ValidationSeverity::Warning,
                format!("{context}.max_level"),
                "level curve is degenerate; stats stay at their max values",
            );
        }
    }
    if let (Some(base), Some(max)) = (number(object, "base_atk"), number(object, "max_atk")) {
        if max < base {
            report.push(
                ValidationSeverity::Warning,
                format!("{context}.max_atk"),
                "max_atk is below base_atk",
            );
        }
    }
    if number(object, "speed").is_none() {
        report.push(
            ValidationSeverity::Info,
            format!("{context}.speed"),
            "no speed stat; attack interval uses the formula intercept",
        );
    }
}

fn validate_skill(report: &mut ValidationReport, object: &Map<String, Value>, context: &str) {
    let Some(skill) = object.get("skill").filter(|skill| !skill.is_null()) else {
        report.push(
            ValidationSeverity::Info,
            format!("{context}.skill"),
            "no skill; skill damage will be zero",
        );
        return;
    };
    let skill_context = format!("{context}.skill");
    let Some(skill) = skill.as_object() else {
        report.push(ValidationSeverity::Error, skill_context, "skill is not an object");
        return;
    };
    for key in ["slv1", "slvup"] {
        if number(skill, key).is_none() {
            report.push(
                ValidationSeverity::Warning,
                format!("{skill_context}.{key}"),
                format!("missing numeric '{key}'; treated as 0"),
            );
        }
    }
    if let Some(buff) = skill.get("buff").filter(|buff| !buff.is_null()) {
        let buff_context = format!("{skill_context}.buff");
        if let Err(err) = serde_json::from_value::<SkillTarget>(
            buff.get("target").cloned().unwrap_or(Value::Null),
        ) {
            report.push(
                ValidationSeverity::Error,
                format!("{buff_context}.target"),
                format!("invalid skill target: {err}"),
            );
        }
        validate_effects(report, buff.get("effects"), &buff_context);
    }
}

fn validate_abilities(report: &mut ValidationReport, object: &Map<String, Value>, context: &str) {
    let Some(abilities) = object.get("abilities") else {
        return;
    };
    let Some(abilities) = abilities.as_array() else {
        report.push(
            ValidationSeverity::Error,
            format!("{context}.abilities"),
            "expected array",
        );
        return;
    };

    for (ability_index, ability) in abilities.iter().enumerate() {
        let ability_context = format!("{context}.abilities[{ability_index}]");
        let Some(ability_obj) = ability.as_object() else {
            report.push(
                ValidationSeverity::Error,
                ability_context,
                "ability is not an object",
            );
            continue;
        };
        if !matches!(ability_obj.get("id").and_then(Value::as_str), Some(id) if !id.trim().is_empty()) {
            report.push(
                ValidationSeverity::Error,
                format!("{ability_context}.id"),
                "missing non-empty 'id'",
            );
        }

        let Some(parsed) = ability_obj.get("parsed").and_then(Value::as_object) else {
            report.push(
                ValidationSeverity::Warning,
                ability_context,
                "no structured data; ability uses tag targeting and contributes no effect",
            );
            continue;
        };

        match parsed
            .get("target")
            .cloned()
            .map(serde_json::from_value::<RawTarget>)
        {
            Some(Ok(target)) if parse_target(&target).is_some() => {}
            Some(Ok(target)) => report.push(
                ValidationSeverity::Warning,
                format!("{ability_context}.parsed.target"),
                format!(
                    "unrecognized target '{}'; falls back to tag targeting",
                    target.target_type
                ),
            ),
            Some(Err(err)) => report.push(
                ValidationSeverity::Error,
                format!("{ability_context}.parsed.target"),
                format!("invalid target: {err}"),
            ),
            None => report.push(
                ValidationSeverity::Error,
                format!("{ability_context}.parsed.target"),
                "missing 'target'",
            ),
        }

        if let Some(trigger) = parsed.get("trigger").and_then(Value::as_str) {
            if parse_timing(Some(trigger)).is_none() && !SKILL_TRIGGERS.contains(&trigger) {
                report.push(
                    ValidationSeverity::Warning,
                    format!("{ability_context}.parsed.trigger"),
                    format!("unsupported trigger '{trigger}'; ability contributes no effect"),
                );
            }
        }

        validate_effects(report, parsed.get("effects"), &format!("{ability_context}.parsed"));
    }
}

fn validate_effects(report: &mut ValidationReport, effects: Option<&Value>, context: &str) {
    let Some(effects) = effects else {
        return;
    };
    let Some(effects) = effects.as_array() else {
        report.push(
            ValidationSeverity::Error,
            format!("{context}.effects"),
            "expected array",
        );
        return;
    };
    for (effect_index, effect) in effects.iter().enumerate() {
        let effect_context = format!("{context}.effects[{effect_index}]");
        match effect.get("stat").and_then(Value::as_str) {
            Some(stat) if EffectStat::from_name(stat).is_some() => {}
            Some(stat) => report.push(
                ValidationSeverity::Warning,
                format!("{effect_context}.stat"),
                format!("unrecognized stat '{stat}' is skipped"),
            ),
            None => report.push(
                ValidationSeverity::Error,
                format!("{effect_context}.stat"),
                "missing non-empty 'stat'",
            ),
        }
        if effect.get("value").and_then(Value::as_f64).is_none() {
            report.push(
                ValidationSeverity::Error,
                format!("{effect_context}.value"),
                "missing numeric 'value'",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clean_dataset_has_no_errors() {
        let report = validate_card_value(&json!({"cards": [{
            "id": "a", "name": "A", "attribute": "divina", "max_level": 80,
            "base_atk": 300, "max_atk": 3000, "speed": 1000,
            "skill": {"id": "s", "slv1": 100, "slvup": 5},
            "abilities": [{"id": "x", "parsed": {
                "target": {"type": "team"},
                "effects": [{"stat": "damage", "value": 0.1}]
            }}]
        }]}));
        assert_eq!(report.cards_checked, 1);
        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    }

    #[test]
    fn flags_duplicates_bad_attributes_and_missing_structure() {
        let report = validate_card_value(&json!([
            {"id": "a", "name": "A", "attribute": "cosmic", "max_level": 80, "base_atk": 1, "max_atk": 2},
            {"id": "a", "name": "", "attribute": "anima", "max_level": 80, "base_atk": 1, "max_atk": 2,
             "abilities": [
                {"id": "loose", "tags": ["team"]},
                {"id": "odd", "parsed": {"target": {"type": "everyone"}, "trigger": "on_kill",
                  "effects": [{"stat": "luck", "value": 1}]}}
             ]}
        ]));
        assert!(report.has_errors());
        let messages: Vec<&str> = report.diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("duplicate id 'a'")));
        assert!(messages.iter().any(|m| m.contains("unknown attribute 'cosmic'")));
        assert!(messages.iter().any(|m| m.contains("missing non-empty 'name'")));
        assert!(messages.iter().any(|m| m.contains("no structured data")));
        assert!(messages.iter().any(|m| m.contains("unrecognized target 'everyone'")));
        assert!(messages.iter().any(|m| m.contains("unsupported trigger 'on_kill'")));
        assert!(messages.iter().any(|m| m.contains("unrecognized stat 'luck'")));
    }

    #[test]
    fn non_list_root_is_an_error() {
        let report = validate_card_value(&json!({"units": []}));
        assert!(report.has_errors());
        assert_eq!(report.cards_checked, 0);
    }
}
