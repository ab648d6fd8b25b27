//! Applies one [`PayloadMapping`] against a source payload, producing a
//! target `serde_json::Value`.
//!
//! Rule sets fire in a fixed order so a later set can see fields an earlier
//! one just wrote: `field_map` -> `derived_values` -> `value_assignments` ->
//! `auto_generations` -> `conditionals` -> `defaults`. Within a rule set,
//! rules with an explicit `priority` run lowest-first so a higher-priority
//! rule can overwrite what a lower one wrote to the same target field.

use chrono::{DateTime, Utc};
use payment_core_types::{
    AutoGenerationKind, AutoGenerationRule, CoreError, FieldType, IdGenerator, PayloadMapping,
};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::{expr, path, tokens, transform};

/// Apply `mapping` to `source`, returning the transformed target payload.
pub fn apply_mapping(
    mapping: &PayloadMapping,
    source: &Value,
    now: DateTime<Utc>,
    ids: &dyn IdGenerator,
) -> Result<Value> {
    let mut target = Value::Object(serde_json::Map::new());

    for rule in &mapping.field_map {
        let Some(found) = path::get(source, &rule.source_field) else {
            continue;
        };
        let value = match &rule.transformation {
            Some(primitive) => transform::apply(primitive, found)?,
            None => found.clone(),
        };
        path::set(&mut target, &rule.target_field, value);
    }

    let mut derived = mapping.derived_values.iter().collect::<Vec<_>>();
    derived.sort_by_key(|r| r.priority);
    for rule in derived {
        let parsed = expr::parse(&rule.expression)?;
        let evaluated = expr::eval(&parsed, source)?;
        let coerced = coerce(evaluated, rule.result_type)?;
        path::set(&mut target, &rule.target_field, coerced);
    }

    let mut assignments = mapping.value_assignments.iter().collect::<Vec<_>>();
    assignments.sort_by_key(|r| r.priority);
    for rule in assignments {
        let rendered = tokens::render(&rule.value_template, now, ids);
        path::set(&mut target, &rule.target_field, Value::String(rendered));
    }

    let mut autos = mapping.auto_generations.iter().collect::<Vec<_>>();
    autos.sort_by_key(|r| r.priority);
    for rule in autos {
        let value = auto_generate(rule, now, ids);
        path::set(&mut target, &rule.target_field, Value::String(value));
    }

    let mut conditionals = mapping.conditionals.iter().collect::<Vec<_>>();
    conditionals.sort_by_key(|r| r.priority);
    for rule in conditionals {
        let predicate = expr::parse(&rule.predicate)?;
        if truthy(&expr::eval(&predicate, source)?) {
            let rendered = tokens::render(&rule.value_template, now, ids);
            path::set(&mut target, &rule.target_field, Value::String(rendered));
        }
    }

    for (field, default) in &mapping.defaults {
        if path::get(&target, field).is_none() {
            path::set(&mut target, field, default.clone());
        }
    }

    Ok(target)
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn coerce(value: Value, result_type: FieldType) -> Result<Value> {
    match result_type {
        FieldType::String => Ok(Value::String(match value {
            Value::String(s) => s,
            other => other.to_string(),
        })),
        FieldType::Number => match &value {
            Value::Number(_) => Ok(value),
            Value::String(s) => s.parse::<f64>().map(Value::from).map_err(|_| {
                Error::Core(CoreError::TypeCoercionError(format!(
                    "`{}` is not a number",
                    s
                )))
            }),
            other => Err(Error::Core(CoreError::TypeCoercionError(format!(
                "{} is not a number",
                other
            )))),
        },
        FieldType::Boolean => match &value {
            Value::Bool(_) => Ok(value),
            Value::String(s) => match s.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                other => Err(Error::Core(CoreError::TypeCoercionError(format!(
                    "`{}` is not a boolean",
                    other
                )))),
            },
            other => Err(Error::Core(CoreError::TypeCoercionError(format!(
                "{} is not a boolean",
                other
            )))),
        },
    }
}

fn auto_generate(rule: &AutoGenerationRule, now: DateTime<Utc>, ids: &dyn IdGenerator) -> String {
    let core = match rule.kind {
        AutoGenerationKind::Uuid => ids.new_uuid().to_string(),
        AutoGenerationKind::Timestamp => now.to_rfc3339(),
        AutoGenerationKind::Sequential => {
            let seq = ids.next_sequence(&rule.target_field);
            match rule.length {
                Some(width) => format!("{:0width$}", seq, width = width),
                None => seq.to_string(),
            }
        }
    };
    let mut out = String::new();
    if let Some(prefix) = &rule.prefix {
        out.push_str(prefix);
    }
    out.push_str(&core);
    if let Some(suffix) = &rule.suffix {
        out.push_str(suffix);
    }
    out
}
