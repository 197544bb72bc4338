//! Expression evaluation for `Filter` conditions and `Projection` operands.
//!
//! Conditions and projection operands both arrive as small JSON ASTs inside
//! the plan tree (the "JSON-everywhere" external contract). This module only
//! evaluates them against a `Tuple`; it never sees the wider plan shape.

use serde_json::Value as Json;

use crate::common::{Tuple, Value};
use crate::error::{Result, WorkerError};

/// Reads `tuple[variable].property` (or just `tuple[variable]` when
/// `property` is absent), the shape every projection operand and filter
/// condition leaf uses to reach into a bound node/value.
fn resolve(tuple: &Tuple, variable: &str, property: Option<&str>) -> Value {
    let base = tuple.get(variable).cloned().unwrap_or(Value::Null);
    match (base, property) {
        (Value::Node(props), Some(key)) => props.get(key).cloned().unwrap_or(Value::Null),
        (value, None) => value,
        (_, Some(_)) => Value::Null,
    }
}

/// Evaluates a condition AST node (`{"variable", "property", "op", ...}` or
/// `{"and"/"or": [...]}` or `{"not": ...}`) against `tuple`.
pub fn eval_condition(condition: &Json, tuple: &Tuple) -> Result<bool> {
    let obj = condition
        .as_object()
        .ok_or_else(|| WorkerError::PlanMalformed("condition is not an object".into()))?;

    if let Some(clauses) = obj.get("and").and_then(Json::as_array) {
        for clause in clauses {
            if !eval_condition(clause, tuple)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }

    if let Some(clauses) = obj.get("or").and_then(Json::as_array) {
        for clause in clauses {
            if eval_condition(clause, tuple)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }

    if let Some(inner) = obj.get("not") {
        return Ok(!eval_condition(inner, tuple)?);
    }

    let variable = obj
        .get("variable")
        .and_then(Json::as_str)
        .ok_or_else(|| WorkerError::PlanMalformed("condition missing variable".into()))?;
    let property = obj.get("property").and_then(Json::as_str);
    let op = obj
        .get("op")
        .and_then(Json::as_str)
        .ok_or_else(|| WorkerError::PlanMalformed("condition missing op".into()))?;
    let operand = resolve(tuple, variable, property);

    if op == "isNull" {
        return Ok(operand.is_null());
    }
    if op == "isNotNull" {
        return Ok(!operand.is_null());
    }

    let literal = obj.get("value").ok_or_else(|| WorkerError::PlanMalformed("condition missing value".into()))?;
    let literal = json_to_value(literal);

    match op {
        "=" => Ok(operand == literal),
        "<>" => Ok(operand != literal),
        "<" | "<=" | ">" | ">=" => compare_ordered(op, &operand, &literal),
        other => Err(WorkerError::PlanMalformed(format!("unknown condition op: {other}"))),
    }
}

fn compare_ordered(op: &str, lhs: &Value, rhs: &Value) -> Result<bool> {
    let (l, r) = match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => (*a as f64, *b as f64),
        (Value::Float(a), Value::Integer(b)) => (*a, *b as f64),
        (Value::Integer(a), Value::Float(b)) => (*a as f64, *b),
        (Value::Float(a), Value::Float(b)) => (*a, *b),
        _ => return Err(WorkerError::TypeMismatch(format!("cannot order-compare {lhs:?} and {rhs:?}"))),
    };
    Ok(match op {
        "<" => l < r,
        "<=" => l <= r,
        ">" => l > r,
        ">=" => l >= r,
        _ => unreachable!(),
    })
}

/// A single projection operand: either `{variable, property, assign}`
/// (read a scalar off a bound node) or `{functionName, assign}` (an
/// aggregate/accumulator operand, only meaningful inside `EagerFunction`).
#[derive(Debug, Clone)]
pub enum ProjectionOperand {
    Property { variable: String, property: Option<String>, assign: String },
    Function { function_name: String, variable: String, property: Option<String>, assign: String },
}

pub fn parse_projection_operands(project: &Json) -> Result<Vec<ProjectionOperand>> {
    let items = project
        .as_array()
        .ok_or_else(|| WorkerError::PlanMalformed("project is not an array".into()))?;
    items.iter().map(parse_projection_operand).collect()
}

fn parse_projection_operand(item: &Json) -> Result<ProjectionOperand> {
    let obj = item
        .as_object()
        .ok_or_else(|| WorkerError::PlanMalformed("projection operand is not an object".into()))?;
    let assign = obj
        .get("assign")
        .and_then(Json::as_str)
        .ok_or_else(|| WorkerError::PlanMalformed("projection operand missing assign".into()))?
        .to_string();

    if let Some(function_name) = obj.get("functionName").and_then(Json::as_str) {
        let variable = obj
            .get("variable")
            .and_then(Json::as_str)
            .ok_or_else(|| WorkerError::PlanMalformed("function operand missing variable".into()))?
            .to_string();
        let property = obj.get("property").and_then(Json::as_str).map(str::to_string);
        return Ok(ProjectionOperand::Function {
            function_name: function_name.to_string(),
            variable,
            property,
            assign,
        });
    }

    let variable = obj
        .get("variable")
        .and_then(Json::as_str)
        .ok_or_else(|| WorkerError::PlanMalformed("projection operand missing variable".into()))?
        .to_string();
    let property = obj.get("property").and_then(Json::as_str).map(str::to_string);
    Ok(ProjectionOperand::Property { variable, property, assign })
}

/// Applies every operand to `tuple`, producing a freshly bound row.
/// `Function` operands are resolved the same way `Property` ones are and
/// rebound under `assign` — `EagerFunction` is the operator that actually
/// accumulates a function's result across rows; here it's a passthrough
/// rebinding, mirroring the original's `data[assign] = value`.
pub fn apply_projection(operands: &[ProjectionOperand], tuple: &Tuple) -> Tuple {
    let mut out = Tuple::new();
    for op in operands {
        match op {
            ProjectionOperand::Property { variable, property, assign } => {
                let value = resolve(tuple, variable, property.as_deref());
                out.set(assign.clone(), value);
            }
            ProjectionOperand::Function { variable, property, assign, .. } => {
                let value = resolve(tuple, variable, property.as_deref());
                out.set(assign.clone(), value);
            }
        }
    }
    out
}

pub fn json_to_value(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Boolean(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::List(items.iter().map(json_to_value).collect()),
        Json::Object(map) => {
            Value::Node(map.iter().map(|(k, v)| (k.clone(), json_to_value(v))).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equality_condition_reads_a_node_property() {
        let tuple = Tuple::new().with(
            "n",
            Value::Node(std::iter::once(("age".to_string(), Value::Integer(30))).collect()),
        );
        let condition = json!({"variable": "n", "property": "age", "op": "=", "value": 30});
        assert!(eval_condition(&condition, &tuple).unwrap());
    }

    #[test]
    fn and_condition_requires_every_clause() {
        let tuple = Tuple::new().with("n", Value::Integer(5));
        let condition = json!({
            "and": [
                {"variable": "n", "op": ">", "value": 1},
                {"variable": "n", "op": "<", "value": 10},
            ]
        });
        assert!(eval_condition(&condition, &tuple).unwrap());
    }

    #[test]
    fn unknown_operator_is_a_plan_error() {
        let tuple = Tuple::new();
        let condition = json!({"variable": "n", "op": "~=", "value": 1});
        assert!(eval_condition(&condition, &tuple).is_err());
    }

    #[test]
    fn function_operand_rebinds_its_resolved_value() {
        let tuple = Tuple::new().with(
            "n",
            Value::Node(std::iter::once(("age".to_string(), Value::Integer(30))).collect()),
        );
        let operands = parse_projection_operands(&json!([
            {"functionName": "AVG", "variable": "n", "property": "age", "assign": "avgAge"}
        ]))
        .unwrap();
        let out = apply_projection(&operands, &tuple);
        assert_eq!(out.get("avgAge"), Some(&Value::Integer(30)));
    }
}
