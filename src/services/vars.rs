use std::collections::HashMap;

use serde_json::Value;

use crate::error::{AppError, AppResult};

/// Render a JSON value the way it appears inside a URL or header:
/// strings bare, scalars via display, structures as compact JSON
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Substitute `{param}` tokens in a path with values from the variable
/// table. A missing variable is a `VariableResolutionError`; the
/// correct, localized failure point for an upstream extraction that
/// silently produced nothing.
pub fn substitute_path(path: &str, vars: &HashMap<String, Value>) -> AppResult<String> {
    let mut result = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        result.push_str(&rest[..open]);
        rest = &rest[open + 1..];
        let Some(close) = rest.find('}') else {
            return Err(AppError::VariableResolution(format!(
                "Unbalanced '{{' in path: {}",
                path
            )));
        };
        let name = &rest[..close];
        let value = vars.get(name).ok_or_else(|| {
            AppError::VariableResolution(format!("Undefined variable '{}' in path {}", name, path))
        })?;
        result.push_str(&render(value));
        rest = &rest[close + 1..];
    }
    result.push_str(rest);
    Ok(result)
}

/// Substitute `${var}` references embedded in a string
pub fn substitute_string(input: &str, vars: &HashMap<String, Value>) -> AppResult<String> {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(open) = rest.find("${") {
        result.push_str(&rest[..open]);
        rest = &rest[open + 2..];
        let Some(close) = rest.find('}') else {
            return Err(AppError::VariableResolution(format!(
                "Unbalanced '${{' in value: {}",
                input
            )));
        };
        let name = &rest[..close];
        let value = vars.get(name).ok_or_else(|| {
            AppError::VariableResolution(format!("Undefined variable '{}'", name))
        })?;
        result.push_str(&render(value));
        rest = &rest[close + 1..];
    }
    result.push_str(rest);
    Ok(result)
}

/// Substitute `${var}` references throughout a JSON value. A string that
/// is exactly one reference is replaced by the variable's value with its
/// original type; embedded references are spliced as text.
pub fn substitute_value(input: &Value, vars: &HashMap<String, Value>) -> AppResult<Value> {
    match input {
        Value::String(s) => {
            if let Some(name) = s
                .strip_prefix("${")
                .and_then(|rest| rest.strip_suffix('}'))
                .filter(|name| !name.contains("${") && !name.contains('}'))
            {
                return vars.get(name).cloned().ok_or_else(|| {
                    AppError::VariableResolution(format!("Undefined variable '{}'", name))
                });
            }
            Ok(Value::String(substitute_string(s, vars)?))
        }
        Value::Object(obj) => {
            let mut out = serde_json::Map::with_capacity(obj.len());
            for (key, value) in obj {
                out.insert(key.clone(), substitute_value(value, vars)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(arr) => {
            let mut out = Vec::with_capacity(arr.len());
            for value in arr {
                out.push(substitute_value(value, vars)?);
            }
            Ok(Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}

/// Evaluate a JSONPath expression of the form `$.a.b[0].c` against a
/// response body. Returns None when any segment is absent so callers
/// treat that as "variable not captured", not as a step failure.
pub fn evaluate_jsonpath(expr: &str, body: &Value) -> Option<Value> {
    let mut current = body;
    let path = expr.strip_prefix('$').unwrap_or(expr);

    for segment in path.split('.').filter(|s| !s.is_empty()) {
        // A segment may carry one or more [idx] suffixes: "items[0][1]"
        let (key, indices) = match segment.find('[') {
            Some(pos) => (&segment[..pos], &segment[pos..]),
            None => (segment, ""),
        };

        if !key.is_empty() {
            current = current.get(key)?;
        }
        let mut rest = indices;
        while let Some(stripped) = rest.strip_prefix('[') {
            let close = stripped.find(']')?;
            let idx: usize = stripped[..close].parse().ok()?;
            current = current.get(idx)?;
            rest = &stripped[close + 1..];
        }
    }
    Some(current.clone())
}
