use std::collections::{BTreeMap, HashSet};

use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Endpoint, EndpointParameter, ParamLocation};

/// Parses OpenAPI documents and inlines local `$ref` pointers so every
/// extracted endpoint descriptor is self-contained.
pub struct SchemaResolver;

impl SchemaResolver {
    /// Parse a raw OpenAPI document, accepting JSON or YAML
    pub fn parse_document(raw: &str) -> AppResult<Value> {
        if let Ok(value) = serde_json::from_str::<Value>(raw) {
            return Ok(value);
        }
        serde_yaml::from_str::<Value>(raw)
            .map_err(|e| AppError::SchemaParse(format!("Not valid JSON or YAML: {}", e)))
    }

    /// Recursively resolve every local `$ref` in the document.
    ///
    /// A visited-pointer set tracks the current resolution path; a pointer
    /// re-entered before it finishes is a circular reference and fails
    /// fast instead of recursing forever.
    pub fn resolve(document: &Value) -> AppResult<Value> {
        let mut visiting = HashSet::new();
        Self::resolve_node(document, document, &mut visiting)
    }

    fn resolve_node(
        node: &Value,
        root: &Value,
        visiting: &mut HashSet<String>,
    ) -> AppResult<Value> {
        match node {
            Value::Object(obj) => {
                if let Some(ref_value) = obj.get("$ref") {
                    let pointer = ref_value.as_str().ok_or_else(|| {
                        AppError::ReferenceResolution("$ref value is not a string".to_string())
                    })?;
                    return Self::resolve_ref(pointer, obj, root, visiting);
                }

                let mut resolved = serde_json::Map::new();
                for (key, value) in obj {
                    resolved.insert(key.clone(), Self::resolve_node(value, root, visiting)?);
                }
                Ok(Value::Object(resolved))
            }
            Value::Array(arr) => {
                let mut resolved = Vec::with_capacity(arr.len());
                for value in arr {
                    resolved.push(Self::resolve_node(value, root, visiting)?);
                }
                Ok(Value::Array(resolved))
            }
            _ => Ok(node.clone()),
        }
    }

    fn resolve_ref(
        pointer: &str,
        siblings: &serde_json::Map<String, Value>,
        root: &Value,
        visiting: &mut HashSet<String>,
    ) -> AppResult<Value> {
        if !pointer.starts_with("#/") {
            return Err(AppError::ReferenceResolution(format!(
                "Only local references are supported: {}",
                pointer
            )));
        }
        if !visiting.insert(pointer.to_string()) {
            return Err(AppError::ReferenceResolution(format!(
                "Circular reference: {}",
                pointer
            )));
        }

        let target = Self::lookup_pointer(pointer, root)?;
        let resolved_target = Self::resolve_node(&target, root, visiting)?;
        visiting.remove(pointer);

        // Keys sitting beside the $ref are kept, overlaid on the target
        let mut result = match resolved_target {
            Value::Object(map) => map,
            other => return Ok(other),
        };
        for (key, value) in siblings {
            if key != "$ref" {
                result.insert(key.clone(), Self::resolve_node(value, root, visiting)?);
            }
        }
        Ok(Value::Object(result))
    }

    /// Walk the pointer's path segments through the root document
    fn lookup_pointer(pointer: &str, root: &Value) -> AppResult<Value> {
        let mut current = root;
        for segment in pointer.trim_start_matches("#/").split('/') {
            let segment = segment.replace("~1", "/").replace("~0", "~");
            current = match current {
                Value::Object(obj) => obj.get(&segment),
                Value::Array(arr) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|idx| arr.get(idx)),
                _ => None,
            }
            .ok_or_else(|| {
                AppError::ReferenceResolution(format!("Dangling reference: {}", pointer))
            })?;
        }
        Ok(current.clone())
    }

    /// Produce one `Endpoint` per (method, path) pair under `paths` of a
    /// resolved document. Endpoint ids are derived from (service, method,
    /// path) so resolving the same document twice yields identical sets.
    pub fn extract_endpoints(service_id: Uuid, resolved: &Value) -> AppResult<Vec<Endpoint>> {
        let paths = resolved
            .get("paths")
            .and_then(|p| p.as_object())
            .ok_or_else(|| AppError::SchemaParse("Document has no paths object".to_string()))?;

        let mut endpoints = Vec::new();
        for (path, path_item) in paths {
            for method in ["get", "post", "put", "delete", "patch"] {
                let Some(operation) = path_item.get(method) else {
                    continue;
                };

                let mut parameters = Vec::new();
                for source in [path_item.get("parameters"), operation.get("parameters")]
                    .into_iter()
                    .flatten()
                {
                    if let Some(params) = source.as_array() {
                        for param in params {
                            if let Some(p) = Self::parse_parameter(param) {
                                parameters.push(p);
                            }
                        }
                    }
                }

                let request_body = operation
                    .get("requestBody")
                    .and_then(|rb| rb.get("content"))
                    .and_then(|c| c.get("application/json"))
                    .and_then(|ct| ct.get("schema"))
                    .cloned();

                let mut responses = BTreeMap::new();
                if let Some(resp_obj) = operation.get("responses").and_then(|r| r.as_object()) {
                    for (status_str, resp) in resp_obj {
                        let Ok(status) = status_str.parse::<u16>() else {
                            continue;
                        };
                        let schema = resp
                            .get("content")
                            .and_then(|c| c.get("application/json"))
                            .and_then(|ct| ct.get("schema"))
                            .cloned()
                            .unwrap_or(Value::Null);
                        responses.insert(status, schema);
                    }
                }

                let method_upper = method.to_uppercase();
                endpoints.push(Endpoint {
                    id: Uuid::new_v5(
                        &service_id,
                        format!("{} {}", method_upper, path).as_bytes(),
                    ),
                    service_id,
                    method: method_upper,
                    path: path.clone(),
                    summary: operation
                        .get("summary")
                        .and_then(|s| s.as_str())
                        .map(String::from),
                    description: operation
                        .get("description")
                        .and_then(|s| s.as_str())
                        .map(String::from),
                    parameters,
                    request_body,
                    responses,
                });
            }
        }
        Ok(endpoints)
    }

    fn parse_parameter(param: &Value) -> Option<EndpointParameter> {
        let name = param.get("name")?.as_str()?.to_string();
        let location = match param.get("in")?.as_str()? {
            "path" => ParamLocation::Path,
            "query" => ParamLocation::Query,
            "header" => ParamLocation::Header,
            _ => return None,
        };
        let schema = param
            .get("schema")
            .cloned()
            .unwrap_or(serde_json::json!({"type": "string"}));
        let required = param
            .get("required")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        Some(EndpointParameter {
            name,
            location,
            required,
            schema,
        })
    }
}
