use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a request parameter lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
}

/// One declared request parameter, schema fully inlined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointParameter {
    pub name: String,
    pub location: ParamLocation,
    pub required: bool,
    pub schema: serde_json::Value,
}

/// A single resolved API operation extracted from an OpenAPI document.
///
/// Immutable once extracted from a given schema upload; re-uploading a
/// service's schema supersedes its endpoint set rather than mutating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: Uuid,
    pub service_id: Uuid,
    pub method: String, // GET, POST, PUT, DELETE, PATCH
    pub path: String,   // may contain {param} placeholders
    pub summary: Option<String>,
    pub description: Option<String>,
    pub parameters: Vec<EndpointParameter>,
    /// Inlined JSON request body schema, when declared
    pub request_body: Option<serde_json::Value>,
    /// Inlined response schemas keyed by status code. BTreeMap keeps
    /// extraction deterministic across repeated resolutions.
    pub responses: BTreeMap<u16, serde_json::Value>,
}

impl Endpoint {
    /// Names of the `{param}` placeholders appearing in the path
    pub fn path_params(&self) -> Vec<&str> {
        let mut params = Vec::new();
        let mut rest = self.path.as_str();
        while let Some(open) = rest.find('{') {
            rest = &rest[open + 1..];
            if let Some(close) = rest.find('}') {
                params.push(&rest[..close]);
                rest = &rest[close + 1..];
            } else {
                break;
            }
        }
        params
    }

    /// Lowest declared 2xx status, used as the default expectation for
    /// synthesized single-step cases
    pub fn default_success_status(&self) -> u16 {
        self.responses
            .keys()
            .copied()
            .filter(|s| (200..300).contains(s))
            .min()
            .unwrap_or(200)
    }

    /// Top-level field names across every 2xx response object schema.
    /// Deduplicated and in status order, since any success response can
    /// satisfy a downstream parameter.
    pub fn response_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        for (status, schema) in &self.responses {
            if !(200..300).contains(status) {
                continue;
            }
            let Some(props) = schema.get("properties").and_then(|p| p.as_object()) else {
                continue;
            };
            for name in props.keys() {
                if !fields.iter().any(|f| f == name) {
                    fields.push(name.clone());
                }
            }
        }
        fields
    }
}
