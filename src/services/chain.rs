use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{CreateStep, Endpoint};
use crate::repositories::EndpointCatalog;
use crate::services::selector::ChainCandidate;

/// Source of populated chain content. The engine does not care whether
/// steps came from a human editor, a template, or a model; it only needs
/// a finalized, ordered step list.
#[async_trait]
pub trait ChainPopulator: Send + Sync {
    /// Turn a candidate endpoint ordering into concrete steps
    async fn populate(&self, candidate: &ChainCandidate) -> AppResult<Vec<CreateStep>>;
}

/// Deterministic populator that fills request bodies from schema
/// examples/defaults and wires extraction rules from response fields to
/// downstream path parameters.
pub struct TemplateChainPopulator<'a> {
    catalog: &'a EndpointCatalog,
}

impl<'a> TemplateChainPopulator<'a> {
    pub fn new(catalog: &'a EndpointCatalog) -> Self {
        Self { catalog }
    }

    /// Body skeleton from a schema: prefer an explicit example, fall back
    /// to per-property examples/defaults
    fn body_from_schema(schema: &Value) -> Option<Value> {
        if let Some(example) = schema.get("example") {
            return Some(example.clone());
        }
        let properties = schema.get("properties")?.as_object()?;
        let mut body = serde_json::Map::new();
        for (name, prop) in properties {
            let value = prop
                .get("example")
                .or_else(|| prop.get("default"))
                .cloned()
                .unwrap_or_else(|| Self::zero_value(prop));
            body.insert(name.clone(), value);
        }
        Some(Value::Object(body))
    }

    fn zero_value(prop: &Value) -> Value {
        match prop.get("type").and_then(|t| t.as_str()) {
            Some("integer") | Some("number") => serde_json::json!(0),
            Some("boolean") => serde_json::json!(false),
            Some("array") => serde_json::json!([]),
            Some("object") => serde_json::json!({}),
            _ => serde_json::json!("string"),
        }
    }

    /// Extraction rules for the response fields that later steps consume
    /// as path parameters
    fn extract_rules_for(endpoint: &Endpoint, downstream: &[Endpoint]) -> HashMap<String, String> {
        let fields: Vec<String> = endpoint.response_fields();
        let mut rules = HashMap::new();
        for consumer in downstream {
            for param in consumer.path_params() {
                if let Some(field) = fields.iter().find(|f| f.eq_ignore_ascii_case(param)) {
                    rules.insert(param.to_string(), format!("$.{}", field));
                }
            }
        }
        rules
    }
}

#[async_trait]
impl ChainPopulator for TemplateChainPopulator<'_> {
    async fn populate(&self, candidate: &ChainCandidate) -> AppResult<Vec<CreateStep>> {
        let mut endpoints = Vec::with_capacity(candidate.endpoint_ids.len());
        for id in &candidate.endpoint_ids {
            endpoints.push(self.catalog.get(*id).await?);
        }
        if endpoints.is_empty() {
            return Err(AppError::Validation("Empty chain candidate".to_string()));
        }

        let mut steps = Vec::with_capacity(endpoints.len());
        for (index, endpoint) in endpoints.iter().enumerate() {
            let body = endpoint
                .request_body
                .as_ref()
                .and_then(Self::body_from_schema);

            steps.push(CreateStep {
                sequence: index as i32,
                method: endpoint.method.clone(),
                // {param} placeholders stay literal; the executor fills
                // them from the variable table at run time
                path: endpoint.path.clone(),
                headers: HashMap::new(),
                query_params: HashMap::new(),
                body,
                extract_rules: Self::extract_rules_for(endpoint, &endpoints[index + 1..]),
                expected_status: endpoint.default_success_status(),
            });
        }
        Ok(steps)
    }
}

/// Synthesize a one-step case skeleton for a bare endpoint trigger
pub fn single_step_for(endpoint: &Endpoint) -> CreateStep {
    CreateStep {
        sequence: 0,
        method: endpoint.method.clone(),
        path: endpoint.path.clone(),
        headers: HashMap::new(),
        query_params: HashMap::new(),
        body: endpoint
            .request_body
            .as_ref()
            .and_then(TemplateChainPopulator::body_from_schema),
        extract_rules: HashMap::new(),
        expected_status: endpoint.default_success_status(),
    }
}
