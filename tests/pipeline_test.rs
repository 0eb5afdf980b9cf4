mod common;

use serde_json::json;
use uuid::Uuid;

use chainrun::models::CaseStatus;
use chainrun::repositories::SuiteStore;
use chainrun::services::{
    ChainCandidateSelector, ChainPopulator, DependencyGraphBuilder, ExecutionContext,
    RetryPolicy, SchemaResolver, TemplateChainPopulator, TestExecutionEngine,
};

use common::{Factory, MockTarget, TestApp};

const USERS_SPEC: &str = r##"{
  "openapi": "3.0.0",
  "info": { "title": "users", "version": "1.0.0" },
  "paths": {
    "/users": {
      "post": {
        "requestBody": {
          "content": {
            "application/json": {
              "schema": { "$ref": "#/components/schemas/NewUser" }
            }
          }
        },
        "responses": {
          "201": {
            "description": "created",
            "content": {
              "application/json": {
                "schema": { "$ref": "#/components/schemas/User" }
              }
            }
          }
        }
      }
    },
    "/users/{id}": {
      "get": {
        "parameters": [
          { "name": "id", "in": "path", "required": true, "schema": { "type": "integer" } }
        ],
        "responses": {
          "200": {
            "description": "found",
            "content": {
              "application/json": {
                "schema": { "$ref": "#/components/schemas/User" }
              }
            }
          }
        }
      }
    }
  },
  "components": {
    "schemas": {
      "NewUser": {
        "type": "object",
        "properties": {
          "name": { "type": "string", "example": "casey" }
        }
      },
      "User": {
        "type": "object",
        "properties": {
          "id": { "type": "integer" },
          "name": { "type": "string" }
        }
      }
    }
  }
}"##;

/// The whole path from an API description to a passing chain: resolve
/// references, build the dependency graph, pick a chain, populate steps
/// and execute them against a live target.
#[tokio::test]
async fn test_spec_document_to_executed_chain() {
    let app = TestApp::new();
    let factory = Factory::new(&app.state);
    let target = MockTarget::spawn().await;
    let service_id = Uuid::new_v4();

    let document = SchemaResolver::parse_document(USERS_SPEC).unwrap();
    let resolved = SchemaResolver::resolve(&document).unwrap();
    let endpoints = SchemaResolver::extract_endpoints(service_id, &resolved).unwrap();
    assert_eq!(endpoints.len(), 2);

    let graph = DependencyGraphBuilder::build(&endpoints);
    let post = endpoints.iter().find(|e| e.method == "POST").unwrap();
    let get = endpoints.iter().find(|e| e.method == "GET").unwrap();
    assert!(graph.has_edge(post.id, get.id));

    let candidates = ChainCandidateSelector::new(app.state.config.max_chain_depth)
        .select(&graph, &endpoints);
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].endpoint_ids, vec![post.id, get.id]);

    app.state.catalog.store(service_id, endpoints).await;
    let populator = TemplateChainPopulator::new(&app.state.catalog);
    let created = populator.populate(&candidates[0]).await.unwrap();

    assert_eq!(created.len(), 2);
    assert_eq!(created[0].method, "POST");
    assert_eq!(created[0].body, Some(json!({ "name": "casey" })));
    assert_eq!(created[0].extract_rules.get("id"), Some(&"$.id".to_string()));
    assert_eq!(created[0].expected_status, 201);
    assert_eq!(created[1].path, "/users/{id}");
    assert_eq!(created[1].expected_status, 200);

    let suite = factory.create_suite(service_id).await;
    let case = factory.create_case(suite.id).await;
    for step in created {
        app.state.suites.create_step(case.id, step).await.unwrap();
    }
    let steps = app.state.suites.list_steps(case.id).await.unwrap();

    let mut ctx = ExecutionContext::new(target.base_url.clone());
    ctx.retry = RetryPolicy::none();
    let engine = TestExecutionEngine::new().unwrap();
    let result = engine.execute_case(&case, &steps, &ctx).await;

    assert_eq!(result.status, CaseStatus::Passed);
    assert_eq!(result.step_results[1].status_code, Some(200));
}

#[tokio::test]
async fn test_resolution_is_deterministic_across_repeats() {
    let service_id = Uuid::new_v4();

    let document = SchemaResolver::parse_document(USERS_SPEC).unwrap();
    let first = SchemaResolver::extract_endpoints(
        service_id,
        &SchemaResolver::resolve(&document).unwrap(),
    )
    .unwrap();
    let second = SchemaResolver::extract_endpoints(
        service_id,
        &SchemaResolver::resolve(&document).unwrap(),
    )
    .unwrap();

    let ids = |v: &[chainrun::models::Endpoint]| -> Vec<Uuid> { v.iter().map(|e| e.id).collect() };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}
