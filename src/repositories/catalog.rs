use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Endpoint;

/// Resolved endpoints per service, keyed for lookup by the graph builder
/// and by manual selection. A re-upload supersedes the service's endpoint
/// set; historical run results keep their own snapshots.
#[derive(Default)]
pub struct EndpointCatalog {
    inner: RwLock<HashMap<Uuid, Vec<Endpoint>>>,
}

impl EndpointCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the endpoint set for a service
    pub async fn store(&self, service_id: Uuid, endpoints: Vec<Endpoint>) {
        let mut inner = self.inner.write().await;
        inner.insert(service_id, endpoints);
    }

    pub async fn list(&self, service_id: Uuid) -> Vec<Endpoint> {
        let inner = self.inner.read().await;
        inner.get(&service_id).cloned().unwrap_or_default()
    }

    pub async fn get(&self, endpoint_id: Uuid) -> AppResult<Endpoint> {
        let inner = self.inner.read().await;
        inner
            .values()
            .flatten()
            .find(|e| e.id == endpoint_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Endpoint".to_string()))
    }

    /// Lookup by (method, path) within a service
    pub async fn find(&self, service_id: Uuid, method: &str, path: &str) -> Option<Endpoint> {
        let inner = self.inner.read().await;
        inner.get(&service_id).and_then(|eps| {
            eps.iter()
                .find(|e| e.method.eq_ignore_ascii_case(method) && e.path == path)
                .cloned()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn endpoint(service_id: Uuid, method: &str, path: &str) -> Endpoint {
        Endpoint {
            id: Uuid::new_v4(),
            service_id,
            method: method.to_string(),
            path: path.to_string(),
            summary: None,
            description: None,
            parameters: Vec::new(),
            request_body: None,
            responses: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_store_supersedes() {
        let catalog = EndpointCatalog::new();
        let service_id = Uuid::new_v4();

        catalog
            .store(service_id, vec![endpoint(service_id, "GET", "/v1/users")])
            .await;
        catalog
            .store(service_id, vec![endpoint(service_id, "GET", "/v2/users")])
            .await;

        let endpoints = catalog.list(service_id).await;
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].path, "/v2/users");
    }

    #[tokio::test]
    async fn test_find_by_method_path() {
        let catalog = EndpointCatalog::new();
        let service_id = Uuid::new_v4();
        catalog
            .store(
                service_id,
                vec![
                    endpoint(service_id, "GET", "/users"),
                    endpoint(service_id, "POST", "/users"),
                ],
            )
            .await;

        let found = catalog.find(service_id, "post", "/users").await.unwrap();
        assert_eq!(found.method, "POST");
        assert!(catalog.find(service_id, "DELETE", "/users").await.is_none());
    }
}
