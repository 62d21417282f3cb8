//! HTTP client wrapper for the vector store's REST API.

use crate::config::get_config;
use crate::vector::payload::{build_payload, current_timestamp_rfc3339};
use crate::vector::types::{
    PointInsert, QueryResponse, QueryResponseResult, ScoredPoint, ScrollResponse, VectorStoreError,
};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Lightweight HTTP client for vector store operations.
pub struct VectorService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl VectorService {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, VectorStoreError> {
        let config = get_config();
        let client = Client::builder().user_agent("studyrag/0.1").build()?;

        let base_url =
            normalize_base_url(&config.qdrant_url).map_err(VectorStoreError::InvalidUrl)?;
        tracing::debug!(url = %base_url, "Initialized vector store HTTP client");

        Ok(Self {
            client,
            base_url,
            api_key: config.qdrant_api_key.clone(),
        })
    }

    /// Construct a client against an explicit base URL, bypassing the global
    /// configuration. Used when wiring against non-default stores and in
    /// integration tests.
    pub fn with_base_url(
        base_url: &str,
        api_key: Option<String>,
    ) -> Result<Self, VectorStoreError> {
        let client = Client::builder().user_agent("studyrag/0.1").build()?;
        let base_url = normalize_base_url(base_url).map_err(VectorStoreError::InvalidUrl)?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Create a collection only when it is missing from the store.
    pub async fn ensure_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), VectorStoreError> {
        if self.collection_exists(collection_name).await? {
            return Ok(());
        }
        tracing::debug!(
            collection = collection_name,
            vector_size,
            "Creating collection"
        );
        self.create_collection(collection_name, vector_size).await
    }

    /// Create or update a collection with the specified vector size.
    pub async fn create_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), VectorStoreError> {
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, "Collection ensured/created");
        })
        .await
    }

    /// Check whether a collection is present in the store.
    pub async fn collection_exists(&self, collection_name: &str) -> Result<bool, VectorStoreError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = VectorStoreError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    /// Drop a collection and all of its points.
    pub async fn delete_collection(&self, collection_name: &str) -> Result<(), VectorStoreError> {
        let response = self
            .request(Method::DELETE, &format!("collections/{collection_name}"))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::info!(collection = collection_name, "Collection deleted");
        })
        .await
    }

    /// Upload chunk vectors with their payloads to the given collection.
    pub async fn upsert_points(
        &self,
        collection_name: &str,
        points: Vec<PointInsert>,
    ) -> Result<usize, VectorStoreError> {
        if points.is_empty() {
            return Ok(0);
        }

        let now = current_timestamp_rfc3339();
        let serialized: Vec<_> = points
            .into_iter()
            .map(|point| {
                let payload = build_payload(&point.text, &point.chunk_hash, &now, &point.metadata);
                json!({
                    "id": Uuid::new_v4().to_string(),
                    "vector": point.vector,
                    "payload": payload,
                })
            })
            .collect();

        let point_count = serialized.len();
        let response = self
            .request(
                Method::PUT,
                &format!("collections/{collection_name}/points"),
            )
            .query(&[("wait", true)])
            .json(&json!({ "points": serialized }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                points = point_count,
                "Points indexed"
            );
        })
        .await?;

        Ok(point_count)
    }

    /// Perform a similarity search against a collection, returning scored payloads.
    pub async fn search_points(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/query"),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = VectorStoreError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Similarity search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        let results = points
            .into_iter()
            .map(|point| ScoredPoint {
                id: stringify_point_id(point.id),
                score: point.score,
                payload: point.payload,
            })
            .collect();

        Ok(results)
    }

    /// Scroll up to `max_points` chunk payloads out of a collection.
    ///
    /// Used to assemble collection-level context for summarization.
    pub async fn scroll_payloads(
        &self,
        collection: &str,
        max_points: usize,
    ) -> Result<Vec<Map<String, Value>>, VectorStoreError> {
        let mut offset: Option<Value> = None;
        let mut payloads = Vec::new();

        loop {
            let mut body = Map::new();
            body.insert("with_payload".into(), json!(true));
            body.insert("with_vector".into(), json!(false));
            body.insert("limit".into(), json!(256));
            if let Some(next) = &offset {
                body.insert("offset".into(), next.clone());
            }

            let response = self
                .request(
                    Method::POST,
                    &format!("collections/{collection}/points/scroll"),
                )
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error = VectorStoreError::UnexpectedStatus { status, body };
                tracing::error!(collection, error = %error, "Failed to scroll payloads");
                return Err(error);
            }

            let ScrollResponse { result } = response.json().await?;
            for point in result.points {
                if let Some(payload) = point.payload {
                    payloads.push(payload);
                    if payloads.len() >= max_points {
                        return Ok(payloads);
                    }
                }
            }

            match result.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(payloads)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), VectorStoreError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = VectorStoreError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Vector store request failed");
            Err(error)
        }
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::DELETE, Method::GET, Method::POST, Method::PUT, MockServer};
    use reqwest::Client;

    fn service(base_url: String) -> VectorService {
        VectorService {
            client: Client::builder()
                .user_agent("studyrag-test")
                .build()
                .expect("client"),
            base_url,
            api_key: None,
        }
    }

    #[tokio::test]
    async fn search_points_parses_scored_payloads() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/physics-7/points/query");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": [
                        {
                            "id": "point-1",
                            "score": 0.87,
                            "payload": {
                                "text": "Force equals mass times acceleration.",
                                "source": "physics.pdf",
                                "page": 12
                            }
                        }
                    ]
                }));
            })
            .await;

        let results = service(server.base_url())
            .search_points("physics-7", vec![0.1, 0.2, 0.3, 0.4], 10)
            .await
            .expect("search request");

        mock.assert();
        assert_eq!(results.len(), 1);
        let hit = &results[0];
        assert_eq!(hit.id, "point-1");
        assert!((hit.score - 0.87).abs() < f32::EPSILON);
        let payload = hit.payload.as_ref().expect("payload");
        assert_eq!(payload["source"], Value::String("physics.pdf".into()));
    }

    #[tokio::test]
    async fn upsert_points_sends_payloads_and_counts() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/physics-7/points")
                    .query_param("wait", "true")
                    .json_body_partial(r#"{"points": [{"payload": {"text": "chunk one"}}]}"#);
                then.status(200)
                    .json_body(json!({"status": "ok", "result": {"status": "acknowledged"}}));
            })
            .await;

        let points = vec![PointInsert {
            text: "chunk one".into(),
            metadata: Map::new(),
            chunk_hash: "hash-1".into(),
            vector: vec![0.1, 0.2, 0.3, 0.4],
        }];
        let inserted = service(server.base_url())
            .upsert_points("physics-7", points)
            .await
            .expect("upsert request");

        mock.assert();
        assert_eq!(inserted, 1);
    }

    #[tokio::test]
    async fn upsert_of_nothing_skips_the_network() {
        let server = MockServer::start_async().await;
        let inserted = service(server.base_url())
            .upsert_points("physics-7", Vec::new())
            .await
            .expect("no-op upsert");
        assert_eq!(inserted, 0);
    }

    #[tokio::test]
    async fn collection_exists_maps_status_codes() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/present");
                then.status(200).json_body(json!({"result": {}}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/absent");
                then.status(404).json_body(json!({"status": "not found"}));
            })
            .await;

        let service = service(server.base_url());
        assert!(service.collection_exists("present").await.expect("exists"));
        assert!(!service.collection_exists("absent").await.expect("absent"));
    }

    #[tokio::test]
    async fn delete_collection_surfaces_failure_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/collections/physics-7");
                then.status(500).body("boom");
            })
            .await;

        let err = service(server.base_url())
            .delete_collection("physics-7")
            .await
            .expect_err("must fail");
        match err {
            VectorStoreError::UnexpectedStatus { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn scroll_payloads_follows_pagination() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/physics-7/points/scroll")
                    .json_body_partial(r#"{"offset": "page-2"}"#);
                then.status(200).json_body(json!({
                    "result": {
                        "points": [{"id": "b", "payload": {"text": "second"}}],
                        "next_page_offset": null
                    }
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/physics-7/points/scroll")
                    .matches(|req| {
                        let body = req.body.as_deref().unwrap_or_default();
                        !String::from_utf8_lossy(body).contains("offset")
                    });
                then.status(200).json_body(json!({
                    "result": {
                        "points": [{"id": "a", "payload": {"text": "first"}}],
                        "next_page_offset": "page-2"
                    }
                }));
            })
            .await;

        let payloads = service(server.base_url())
            .scroll_payloads("physics-7", 100)
            .await
            .expect("scroll request");
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0]["text"], Value::String("first".into()));
        assert_eq!(payloads[1]["text"], Value::String("second".into()));
    }
}
