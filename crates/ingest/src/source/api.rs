use async_trait::async_trait;
use lakeshore_core::config::EndpointConfig;
use lakeshore_core::Batch;
use reqwest::{Client, Method};
use serde_json::Value as Json;
use tracing::{debug, info};

use super::{Chunk, ChunkedSource};
use crate::retry::RetryExecutor;
use crate::shape::ShapeFn;
use crate::IngestError;

/// Pages through one REST endpoint, one request per chunk.
///
/// Pagination uses `limit` / `skip` query parameters. The source is exhausted
/// when a page comes back shorter than the page size, when `skip` reaches the
/// payload's `total`, or after the first page if pagination is off. Each page
/// request goes through the retry executor; raw payloads are kept for backup.
pub struct ApiChunkedSource {
    name: String,
    client: Client,
    method: Method,
    endpoint: EndpointConfig,
    page_size: usize,
    shape: ShapeFn,
    retry: RetryExecutor,
    skip: usize,
    done: bool,
    raw_pages: Vec<Json>,
}

impl ApiChunkedSource {
    pub fn new(
        name: &str,
        endpoint: EndpointConfig,
        default_page_size: usize,
        client: Client,
        shape: ShapeFn,
        retry: RetryExecutor,
    ) -> Result<Self, IngestError> {
        let method = endpoint
            .method
            .to_uppercase()
            .parse::<Method>()
            .map_err(|_| IngestError::Config(format!("invalid HTTP method: {}", endpoint.method)))?;
        let page_size = endpoint.page_size.unwrap_or(default_page_size).max(1);

        Ok(Self {
            name: name.to_string(),
            client,
            method,
            endpoint,
            page_size,
            shape,
            retry,
            skip: 0,
            done: false,
            raw_pages: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pages_fetched(&self) -> usize {
        self.raw_pages.len()
    }

    /// Raw page payloads fetched so far, in request order.
    pub fn raw_pages(&self) -> &[Json] {
        &self.raw_pages
    }

    async fn fetch_page(&self) -> Result<Json, IngestError> {
        let mut request = self.client.request(self.method.clone(), &self.endpoint.url);

        if self.endpoint.paginate {
            let params: Vec<(&str, &str)> = self
                .endpoint
                .params
                .iter()
                .filter(|(k, _)| k.as_str() != "limit" && k.as_str() != "skip")
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            request = request
                .query(&params)
                .query(&[("limit", self.page_size), ("skip", self.skip)]);
        } else {
            request = request.query(&self.endpoint.params);
        }
        for (key, value) in &self.endpoint.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        debug!(endpoint = %self.name, skip = self.skip, "Requesting page");
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<Json>().await?)
    }
}

#[async_trait]
impl ChunkedSource for ApiChunkedSource {
    async fn next_chunk(&mut self) -> Result<Chunk, IngestError> {
        if self.done {
            return Ok(Chunk {
                rows: Batch::default(),
                done: true,
            });
        }

        let label = format!("api:{}", self.name);
        let payload = {
            let this = &*self;
            this.retry.execute(&label, || this.fetch_page()).await?
        };
        let rows = (self.shape)(&payload)?;
        let fetched = rows.num_rows();

        if self.endpoint.paginate {
            let total = payload.get("total").and_then(Json::as_u64);
            self.skip += fetched;
            self.done = fetched < self.page_size
                || total.is_some_and(|t| self.skip as u64 >= t);
        } else {
            self.done = true;
        }
        self.raw_pages.push(payload);

        info!(
            endpoint = %self.name,
            rows = fetched,
            page = self.raw_pages.len(),
            done = self.done,
            "Fetched page"
        );
        Ok(Chunk {
            rows,
            done: self.done,
        })
    }
}
