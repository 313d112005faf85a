use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use url::Url;

use super::Scraper;
use crate::{Request, Response, SpiderError, SpiderResult};

/// A canned answer served by [`MockScraper`].
#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub content_type: Option<String>,
    pub delay: Option<Duration>,
    pub failure: Option<String>,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            content_type: None,
            delay: None,
            failure: None,
        }
    }

    pub fn html(body: impl Into<String>) -> Self {
        Self::new(200, body).with_content_type("text/html; charset=utf-8")
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self::new(200, body).with_content_type("application/json")
    }

    /// A fetch that fails at the transport level.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::new(0, "")
        }
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// An in-memory transport keyed by URL. Unknown URLs answer 404.
#[derive(Clone, Default)]
pub struct MockScraper {
    routes: Arc<HashMap<String, MockResponse>>,
    fetched: Arc<Mutex<Vec<String>>>,
}

impl MockScraper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, url: &str, response: MockResponse) -> Self {
        let key = normalize(url);
        Arc::make_mut(&mut self.routes).insert(key, response);
        self
    }

    /// URLs fetched so far, in completion order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetched.lock().len()
    }
}

fn normalize(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[async_trait]
impl Scraper for MockScraper {
    async fn fetch(&self, request: &Request) -> SpiderResult<Response> {
        let url = request
            .url()
            .cloned()
            .ok_or_else(|| SpiderError::RequestError(format!("unparsable URL {}", request.raw_url())))?;
        let route = self.routes.get(url.as_str()).cloned();

        if let Some(delay) = route.as_ref().and_then(|r| r.delay) {
            sleep(delay).await;
        }
        self.fetched.lock().push(url.to_string());

        let Some(route) = route else {
            return Ok(Response::new(url, 404, HashMap::new(), String::new()));
        };
        if let Some(reason) = route.failure {
            return Err(SpiderError::IoError(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                reason,
            )));
        }

        let mut headers = HashMap::new();
        if let Some(content_type) = route.content_type {
            headers.insert("content-type".to_string(), content_type);
        }
        Ok(Response::new(url, route.status, headers, route.body))
    }
}
