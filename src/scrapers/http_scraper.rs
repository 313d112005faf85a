use async_trait::async_trait;
use log::trace;
use reqwest::{header, Client, ClientBuilder};
use std::collections::HashMap;

use super::Scraper;
use crate::core::SpiderConfig;
use crate::{Request, Response, SpiderError, SpiderResult};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

impl From<header::InvalidHeaderName> for SpiderError {
    fn from(err: header::InvalidHeaderName) -> Self {
        SpiderError::ConfigError(format!("invalid header name: {}", err))
    }
}

impl From<header::InvalidHeaderValue> for SpiderError {
    fn from(err: header::InvalidHeaderValue) -> Self {
        SpiderError::ConfigError(format!("invalid header value: {}", err))
    }
}

#[derive(Clone)]
pub struct HttpScraper {
    client: Client,
}

impl HttpScraper {
    pub fn new() -> SpiderResult<Self> {
        let client = ClientBuilder::new().user_agent(DEFAULT_USER_AGENT).build()?;
        Ok(Self { client })
    }

    pub fn from_config(config: &SpiderConfig) -> SpiderResult<Self> {
        let headers: Vec<(&str, &str)> = config
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        Self::new()?.with_headers(&config.user_agent, headers)
    }

    pub fn with_headers(mut self, user_agent: &str, headers: Vec<(&str, &str)>) -> SpiderResult<Self> {
        let mut header_map = header::HeaderMap::new();
        header_map.insert(header::USER_AGENT, header::HeaderValue::from_str(user_agent)?);

        for (key, value) in headers {
            let name = header::HeaderName::from_bytes(key.as_bytes())?;
            let value = header::HeaderValue::from_str(value)?;
            header_map.insert(name, value);
        }

        self.client = ClientBuilder::new().default_headers(header_map).build()?;

        Ok(self)
    }

    fn extract_headers(response: &reqwest::Response) -> HashMap<String, String> {
        response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|val| (k.to_string(), val.to_string())))
            .collect()
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    async fn fetch(&self, request: &Request) -> SpiderResult<Response> {
        let url = request
            .url()
            .cloned()
            .ok_or_else(|| SpiderError::RequestError(format!("unparsable URL {}", request.raw_url())))?;

        let mut req = self.client.request(request.method.clone(), url);
        for (key, value) in &request.headers {
            req = req.header(key, value);
        }
        if let Some(body) = request.body.clone() {
            req = req.body(body);
        }

        let response = req.send().await?;
        let final_url = response.url().clone();
        let status = response.status().as_u16();
        let headers = Self::extract_headers(&response);
        let body = response.text().await?;

        trace!("Fetched {} (status={}, length={})", final_url, status, body.len());

        Ok(Response::new(final_url, status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ResponseType;
    use reqwest::Method;
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (HttpScraper, MockServer) {
        let server = MockServer::start().await;
        let scraper = HttpScraper::new().unwrap();
        (scraper, server)
    }

    #[tokio::test]
    async fn test_get_request() {
        let (scraper, mock_server) = setup().await;

        Mock::given(method("GET"))
            .and(path("/test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("Hello, World!")
                    .insert_header("content-type", "text/plain"),
            )
            .mount(&mock_server)
            .await;

        let request = Request::get(&format!("{}/test", mock_server.uri()));
        let response = scraper.fetch(&request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.text(), "Hello, World!");
        assert_eq!(response.response_type, ResponseType::Text);
    }

    #[tokio::test]
    async fn test_post_request() {
        let (scraper, mock_server) = setup().await;
        let body = json!({"key": "value"}).to_string();

        Mock::given(method("POST"))
            .and(path("/test"))
            .and(body_string(body.clone()))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"status": "created"}))
                    .insert_header("content-type", "application/json"),
            )
            .mount(&mock_server)
            .await;

        let request = Request::get(&format!("{}/test", mock_server.uri()))
            .with_method(Method::POST)
            .with_body(body);
        let response = scraper.fetch(&request).await.unwrap();

        assert_eq!(response.status, 201);
        assert_eq!(response.json().unwrap(), json!({"status": "created"}));
        assert!(response.is_json());
    }

    #[tokio::test]
    async fn test_error_status_is_not_a_fetch_error() {
        let (scraper, mock_server) = setup().await;

        Mock::given(method("GET"))
            .and(path("/error"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&mock_server)
            .await;

        let request = Request::get(&format!("{}/error", mock_server.uri()));
        let response = scraper.fetch(&request).await.unwrap();

        assert_eq!(response.status, 404);
        assert!(!response.is_success());
        assert_eq!(response.text(), "Not Found");
    }

    #[tokio::test]
    async fn test_custom_headers() {
        let (scraper, mock_server) = setup().await;
        let custom_ua = "CustomBot/1.0";
        let scraper = scraper
            .with_headers(custom_ua, vec![("x-crawl", "yes")])
            .unwrap();

        Mock::given(method("GET"))
            .and(path("/"))
            .and(header("user-agent", custom_ua))
            .and(header("x-crawl", "yes"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&mock_server)
            .await;

        let request = Request::get(&format!("{}/", mock_server.uri()));
        let response = scraper.fetch(&request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.text(), "ok");
    }

    #[tokio::test]
    async fn test_request_headers_are_sent() {
        let (scraper, mock_server) = setup().await;

        Mock::given(method("GET"))
            .and(path("/api"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("[]", "application/json"))
            .mount(&mock_server)
            .await;

        let request = Request::get(&format!("{}/api", mock_server.uri()))
            .with_header("accept", "application/json");
        let response = scraper.fetch(&request).await.unwrap();

        assert_eq!(response.status, 200);
        assert!(response.is_json());
    }

    #[tokio::test]
    async fn test_invalid_headers() {
        let scraper = HttpScraper::new().unwrap();
        let result = scraper.with_headers(DEFAULT_USER_AGENT, vec![("invalid\0header", "value")]);
        assert!(matches!(result, Err(SpiderError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_unparsable_url_is_rejected() {
        let scraper = HttpScraper::new().unwrap();
        let result = scraper.fetch(&Request::get("::nope::")).await;
        assert!(matches!(result, Err(SpiderError::RequestError(_))));
    }
}
