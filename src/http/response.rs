use crate::SpiderResult;
use chrono::prelude::*;
use scraper::Html;
use serde_json::Value;
use std::collections::HashMap;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    Html,
    Json,
    Text,
    Binary,
}

impl ResponseType {
    /// Sniffs the content type from the `content-type` header, falling back
    /// to the first bytes of the body.
    pub fn detect(headers: &HashMap<String, String>, body: &str) -> Self {
        if let Some(content_type) = headers.get("content-type") {
            if content_type.contains("text/html") {
                ResponseType::Html
            } else if content_type.contains("application/json") {
                ResponseType::Json
            } else if content_type.contains("text/") {
                ResponseType::Text
            } else {
                ResponseType::Binary
            }
        } else {
            let start = body.trim_start();
            if start.starts_with('{') || start.starts_with('[') {
                ResponseType::Json
            } else if start.starts_with("<!DOCTYPE")
                || start.starts_with("<!doctype")
                || start.starts_with("<html")
            {
                ResponseType::Html
            } else {
                ResponseType::Text
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub url: Url,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub response_type: ResponseType,
    pub timestamp: DateTime<Utc>,
}

impl Response {
    pub fn new(url: Url, status: u16, headers: HashMap<String, String>, body: String) -> Self {
        let response_type = ResponseType::detect(&headers, &body);
        Self {
            url,
            status,
            headers,
            body,
            response_type,
            timestamp: Utc::now(),
        }
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_html(&self) -> bool {
        self.response_type == ResponseType::Html
    }

    pub fn is_json(&self) -> bool {
        self.response_type == ResponseType::Json
    }

    pub fn html(&self) -> Html {
        Html::parse_document(&self.body)
    }

    pub fn json(&self) -> SpiderResult<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Translates a dotted query such as `data.items.0.name` into a JSON pointer.
/// An empty query addresses the whole document.
pub fn json_pointer(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }
    query
        .split('.')
        .map(|segment| format!("/{}", segment.replace('~', "~0").replace('/', "~1")))
        .collect()
}
