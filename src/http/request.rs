use crate::SpiderError;
use md5::{Digest, Md5};
use reqwest::Method;
use std::collections::HashMap;
use std::fmt;
use url::Url;

/// An outgoing request. A request built from an unparsable URL is still a
/// valid value: it carries its failure and is routed to the request-error
/// hooks instead of being fetched.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    raw_url: String,
    url: Result<Url, url::ParseError>,
    failure: Option<String>,
}

impl Request {
    pub fn new(method: Method, url: &str) -> Self {
        Self {
            method,
            headers: HashMap::new(),
            body: None,
            raw_url: url.to_string(),
            url: Url::parse(url),
            failure: None,
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: &str, body: impl Into<String>) -> Self {
        Self::new(Method::POST, url).with_body(body)
    }

    pub fn from_url(method: Method, url: Url) -> Self {
        Self {
            method,
            headers: HashMap::new(),
            body: None,
            raw_url: url.to_string(),
            url: Ok(url),
            failure: None,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Marks the request as failed before it reaches the network.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.failure = Some(reason.into());
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref().ok()
    }

    pub fn raw_url(&self) -> &str {
        &self.raw_url
    }

    /// The preset failure of this request, if any.
    pub fn error(&self) -> Option<SpiderError> {
        match (&self.url, &self.failure) {
            (Err(e), _) => Some(SpiderError::UrlError(*e)),
            (Ok(_), Some(reason)) => Some(SpiderError::RequestError(reason.clone())),
            (Ok(_), None) => None,
        }
    }

    /// Resolves a possibly relative link against this request's URL.
    pub fn join(&self, href: &str) -> Request {
        match &self.url {
            Ok(base) => match base.join(href) {
                Ok(url) => Request::from_url(Method::GET, url),
                Err(_) => Request::get(href),
            },
            Err(_) => Request::get(href),
        }
    }

    /// MD5 over the fields that identify a request: method, URL and body.
    pub fn fingerprint(&self) -> [u8; 16] {
        let mut hasher = Md5::new();
        hasher.update(self.method.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(self.raw_url.as_bytes());
        hasher.update([0]);
        if let Some(body) = &self.body {
            hasher.update(body.as_bytes());
        }
        hasher.finalize().into()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.raw_url)
    }
}
