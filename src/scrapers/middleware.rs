use crate::{Request, Response};
use async_trait::async_trait;

/// Client middleware. Requests pass through every middleware in registration
/// order before the transport sees them, and responses pass back through in
/// the same order.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn process_request(&self, request: Request) -> Request {
        request
    }

    async fn process_response(&self, response: Response) -> Response {
        response
    }
}

/// Adds headers to every request that does not already set them.
#[derive(Debug, Clone, Default)]
pub struct DefaultHeaders {
    headers: Vec<(String, String)>,
}

impl DefaultHeaders {
    pub fn new<K: Into<String>, V: Into<String>>(headers: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.into().to_ascii_lowercase(), v.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl Middleware for DefaultHeaders {
    async fn process_request(&self, mut request: Request) -> Request {
        for (key, value) in &self.headers {
            let present = request.headers.keys().any(|k| k.eq_ignore_ascii_case(key));
            if !present {
                request.headers.insert(key.clone(), value.clone());
            }
        }
        request
    }
}
