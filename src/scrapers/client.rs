use parking_lot::RwLock;
use std::sync::Arc;

use super::{Middleware, Scraper};
use crate::{Request, Response, SpiderResult};

/// A scraper plus its middleware stack. Cloning shares both.
#[derive(Clone)]
pub struct Client {
    scraper: Arc<dyn Scraper>,
    middlewares: Arc<RwLock<Vec<Arc<dyn Middleware>>>>,
}

impl Client {
    pub fn new(scraper: impl Scraper + 'static) -> Self {
        Self {
            scraper: Arc::new(scraper),
            middlewares: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn use_middleware(&self, middleware: Arc<dyn Middleware>) {
        self.middlewares.write().push(middleware);
    }

    /// Runs the request through the middleware stack and the transport. A
    /// request failed by a middleware never reaches the transport.
    pub async fn fetch(&self, request: Request) -> SpiderResult<Response> {
        let middlewares = self.middlewares.read().clone();

        let mut request = request;
        for middleware in &middlewares {
            request = middleware.process_request(request).await;
        }
        if let Some(err) = request.error() {
            return Err(err);
        }

        let mut response = self.scraper.fetch(&request).await?;
        for middleware in &middlewares {
            response = middleware.process_response(response).await;
        }
        Ok(response)
    }
}
