use crate::{Request, Response, SpiderResult};
use async_trait::async_trait;

/// The transport a spider fetches through.
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn fetch(&self, request: &Request) -> SpiderResult<Response>;
}
