pub mod core;
pub mod extensions;
pub mod http;
pub mod scrapers;
pub mod stats;

pub use crate::core::{
    handler, Context, CsvItem, Extension, Handler, Item, ItemData, Spider, SpiderConfig,
    SpiderError, SpiderResult, Task,
};
pub use http::{Request, Response};
pub use scrapers::{Client, Middleware, Scraper};
pub use stats::SpiderStatus;

#[cfg(test)]
pub(crate) mod test_util;
