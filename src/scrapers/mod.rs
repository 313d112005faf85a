pub mod client;
pub mod http_scraper;
pub mod middleware;
pub mod mock_scraper;

mod scraper;
pub use client::Client;
pub use http_scraper::HttpScraper;
pub use middleware::{DefaultHeaders, Middleware};
pub use mock_scraper::{MockResponse, MockScraper};
pub use self::scraper::Scraper;
