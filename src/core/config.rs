use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::scrapers::http_scraper::DEFAULT_USER_AGENT;
use crate::{SpiderError, SpiderResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpiderConfig {
    pub name: String,
    /// Log task faults and per-fetch completion through the `log` facade.
    pub logging: bool,
    /// Maximum number of tasks fetching and running handlers at once.
    pub concurrency: usize,
    pub status_interval_secs: u64,
    pub user_agent: String,
    pub headers: Vec<(String, String)>,
}

impl Default for SpiderConfig {
    fn default() -> Self {
        Self {
            name: "spider".to_string(),
            logging: true,
            concurrency: 32,
            status_interval_secs: 5,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: Vec::new(),
        }
    }
}

impl SpiderConfig {
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval_secs = interval.as_secs();
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn with_headers(mut self, headers: Vec<(&str, &str)>) -> Self {
        self.headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    pub fn validate(&self) -> SpiderResult<()> {
        if self.concurrency == 0 {
            return Err(SpiderError::ConfigError(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.status_interval_secs == 0 {
            return Err(SpiderError::ConfigError(
                "status interval must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}
