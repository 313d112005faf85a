use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use robotstxt::DefaultMatcher;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::core::{Context, Extension, Task, TaskHook};
use crate::{Client, Request, SpiderError, SpiderResult};

/// Obeys `robots.txt`. Policies are fetched lazily, once per origin, through
/// the spider's own client. An origin whose `robots.txt` cannot be fetched or
/// does not answer 200 is treated as allowing everything and is asked again
/// next time.
pub struct RobotsTxt {
    user_agent: String,
    client: Client,
    policies: Mutex<HashMap<String, Arc<OnceCell<String>>>>,
}

impl RobotsTxt {
    pub fn new(user_agent: &str, client: Client) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            client,
            policies: Mutex::new(HashMap::new()),
        }
    }

    pub async fn allowed(&self, request: &Request) -> bool {
        let Some(url) = request.url() else {
            return true;
        };
        let Some(host) = url.host_str() else {
            return true;
        };
        let origin = match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        };

        // one cell per origin: concurrent tasks to the same origin wait for a
        // single fetch, other origins are not blocked
        let cell = Arc::clone(self.policies.lock().entry(origin.clone()).or_default());
        match cell.get_or_try_init(|| self.fetch_policy(&origin)).await {
            Ok(body) => DefaultMatcher::default().one_agent_allowed_by_robots(
                body,
                &self.user_agent,
                url.as_str(),
            ),
            Err(err) => {
                debug!("No usable robots.txt for {}: {}", origin, err);
                true
            }
        }
    }

    async fn fetch_policy(&self, origin: &str) -> SpiderResult<String> {
        let robots_url = format!("{}/robots.txt", origin);
        let response = self.client.fetch(Request::get(&robots_url)).await?;
        if response.status != 200 {
            return Err(SpiderError::StatusError(response.status));
        }
        debug!("Fetched {} ({} bytes)", robots_url, response.body.len());
        Ok(response.body)
    }
}

#[async_trait]
impl TaskHook for RobotsTxt {
    async fn on_task(&self, _ctx: &Context, task: Task) -> Option<Task> {
        if self.allowed(&task.request).await {
            Some(task)
        } else {
            debug!("Disallowed by robots.txt: {}", task.request);
            None
        }
    }
}

pub fn with_robots_txt(user_agent: &str) -> Extension {
    let user_agent = user_agent.to_string();
    Extension::hooks(move |spider| {
        spider.on_task_hook(RobotsTxt::new(&user_agent, spider.client().clone()));
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Spider, SpiderConfig};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn page(server: &MockServer, route: &str, expected: u64) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(expected)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_disallowed_paths_are_vetoed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
            )
            .expect(1)
            .mount(&server)
            .await;
        page(&server, "/public", 1).await;
        page(&server, "/private/page", 0).await;

        let spider = Spider::new(SpiderConfig::default().with_logging(false)).unwrap();
        spider.use_extensions([with_robots_txt("taskspider")]).unwrap();
        spider.seed_task(Request::get(&format!("{}/public", server.uri())), vec![]);
        spider.seed_task(Request::get(&format!("{}/private/page", server.uri())), vec![]);
        spider.wait().await;

        assert_eq!(spider.status().finished_task(), 1);
        server.verify().await;
    }

    #[tokio::test]
    async fn test_agent_specific_rules() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("User-agent: badbot\nDisallow: /\n"),
            )
            .mount(&server)
            .await;

        let spider = Spider::new(SpiderConfig::default()).unwrap();
        let polite = RobotsTxt::new("goodbot", spider.client().clone());
        let blocked = RobotsTxt::new("badbot", spider.client().clone());
        let request = Request::get(&format!("{}/anything", server.uri()));

        assert!(polite.allowed(&request).await);
        assert!(!blocked.allowed(&request).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_origin_does_not_block_others() {
        let slow = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nDisallow:\n")
                    .set_delay(Duration::from_secs(2)),
            )
            .expect(1)
            .mount(&slow)
            .await;
        let fast = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"))
            .mount(&fast)
            .await;

        let spider = Spider::new(SpiderConfig::default().with_logging(false)).unwrap();
        let robots = Arc::new(RobotsTxt::new("taskspider", spider.client().clone()));

        let waiting = Arc::clone(&robots);
        let slow_page = Request::get(&format!("{}/page", slow.uri()));
        let pending = tokio::spawn(async move { waiting.allowed(&slow_page).await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let fast_page = Request::get(&format!("{}/private/page", fast.uri()));
        let checked = tokio::time::timeout(Duration::from_millis(1000), robots.allowed(&fast_page)).await;
        assert_eq!(checked.ok(), Some(false));

        let slow_again = Request::get(&format!("{}/other", slow.uri()));
        assert!(robots.allowed(&slow_again).await);
        assert!(pending.await.unwrap());
        slow.verify().await;
    }

    #[tokio::test]
    async fn test_missing_robots_fails_open() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        page(&server, "/private/page", 1).await;

        let spider = Spider::new(SpiderConfig::default().with_logging(false)).unwrap();
        spider.use_extensions([with_robots_txt("taskspider")]).unwrap();
        spider.seed_task(Request::get(&format!("{}/private/page", server.uri())), vec![]);
        spider.wait().await;

        assert_eq!(spider.status().finished_task(), 1);
        server.verify().await;
    }
}
