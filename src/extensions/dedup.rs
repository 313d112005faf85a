use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

use crate::core::{Context, Extension, Task};

/// Vetoes every task whose request fingerprint was already admitted.
pub fn with_deduplicate() -> Extension {
    Extension::hooks(|spider| {
        let crawled: Arc<Mutex<HashSet<[u8; 16]>>> = Arc::default();
        spider.on_task(move |_ctx: &Context, task: Task| {
            let hash = task.request.fingerprint();
            // check and insert under one lock so concurrent duplicates cannot both pass
            if crawled.lock().insert(hash) {
                Some(task)
            } else {
                None
            }
        });
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::{MockResponse, MockScraper};
    use crate::{Request, Spider, SpiderConfig};
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_same_request_admitted_once() {
        let spider = Spider::with_scraper(SpiderConfig::default(), MockScraper::new()).unwrap();
        spider.use_extensions([with_deduplicate()]).unwrap();
        let origin = Context::seed(spider.clone());

        let mut admitted = 0;
        for _ in 0..5 {
            let task = Task::new(Request::get("http://example.com/a"), HashMap::new(), vec![]);
            if spider.handle_on_task(&origin, task).await.is_some() {
                admitted += 1;
            }
        }
        let other = Task::new(Request::post("http://example.com/a", "q=1"), HashMap::new(), vec![]);

        assert_eq!(admitted, 1);
        assert!(spider.handle_on_task(&origin, other).await.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_seeds_fetch_once() {
        let scraper = MockScraper::new().with_route("http://example.com/", MockResponse::html("<html></html>"));
        let spider = Spider::with_scraper(SpiderConfig::default(), scraper.clone()).unwrap();
        spider.use_extensions([with_deduplicate()]).unwrap();

        for _ in 0..10 {
            spider.seed_task(Request::get("http://example.com/"), vec![]);
        }
        spider.wait().await;

        assert_eq!(scraper.fetch_count(), 1);
        assert_eq!(spider.status().finished_task(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_duplicates_admitted_once() {
        let scraper = MockScraper::new().with_route("http://example.com/", MockResponse::html("<html></html>"));
        let spider = Spider::with_scraper(SpiderConfig::default(), scraper.clone()).unwrap();
        spider.use_extensions([with_deduplicate()]).unwrap();

        let filters: Vec<_> = (0..50)
            .map(|_| {
                let spider = spider.clone();
                tokio::spawn(async move {
                    let origin = Context::seed(spider.clone());
                    let task = Task::new(Request::get("http://example.com/x"), HashMap::new(), vec![]);
                    spider.handle_on_task(&origin, task).await.is_some()
                })
            })
            .collect();
        let mut admitted = 0;
        for filter in filters {
            if filter.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);

        for _ in 0..50 {
            spider.seed_task(Request::get("http://example.com/"), vec![]);
        }
        spider.wait().await;

        assert_eq!(scraper.fetch_count(), 1);
        assert_eq!(spider.status().total_task(), 1);
        assert_eq!(spider.status().finished_task(), 1);
    }
}
