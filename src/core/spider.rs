use futures::FutureExt;
use log::{debug, error, trace, warn};
use scraper::{ElementRef, Selector};
use serde_json::Value;
use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::config::SpiderConfig;
use super::context::{Context, Item, ItemData, Task};
use super::hooks::{ErrorHook, Extension, Handler, Hooks, TaskHook};
use crate::http::json_pointer;
use crate::scrapers::{Client, HttpScraper, Scraper};
use crate::stats::SpiderStatus;
use crate::{Request, SpiderError, SpiderResult};

struct SpiderInner {
    config: SpiderConfig,
    client: Client,
    status: Arc<SpiderStatus>,
    hooks: Hooks,
    tracker: TaskTracker,
    workers: Arc<Semaphore>,
    token: CancellationToken,
}

impl Drop for SpiderInner {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// The crawl orchestrator. Cloning yields another handle to the same spider.
#[derive(Clone)]
pub struct Spider {
    inner: Arc<SpiderInner>,
}

impl Spider {
    /// Creates a spider fetching over HTTP. Must be called from within a
    /// tokio runtime.
    pub fn new(config: SpiderConfig) -> SpiderResult<Self> {
        let scraper = HttpScraper::from_config(&config)?;
        Self::with_scraper(config, scraper)
    }

    pub fn with_scraper(config: SpiderConfig, scraper: impl Scraper + 'static) -> SpiderResult<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SpiderError::ConfigError(format!("spider requires a tokio runtime: {}", e)))?;

        let status = Arc::new(SpiderStatus::new());
        let token = CancellationToken::new();
        status.spawn_estimator(&runtime, config.status_interval(), token.child_token());

        debug!(
            "Initializing spider {} (concurrency={})",
            config.name, config.concurrency
        );

        Ok(Self {
            inner: Arc::new(SpiderInner {
                workers: Arc::new(Semaphore::new(config.concurrency)),
                config,
                client: Client::new(scraper),
                status,
                hooks: Hooks::default(),
                tracker: TaskTracker::new(),
                token,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &SpiderConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    pub fn status(&self) -> &SpiderStatus {
        &self.inner.status
    }

    fn logging(&self) -> bool {
        self.inner.config.logging
    }

    pub fn use_extensions(&self, extensions: impl IntoIterator<Item = Extension>) -> SpiderResult<()> {
        for extension in extensions {
            match extension {
                Extension::Hooks(register) => register(self)?,
                Extension::Middleware(middleware) => self.inner.client.use_middleware(middleware),
            }
        }
        Ok(())
    }

    pub fn on_task<F>(&self, f: F)
    where
        F: Fn(&Context, Task) -> Option<Task> + Send + Sync + 'static,
    {
        self.inner.hooks.on_task.write().push(Arc::new(f));
    }

    /// Registers a task filter that needs to suspend, e.g. to fetch a policy.
    pub fn on_task_hook(&self, hook: impl TaskHook + 'static) {
        self.inner.hooks.on_task.write().push(Arc::new(hook));
    }

    pub fn on_resp<F>(&self, f: F)
    where
        F: Fn(&mut Context) -> SpiderResult<()> + Send + Sync + 'static,
    {
        self.inner.hooks.on_resp.write().push(Arc::new(f));
    }

    /// Calls `f` once per element matching `selector` in HTML responses.
    pub fn on_html<F>(&self, selector: &str, f: F) -> SpiderResult<()>
    where
        F: Fn(&mut Context, ElementRef<'_>) -> SpiderResult<()> + Send + Sync + 'static,
    {
        let parsed = Selector::parse(selector)
            .map_err(|e| SpiderError::SelectorError(format!("{}: {}", selector, e)))?;
        self.on_resp(move |ctx: &mut Context| {
            let document = match ctx.response() {
                Some(response) if response.is_html() => response.html(),
                _ => return Ok(()),
            };
            for element in document.select(&parsed) {
                f(ctx, element)?;
            }
            Ok(())
        });
        Ok(())
    }

    /// Calls `f` once with the value at `query` (dotted path) in JSON
    /// responses, if it resolves.
    pub fn on_json<F>(&self, query: &str, f: F)
    where
        F: Fn(&mut Context, &Value) -> SpiderResult<()> + Send + Sync + 'static,
    {
        let pointer = json_pointer(query);
        self.on_resp(move |ctx: &mut Context| {
            let document = match ctx.response() {
                Some(response) if response.is_json() => match response.json() {
                    Ok(document) => document,
                    Err(_) => return Ok(()),
                },
                _ => return Ok(()),
            };
            if let Some(value) = document.pointer(&pointer) {
                f(ctx, value)?;
            }
            Ok(())
        });
    }

    pub fn on_item<F>(&self, f: F)
    where
        F: Fn(&Context, ItemData) -> SpiderResult<Option<ItemData>> + Send + Sync + 'static,
    {
        self.inner.hooks.on_item.write().push(Arc::new(f));
    }

    pub fn on_recover<F>(&self, f: F)
    where
        F: Fn(&Context, &SpiderError) + Send + Sync + 'static,
    {
        self.inner.hooks.on_recover.write().push(Arc::new(f));
    }

    pub fn on_req_error<F>(&self, f: F)
    where
        F: Fn(&Context, &SpiderError) + Send + Sync + 'static,
    {
        self.inner.hooks.on_req_error.write().push(Arc::new(f));
    }

    pub fn on_resp_error<F>(&self, f: F)
    where
        F: Fn(&Context, &SpiderError) + Send + Sync + 'static,
    {
        self.inner.hooks.on_resp_error.write().push(Arc::new(f));
    }

    /// Starts a crawl from `request`.
    pub fn seed_task(&self, request: Request, handlers: Vec<Handler>) {
        Context::seed(self.clone()).add_task(request, handlers);
    }

    /// Waits until every submitted task and item has been processed,
    /// including the work they spawn while running.
    pub async fn wait(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        self.inner.tracker.reopen();
    }

    /// Waits until [`shutdown`](Self::shutdown) is called.
    pub async fn forever(&self) {
        self.inner.token.cancelled().await;
    }

    /// Stops the rate estimator, releases [`forever`](Self::forever) and drops
    /// tasks that have not been dispatched yet.
    pub fn shutdown(&self) {
        debug!("Shutting down spider {}", self.name());
        self.inner.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    pub(crate) fn submit(&self, origin: Context, task: Task) {
        if self.is_shutdown() {
            debug!("Dropping {}: spider is shut down", task.request);
            return;
        }
        let spider = self.clone();
        self.inner.tracker.spawn(async move {
            spider.run_task(origin, task).await;
        });
    }

    pub(crate) fn submit_item(&self, item: Item) {
        self.inner.status.add_item();
        let spider = self.clone();
        self.inner.tracker.spawn(async move {
            spider.handle_on_item(item);
        });
    }

    async fn run_task(&self, origin: Context, task: Task) {
        let filtered = AssertUnwindSafe(self.handle_on_task(&origin, task))
            .catch_unwind()
            .await;
        let task = match filtered {
            Ok(Some(task)) => task,
            Ok(None) => return,
            Err(payload) => {
                self.recover("on_task", &origin, SpiderError::from_panic(payload));
                return;
            }
        };
        drop(origin);
        self.inner.status.add_task();

        let permit = tokio::select! {
            permit = Arc::clone(&self.inner.workers).acquire_owned() => permit,
            () = self.inner.token.cancelled() => {
                debug!("Dropping {}: spider is shut down", task.request);
                return;
            }
        };
        let Ok(_permit) = permit else {
            return;
        };
        self.handle_task(task).await;
    }

    /// Runs the task chain; `None` means some hook vetoed the task.
    pub(crate) async fn handle_on_task(&self, ctx: &Context, task: Task) -> Option<Task> {
        let hooks = self.inner.hooks.on_task.read().clone();
        let mut task = task;
        for hook in &hooks {
            match hook.on_task(ctx, task).await {
                Some(next) => task = next,
                None => {
                    trace!("Task vetoed by on_task hook");
                    return None;
                }
            }
        }
        Some(task)
    }

    async fn handle_task(&self, task: Task) {
        self.inner.status.finish_task();
        let Task {
            request,
            handlers,
            meta,
            depth,
        } = task;
        let mut ctx = Context::for_task(self.clone(), request, meta, depth);

        let outcome = AssertUnwindSafe(self.process(&mut ctx, &handlers))
            .catch_unwind()
            .await;
        let err = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err,
            Err(payload) => SpiderError::from_panic(payload),
        };
        self.recover("handler", &ctx, err);
    }

    async fn process(&self, ctx: &mut Context, handlers: &[Handler]) -> SpiderResult<()> {
        let Some(request) = ctx.request().cloned() else {
            return Err(SpiderError::RequestError("task without request".to_string()));
        };

        if let Some(err) = request.error() {
            if self.logging() {
                warn!("req error: spider={} context={} error={}", self.name(), ctx, err);
            }
            self.handle_errors(&self.inner.hooks.on_req_error, ctx, &err);
            return Ok(());
        }

        match self.inner.client.fetch(request).await {
            Ok(response) => ctx.set_response(response),
            Err(err) => {
                if self.logging() {
                    warn!("resp error: spider={} context={} error={}", self.name(), ctx, err);
                }
                self.handle_errors(&self.inner.hooks.on_resp_error, ctx, &err);
                return Ok(());
            }
        }
        if self.logging() {
            debug!("Finish: spider={} context={}", self.name(), ctx);
        }

        self.handle_on_resp(ctx)?;
        if ctx.is_aborted() {
            return Ok(());
        }
        for handler in handlers {
            handler(ctx)?;
            if ctx.is_aborted() {
                break;
            }
        }
        Ok(())
    }

    fn handle_on_resp(&self, ctx: &mut Context) -> SpiderResult<()> {
        let hooks = self.inner.hooks.on_resp.read().clone();
        for hook in &hooks {
            if ctx.is_aborted() {
                break;
            }
            hook(ctx)?;
        }
        Ok(())
    }

    fn handle_on_item(&self, item: Item) {
        let Item { context, data } = item;
        let hooks = self.inner.hooks.on_item.read().clone();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> SpiderResult<()> {
            let mut data = data;
            for hook in &hooks {
                match hook(&context, data)? {
                    Some(next) => data = next,
                    None => break,
                }
            }
            Ok(())
        }));
        let err = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err,
            Err(payload) => SpiderError::from_panic(payload),
        };
        self.recover("on_item", &context, err);
    }

    /// Logs a fault caught at `stage` and hands it to the recover chain.
    fn recover(&self, stage: &str, ctx: &Context, err: SpiderError) {
        if self.logging() {
            error!(
                "{} recover from fault: spider={} context={} error={} stack={}",
                stage,
                self.name(),
                ctx,
                err,
                Backtrace::force_capture()
            );
        }
        self.handle_errors(&self.inner.hooks.on_recover, ctx, &err);
    }

    fn handle_errors(&self, chain: &parking_lot::RwLock<Vec<ErrorHook>>, ctx: &Context, err: &SpiderError) {
        let hooks = chain.read().clone();
        for hook in &hooks {
            hook(ctx, err);
        }
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
