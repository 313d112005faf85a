use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use super::context::{Context, ItemData, Task};
use super::Spider;
use crate::scrapers::Middleware;
use crate::{SpiderError, SpiderResult};

/// A response handler. Returning an error abandons the task and routes the
/// error to the recover hooks.
pub type Handler = Arc<dyn Fn(&mut Context) -> SpiderResult<()> + Send + Sync>;

pub type ItemHook = Arc<dyn Fn(&Context, ItemData) -> SpiderResult<Option<ItemData>> + Send + Sync>;

pub type ErrorHook = Arc<dyn Fn(&Context, &SpiderError) + Send + Sync>;

/// Wraps a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut Context) -> SpiderResult<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A pre-dispatch filter. `ctx` is the context the task originates from;
/// returning `None` vetoes the task.
#[async_trait]
pub trait TaskHook: Send + Sync {
    async fn on_task(&self, ctx: &Context, task: Task) -> Option<Task>;
}

#[async_trait]
impl<F> TaskHook for F
where
    F: Fn(&Context, Task) -> Option<Task> + Send + Sync,
{
    async fn on_task(&self, ctx: &Context, task: Task) -> Option<Task> {
        self(ctx, task)
    }
}

/// Something that can be attached to a spider with
/// [`Spider::use_extensions`](super::Spider::use_extensions).
pub enum Extension {
    /// Registers closures into the spider's hook chains.
    Hooks(Box<dyn FnOnce(&Spider) -> SpiderResult<()> + Send>),
    /// Appended to the spider's client.
    Middleware(Arc<dyn Middleware>),
}

impl Extension {
    pub fn hooks<F>(f: F) -> Self
    where
        F: FnOnce(&Spider) -> SpiderResult<()> + Send + 'static,
    {
        Extension::Hooks(Box::new(f))
    }

    pub fn middleware(middleware: impl Middleware + 'static) -> Self {
        Extension::Middleware(Arc::new(middleware))
    }
}

/// The six hook chains. Append-only; each dispatch works on a snapshot.
#[derive(Default)]
pub(crate) struct Hooks {
    pub on_task: RwLock<Vec<Arc<dyn TaskHook>>>,
    pub on_resp: RwLock<Vec<Handler>>,
    pub on_item: RwLock<Vec<ItemHook>>,
    pub on_recover: RwLock<Vec<ErrorHook>>,
    pub on_req_error: RwLock<Vec<ErrorHook>>,
    pub on_resp_error: RwLock<Vec<ErrorHook>>,
}
