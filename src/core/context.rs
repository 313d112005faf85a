use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::hooks::Handler;
use super::Spider;
use crate::{Request, Response, SpiderError};

pub type Meta = HashMap<String, Value>;

/// A pending unit of work: a request and the handlers to run on its response.
#[derive(Clone)]
pub struct Task {
    pub request: Request,
    pub handlers: Vec<Handler>,
    pub meta: Meta,
    /// Crawl depth, stamped by the depth-limit extension.
    pub depth: Option<usize>,
}

impl Task {
    pub fn new(request: Request, meta: Meta, handlers: Vec<Handler>) -> Self {
        Self {
            request,
            handlers,
            meta,
            depth: None,
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("request", &self.request)
            .field("handlers", &self.handlers.len())
            .field("meta", &self.meta)
            .field("depth", &self.depth)
            .finish()
    }
}

/// One CSV record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CsvItem(pub Vec<String>);

impl CsvItem {
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for CsvItem {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        CsvItem(iter.into_iter().map(Into::into).collect())
    }
}

/// The payload of an item.
#[derive(Debug)]
pub enum ItemData {
    Record(Value),
    Row(CsvItem),
    /// A soft failure reported through the item channel.
    Error(SpiderError),
}

impl From<Value> for ItemData {
    fn from(value: Value) -> Self {
        ItemData::Record(value)
    }
}

impl From<CsvItem> for ItemData {
    fn from(row: CsvItem) -> Self {
        ItemData::Row(row)
    }
}

impl From<SpiderError> for ItemData {
    fn from(err: SpiderError) -> Self {
        ItemData::Error(err)
    }
}

#[derive(Debug)]
pub struct Item {
    pub context: Context,
    pub data: ItemData,
}

/// The execution record of one task. Handlers receive it mutably; items and
/// child tasks capture a snapshot of it.
#[derive(Clone)]
pub struct Context {
    id: Uuid,
    spider: Spider,
    request: Option<Request>,
    response: Option<Arc<Response>>,
    meta: Meta,
    depth: Option<usize>,
    aborted: bool,
}

impl Context {
    /// The context new crawls originate from: no request, no depth.
    pub(crate) fn seed(spider: Spider) -> Self {
        Self {
            id: Uuid::now_v7(),
            spider,
            request: None,
            response: None,
            meta: Meta::new(),
            depth: None,
            aborted: false,
        }
    }

    pub(crate) fn for_task(spider: Spider, request: Request, meta: Meta, depth: Option<usize>) -> Self {
        Self {
            id: Uuid::now_v7(),
            spider,
            request: Some(request),
            response: None,
            meta,
            depth,
            aborted: false,
        }
    }

    pub(crate) fn set_response(&mut self, response: Response) {
        self.response = Some(Arc::new(response));
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn spider(&self) -> &Spider {
        &self.spider
    }

    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_deref()
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    pub fn depth(&self) -> Option<usize> {
        self.depth
    }

    /// Stops the remaining handlers of the current chain for this task.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Submits a new task originating from this context.
    pub fn add_task(&self, request: Request, handlers: Vec<Handler>) {
        self.add_task_with_meta(request, Meta::new(), handlers);
    }

    pub fn add_task_with_meta(&self, request: Request, meta: Meta, handlers: Vec<Handler>) {
        self.spider
            .submit(self.clone(), Task::new(request, meta, handlers));
    }

    /// Emits an item through the item chain.
    pub fn add_item(&self, data: impl Into<ItemData>) {
        self.spider.submit_item(Item {
            context: self.clone(),
            data: data.into(),
        });
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context{{id={}", self.id)?;
        match &self.request {
            Some(request) => write!(f, " request=\"{}\"", request)?,
            None => write!(f, " request=seed")?,
        }
        if let Some(response) = &self.response {
            write!(f, " status={}", response.status)?;
        }
        if let Some(depth) = self.depth {
            write!(f, " depth={}", depth)?;
        }
        if !self.meta.is_empty() {
            let meta = serde_json::to_string(&self.meta).unwrap_or_default();
            write!(f, " meta={}", meta)?;
        }
        write!(f, " aborted={}}}", self.aborted)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
