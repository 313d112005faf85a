mod config;
mod context;
mod errors;
mod hooks;
mod spider;

pub use config::SpiderConfig;
pub use context::{Context, CsvItem, Item, ItemData, Meta, Task};
pub use errors::{SpiderError, SpiderResult};
pub use hooks::{handler, ErrorHook, Extension, Handler, ItemHook, TaskHook};
pub use spider::Spider;
