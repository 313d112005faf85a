use crate::core::{Context, Extension, Task};

/// Limits how far a crawl follows links. A task added from a context of depth
/// `d` gets depth `d + 1`; tasks originating from the seed get depth 1.
/// Tasks that would exceed `max` are vetoed.
pub fn with_depth_limit(max: usize) -> Extension {
    Extension::hooks(move |spider| {
        spider.on_task(move |ctx: &Context, task: Task| match ctx.depth() {
            None => Some(task.with_depth(1)),
            Some(depth) if depth < max => Some(task.with_depth(depth + 1)),
            Some(_) => None,
        });
        Ok(())
    })
}
