use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::core::{Context, Extension, Task};

/// Admits at most `max` tasks over the spider's lifetime. Admissions are not
/// given back when a task fails.
pub fn with_max_req_limit(max: usize) -> Extension {
    Extension::hooks(move |spider| {
        let count = Arc::new(AtomicUsize::new(0));
        spider.on_task(move |_ctx: &Context, task: Task| {
            count
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
                .ok()
                .map(|_| task)
        });
        Ok(())
    })
}
