//! Built-in extensions. Each function returns an [`Extension`](crate::Extension)
//! that registers its hooks when passed to
//! [`Spider::use_extensions`](crate::Spider::use_extensions).

mod csv_saver;
mod dedup;
mod depth;
mod error_log;
mod max_requests;
mod robots;

pub use csv_saver::with_csv_item_saver;
pub use dedup::with_deduplicate;
pub use depth::with_depth_limit;
pub use error_log::with_error_log;
pub use max_requests::with_max_req_limit;
pub use robots::{with_robots_txt, RobotsTxt};
