pub(crate) mod request;
pub(crate) mod response;

pub use request::Request;
pub use response::{json_pointer, Response, ResponseType};
