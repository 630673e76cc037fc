mod headers;
mod method;
mod request_uri;
mod status;

pub use headers::Headers;
pub use method::{Method, METHOD_SLOTS};
pub use request_uri::RequestUri;
pub use status::Status;
