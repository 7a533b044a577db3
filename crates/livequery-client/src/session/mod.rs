//! Default client caching and URL resolution

pub mod controller;
pub mod url;

pub use controller::LiveQueryController;
pub use url::{resolve_server_url, validate_server_url};
