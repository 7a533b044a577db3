//! User session lookup

mod user;

pub use user::{CurrentUser, StaticUserProvider, UserProvider};
