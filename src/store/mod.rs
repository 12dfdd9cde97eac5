//! Session store - persistent workflow state keyed by session name

mod schema;
mod store;

pub use store::{SessionStore, SessionSummary};
