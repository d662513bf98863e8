mod error;
mod handlers;
mod helpers;
mod router;
mod types;

pub use handlers::attendance::sweep_tick;
pub use router::handle_request;
pub use types::{AppState, Request};
