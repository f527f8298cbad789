mod file_sync;
mod room_lifecycle;
mod session_router;

pub use session_router::{RouterSettings, SessionRouter, SessionRouterDependencies};
