//! Scheduled background tasks
//!
//! Currently one task: periodic broker session renewal.

mod session_refresh;

pub use session_refresh::spawn_session_refresher;
