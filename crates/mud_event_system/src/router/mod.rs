//! Event router - split into construction/lifecycle, subscription, emission
//! and statistics.

mod core;
mod emitters;
mod handlers;
mod stats;
mod tests;

pub use self::core::EventRouter;
pub use handlers::EventHandler;
pub use stats::RouterStats;
