//! CLI command implementations

pub mod cache;
pub mod check;
pub mod completions;
pub mod config;
pub mod resolve;
pub mod serve;

pub use cache::execute as cache;
pub use check::execute as check;
pub use completions::execute as completions;
pub use config::execute as config;
pub use resolve::execute as resolve;
pub use serve::execute as serve;
