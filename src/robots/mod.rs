//! Robots.txt handling module
//!
//! Fetching, parsing and per-session caching of robots.txt rules.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache, RobotsCheck};
pub use parser::{product_token, ParsedRobots};
