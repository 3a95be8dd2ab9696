//! Transfer source: block explorer client and its shared rate limiter

pub mod client;
pub mod rate_limit;

pub use client::{parse_block_number, parse_transfer_page, ExplorerClient, ExplorerResponse};
pub use rate_limit::RateLimiter;
