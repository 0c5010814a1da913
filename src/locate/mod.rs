//! Locating elements from natural-language queries

pub mod query;
pub mod resolver;
pub mod scorer;

pub use query::extract_query;
pub use resolver::{find_best, find_best_with_retry, resolve, Locator, RetryPolicy};
pub use scorer::{rank, score, ScoredCandidate};
