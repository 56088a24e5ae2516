//! Rate-bounded JSON fetching
//!
//! Every request of a run goes through one [`FetchClient`], so a single
//! semaphore bounds the in-flight requests across all mailboxes, folders
//! and pages.

mod client;

pub use client::{FetchClient, RetryPolicy};
