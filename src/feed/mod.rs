// src/feed/mod.rs
//! Remote feed snapshots: the adapter traits and the bilibili implementation.

pub mod bilibili;
pub mod types;

pub use bilibili::BiliClient;
pub use types::{FeedAdapter, ItemLookup};
