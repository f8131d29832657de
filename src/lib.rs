//! newsmux merges a trending-stories API and a set of RSS/Atom subscriptions
//! into one deduplicated, time-ordered feed served over HTTP.
//!
//! - [`trending`] and [`feed`] talk to the upstream sources
//! - [`storage`] persists stories, subscriptions and feed items in SQLite
//! - [`cache`] remembers recent query results for a short TTL
//! - [`ingest`] reconciles sources, store and cache per source
//! - [`aggregate`] builds the combined view
//! - [`registry`] manages subscriptions, imports and folders
//! - [`server`] exposes all of it through axum

pub mod aggregate;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod http;
pub mod ingest;
pub mod registry;
pub mod server;
pub mod state;
pub mod storage;
pub mod trending;
pub mod util;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
