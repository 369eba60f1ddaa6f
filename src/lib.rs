//! Resilient acquisition of remote classified-ads data: endpoint
//! descriptors, a retrying and cancellable fetch client, a two-tier
//! read-through cache and a repository with filtered and sorted views.

pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod listings;
pub mod query;
