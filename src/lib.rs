//! Daily Digest - A personalised RSS digest service
//!
//! This crate fetches articles from a user's chosen publications and custom
//! feeds, picks a random selection up to their daily limit, and caches that
//! selection for the rest of the day.

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod normalizer;
pub mod preferences;
pub mod registry;
pub mod routes;
pub mod service;
