//! Full Scan - a quota-budgeted, resumable scan of GitHub's user id space.
//!
//! This library provides the scan driver, its durable cursor and record
//! stores, the GitHub source, and the HTTP control surface.

pub mod config;
pub mod github;
pub mod persistence;
pub mod scan;
pub mod server;
pub mod source;
pub mod types;

#[cfg(test)]
mod test_utils;
