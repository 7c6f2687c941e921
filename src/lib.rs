//! Orderbox Server Library
//!
//! Verified object-store transfers and order bundle archives. The HTTP
//! binary is in main.rs; everything it serves is exposed here for tests.
//!
//! # Modules
//!
//! - `transfer`: Checksummed uploads with read-back verification
//! - `bundle`: Bounded-concurrency fetching and zip assembly
//! - `notify`: Fire-and-forget order updates
//! - `service`: The operations behind the HTTP routes

pub mod bundle;
pub mod config;
pub mod error;
pub mod notify;
pub mod routes;
pub mod service;
pub mod state;
pub mod storage;
pub mod transfer;
