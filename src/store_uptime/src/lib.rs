//! Store uptime/downtime estimation and report job orchestration.
//!
//! Stores are polled sporadically; each poll says whether the store was `active` or
//! `inactive` at an instant. The [`engine`] turns those samples into step-function
//! intervals, clips them to each store's local business hours, and sums uptime and
//! downtime over the trailing hour, day and week. The [`service`] runs that computation
//! as an asynchronous report job whose status and output can be polled by id.

#![deny(missing_docs)]

pub mod aggregate;
pub mod business_hours;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod job;
pub mod models;
#[allow(missing_docs)]
pub mod schema;
pub mod service;
pub mod sink;
pub mod source;
pub mod status;
pub mod timeline;
pub mod tz;
pub mod window;
