pub mod adapters;
pub mod config;
pub mod error;
pub mod triggers;
pub mod web;
