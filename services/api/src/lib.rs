//! Study Planning API Library Crate
//!
//! This library contains all the core logic for the study planning web service,
//! including the application state, document storage, API handlers and routing.
//! The `api` binary is a thin wrapper around this library.

pub mod auth;
pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod planning;
pub mod router;
pub mod state;
