//! # TeamDesk API Server Library
//!
//! HTTP layer of TeamDesk: form endpoints returning JSON page models, cookie
//! sessions and the admin panel.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers and session extractors
//! - `routes`: Route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
