//! NotWP - a self-hosted content management server
//!
//! Blog posts, block-built pages, documentation and a newsletter, served as
//! a JSON API and a server-rendered public site from one binary.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod server;
pub mod services;
pub mod theme;
