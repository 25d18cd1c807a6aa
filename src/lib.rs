//! Yatube - a small blogging community
//!
//! Users publish posts (optionally with an image and a group), comment on
//! each other's posts and follow authors to get a personal feed. The same
//! data is served as server-rendered pages and as a JWT-protected REST API.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod theme;
pub mod web;
