//! HTTP route handlers

pub mod extract;
pub mod health;
pub mod models;
