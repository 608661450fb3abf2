//! HTTP request handlers.

pub mod containers;
pub mod health;
pub mod images;
