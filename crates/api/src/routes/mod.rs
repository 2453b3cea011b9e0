//! HTTP Routes

pub mod health;
pub mod lab;
