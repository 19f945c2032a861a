#![forbid(unsafe_code)]

pub mod app;
pub mod artifact;
pub mod auth;
pub mod checker;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod error;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod policy;
pub mod project;
pub mod runtime;
pub mod security;
pub mod upstream;
