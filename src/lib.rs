pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod tenancy;
