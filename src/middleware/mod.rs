pub mod auth;
pub mod require_admin;
pub mod response;
