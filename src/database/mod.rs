pub mod bootstrap;
pub mod manager;
