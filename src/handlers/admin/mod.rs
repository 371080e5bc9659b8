pub mod data;
pub mod principals;
pub mod stats;
