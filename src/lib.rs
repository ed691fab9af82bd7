pub mod config;
pub mod logger;
pub mod nodes;
pub mod schema;

pub use custom_node;
