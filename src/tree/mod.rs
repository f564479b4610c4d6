pub mod filter;
pub mod flat;
pub mod loader;
pub mod node;
pub mod select;
