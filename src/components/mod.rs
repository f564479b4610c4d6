pub mod filter_bar;
pub mod help;
pub mod status_bar;
pub mod tree;
