pub mod config;
pub mod error;
pub mod merge;
pub mod stream;
pub mod tool;
pub mod turn;
