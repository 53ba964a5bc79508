pub mod config;
pub mod evaluate;
pub mod read;
pub mod train;
