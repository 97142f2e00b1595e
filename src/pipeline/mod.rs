pub mod bitmap;
pub mod command;
pub mod geometry;
pub mod loader;
pub mod session;
