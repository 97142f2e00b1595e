pub mod images;
pub mod point;
pub mod registry;
pub mod schema;
pub mod service;
