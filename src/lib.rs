pub mod catalog;
pub mod error;
pub mod handler;
pub mod model;
pub mod registry;
pub mod scoring;
pub mod server;
pub mod store;
