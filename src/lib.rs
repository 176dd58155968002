pub mod amount;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod source;
