pub mod members;
pub mod service;
