pub mod agent;
pub mod chunk;
pub mod mapping;
