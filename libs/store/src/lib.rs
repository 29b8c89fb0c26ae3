pub mod adapter;
pub mod client;
pub mod error;
pub mod facade;
pub mod model;
pub mod pretty;
pub mod store;
pub mod tier;
pub mod utils;
pub mod cache {
    pub mod keys;
    pub mod memory;
    pub mod redis_store;
}
