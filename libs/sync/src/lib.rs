pub mod batch;
pub mod consumer;
pub mod producer;
pub mod sink;
