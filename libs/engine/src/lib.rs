pub mod args;
pub mod distributor;
pub mod engine;
pub mod job;
pub mod progress;
pub mod tracker;
pub mod sink {
    pub mod rows;
}
