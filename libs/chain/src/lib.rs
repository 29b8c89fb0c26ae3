pub mod error;
pub mod model;
pub mod rpc;
pub mod scanner;
pub mod upstream;
