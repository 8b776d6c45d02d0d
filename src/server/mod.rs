pub mod builder;
pub mod handler;

pub use builder::{Server, ServerBuilder};
pub use handler::{HealthRouter, REQUEST_ID_HEADER};
