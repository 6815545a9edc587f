pub mod executor;
pub mod model;

pub use executor::Executor;
pub use model::{Config, Pipeline, Start, Step, ValidationError};
