pub mod driver;
pub mod state;

pub use driver::PipelineDriver;
pub use state::{StateError, StateStore};
