pub mod agent;
pub mod error;
pub mod message;
pub mod task;

pub use agent::*;
pub use error::*;
pub use message::*;
pub use task::*;
