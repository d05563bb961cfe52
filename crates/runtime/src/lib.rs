pub mod event_bus;
pub mod metrics;
pub mod periodic;
pub mod slot;
pub mod task;

pub use event_bus::*;
pub use metrics::*;
pub use periodic::*;
pub use slot::*;
pub use task::*;
