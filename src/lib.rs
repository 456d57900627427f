pub mod cli;
pub mod collect;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod serve;
pub mod show;
pub mod store;

pub use error::{PulseError, Result};
pub use reconcile::{reconcile, reconcile_value};
