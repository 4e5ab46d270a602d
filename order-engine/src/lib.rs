//! Order management core: validation, pre-trade compliance, the order
//! lifecycle, fills, block allocations and best-execution analysis.

pub mod allocation;
pub mod best_execution;
pub mod compliance;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod execution;
pub mod io;
pub mod reference;
pub mod store;
pub mod validator;

pub use config::EngineConfig;
pub use engine::{Collaborators, OrderManager};
pub use error::{ErrorKind, OmsError, Result};
