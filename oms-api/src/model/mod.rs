pub mod allocation;
pub mod compliance;
pub mod events;
pub mod execution;
pub mod ids;
pub mod market_data;
pub mod order;
pub mod query;
pub mod reference;
pub mod request;
pub mod risk;
