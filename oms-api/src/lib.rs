pub mod macros;
pub mod model;
pub mod traits;

pub use model::allocation::{AllocationMethod, AllocationRequest, AllocationStatus, OrderAllocation};
pub use model::compliance::{
    ComplianceCheckResult, ComplianceFlag, ComplianceFlagType, ConcentrationVerdict, Severity,
};
pub use model::events::{OrderEvent, OrderEventKind};
pub use model::execution::{OrderExecution, SettlementStatus, VenueType};
pub use model::ids::{
    AllocationId, ClientOrderId, ExecutionId, InstrumentId, OrderId, PortfolioId, TenantId,
    UserId,
};
pub use model::market_data::MarketBar;
pub use model::order::{
    Amendment, Order, OrderSide, OrderState, OrderStatus, OrderType, RiskLimits, TimeInForce,
};
pub use model::query::OrderQuery;
pub use model::reference::{InstrumentSnapshot, PortfolioSnapshot};
pub use model::request::{
    CancelOrderRequest, CreateOrderRequest, ExecutionReport, ModifyOrderRequest, VenueUpdate,
};
pub use model::risk::{LiquidityTier, RiskBreach, RiskBreachType};
pub use traits::collaborators::{
    CollaboratorError, ComplianceProvider, EventPublisher, InstrumentLookup, MarketDataProvider,
    PortfolioLookup,
};
pub use traits::repository::{
    AllocationRepository, ExecutionRepository, OrderRepository, RepositoryError,
};
