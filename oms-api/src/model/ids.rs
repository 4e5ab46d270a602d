//! Identifiers used across the order management domain.

use crate::{string_id, uuid_id};

uuid_id!(
    /// System identity of an order.
    OrderId
);

uuid_id!(
    /// Identity of a single fill report.
    ExecutionId
);

uuid_id!(
    /// Identity of one sub-account allocation of a block order.
    AllocationId
);

string_id!(
    /// Owning tenant of an order.
    TenantId
);

string_id!(
    /// Portfolio (or sub-account) an order trades for.
    PortfolioId
);

string_id!(
    /// Tradable instrument, e.g. a ticker, CUSIP or ISIN.
    InstrumentId
);

string_id!(
    /// Client-facing order reference, unique per tenant.
    ClientOrderId
);

string_id!(
    /// User or system principal recorded in audit fields.
    UserId
);
