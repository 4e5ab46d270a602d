use crate::reference::ReferenceData;
use oms::{
    CancelOrderRequest, ClientOrderId, CollaboratorError, CreateOrderRequest, ExecutionReport,
    InstrumentId, InstrumentSnapshot, MarketBar, ModifyOrderRequest, OrderId, OrderQuery,
    PortfolioSnapshot, TenantId, VenueUpdate,
};
use serde::{Deserialize, Serialize};

/// An operation on the order core, carried by [`IngressMessage::Command`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderCommand {
    Create(CreateOrderRequest),
    Validate(CreateOrderRequest),
    Modify {
        order_id: OrderId,
        #[serde(default)]
        request: ModifyOrderRequest,
    },
    Cancel {
        order_id: OrderId,
        #[serde(default)]
        request: CancelOrderRequest,
    },
    Execution(ExecutionReport),
    VenueUpdate {
        order_id: OrderId,
        update: VenueUpdate,
    },
    Get {
        order_id: OrderId,
    },
    GetByClientId {
        tenant_id: TenantId,
        client_order_id: ClientOrderId,
    },
    Search(OrderQuery),
    BestExecution {
        order_id: OrderId,
    },
    Executions {
        order_id: OrderId,
    },
    Allocations {
        order_id: OrderId,
    },
}

impl OrderCommand {
    /// Commands with the same key are applied in the order they were received.
    pub fn shard_key(&self) -> String {
        match self {
            OrderCommand::Create(request) | OrderCommand::Validate(request) => request
                .client_order_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| request.portfolio_id.to_string()),
            OrderCommand::Execution(report) => report.order_id.to_string(),
            OrderCommand::Modify { order_id, .. }
            | OrderCommand::Cancel { order_id, .. }
            | OrderCommand::VenueUpdate { order_id, .. }
            | OrderCommand::Get { order_id }
            | OrderCommand::BestExecution { order_id }
            | OrderCommand::Executions { order_id }
            | OrderCommand::Allocations { order_id } => order_id.to_string(),
            OrderCommand::GetByClientId {
                client_order_id, ..
            } => client_order_id.to_string(),
            OrderCommand::Search(query) => query.tenant_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IngressMessage {
    Portfolio(PortfolioSnapshot),
    Instrument(InstrumentSnapshot),
    Restricted {
        tenant_id: TenantId,
        instrument_id: InstrumentId,
    },
    MarketData(Vec<MarketBar>),
    Command {
        request_id: String,
        command: OrderCommand,
    },
}

/// Applies a reference-data message. Commands are left to the dispatcher.
///
/// # Returns
///
/// * `Ok(Some(..))` - The message was a command and is handed back.
pub fn apply_reference_update(
    reference: &ReferenceData,
    message: IngressMessage,
) -> Result<Option<(String, OrderCommand)>, CollaboratorError> {
    match message {
        IngressMessage::Portfolio(portfolio) => reference.upsert_portfolio(portfolio)?,
        IngressMessage::Instrument(instrument) => reference.upsert_instrument(instrument)?,
        IngressMessage::Restricted {
            tenant_id,
            instrument_id,
        } => reference.restrict(tenant_id, instrument_id)?,
        IngressMessage::MarketData(bars) => reference.add_bars(bars)?,
        IngressMessage::Command {
            request_id,
            command,
        } => return Ok(Some((request_id, command))),
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oms::{InstrumentLookup, OrderType};

    #[test]
    fn parses_command_lines() {
        let line = r#"{"Command":{"request_id":"r-1","command":{"Create":{
            "tenant_id":"T1","portfolio_id":"PF-1","instrument_id":"AAPL",
            "order_type":"LIMIT","side":"BUY","quantity":"100","limit_price":"49.5"}}}}"#;
        let message: IngressMessage = serde_json::from_str(line).unwrap();
        let IngressMessage::Command { request_id, command } = message else {
            panic!("not a command");
        };
        assert_eq!(request_id, "r-1");
        let OrderCommand::Create(request) = &command else {
            panic!("not a create");
        };
        assert_eq!(request.order_type, OrderType::Limit);
        assert_eq!(command.shard_key(), "PF-1");
    }

    #[test]
    fn reference_updates_are_applied() {
        let reference = ReferenceData::new();
        let line = r#"{"Instrument":{"id":"AAPL","last_price":"50","liquidity_tier":"HIGH","volatility":0.2}}"#;
        let message: IngressMessage = serde_json::from_str(line).unwrap();

        assert!(apply_reference_update(&reference, message).unwrap().is_none());
        let instrument = reference
            .instrument(&InstrumentId::new("AAPL"), &TenantId::new("T1"))
            .unwrap()
            .unwrap();
        assert!(instrument.is_active);
    }

    #[test]
    fn fills_are_keyed_by_order() {
        let id = OrderId::new();
        let command = OrderCommand::Cancel {
            order_id: id,
            request: CancelOrderRequest::default(),
        };
        assert_eq!(command.shard_key(), id.to_string());
    }
}
