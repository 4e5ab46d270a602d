use super::ingress::OrderCommand;
use crate::engine::OrderManager;
use crate::error::{ErrorKind, OmsError};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandError {
    pub kind: ErrorKind,
    pub message: String,
    /// Validation details or blocking flags, when the error carries them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<&OmsError> for CommandError {
    fn from(e: &OmsError) -> Self {
        let details = match e {
            OmsError::Validation(report) => serde_json::to_value(report).ok(),
            OmsError::ComplianceBlocked { flags, .. } => serde_json::to_value(flags).ok(),
            _ => None,
        };
        Self {
            kind: e.kind(),
            message: e.to_string(),
            details,
        }
    }
}

/// One output line per input command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub request_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandError>,
}

impl CommandResponse {
    pub fn ok(request_id: String, result: Value) -> Self {
        Self {
            request_id,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(request_id: String, error: CommandError) -> Self {
        Self {
            request_id,
            ok: false,
            result: None,
            error: Some(error),
        }
    }
}

/// Runs `command` against the manager and renders the outcome.
pub fn execute(manager: &OrderManager, request_id: String, command: OrderCommand) -> CommandResponse {
    let outcome = match command {
        OrderCommand::Create(request) => manager.create_order(request).map(to_json),
        OrderCommand::Validate(request) => manager.validate_order(&request).map(to_json),
        OrderCommand::Modify { order_id, request } => {
            manager.modify_order(order_id, request).map(to_json)
        }
        OrderCommand::Cancel { order_id, request } => {
            manager.cancel_order(order_id, request).map(to_json)
        }
        OrderCommand::Execution(report) => manager.record_execution(report).map(to_json),
        OrderCommand::VenueUpdate { order_id, update } => {
            manager.apply_venue_update(order_id, update).map(to_json)
        }
        OrderCommand::Get { order_id } => manager.get_order_by_id(order_id).map(to_json),
        OrderCommand::GetByClientId {
            tenant_id,
            client_order_id,
        } => manager
            .get_order_by_client_id(&tenant_id, &client_order_id)
            .map(to_json),
        OrderCommand::Search(query) => manager.search_orders(&query).map(to_json),
        OrderCommand::BestExecution { order_id } => {
            manager.generate_best_execution_report(order_id).map(to_json)
        }
        OrderCommand::Executions { order_id } => manager.executions_for(order_id).map(to_json),
        OrderCommand::Allocations { order_id } => manager.allocations_for(order_id).map(to_json),
    };

    match outcome {
        Ok(Ok(value)) => CommandResponse::ok(request_id, value),
        Ok(Err(e)) => CommandResponse::failed(
            request_id,
            CommandError {
                kind: ErrorKind::Internal,
                message: format!("failed to encode result: {}", e),
                details: None,
            },
        ),
        Err(e) => CommandResponse::failed(request_id, CommandError::from(&e)),
    }
}

fn to_json<T: Serialize>(value: T) -> serde_json::Result<Value> {
    serde_json::to_value(value)
}
