pub mod args;
pub mod command;
pub mod dispatcher;
pub mod gateway;
pub mod ingress;
pub mod sink;

pub use args::Args;
pub use command::{execute, CommandError, CommandResponse};
pub use dispatcher::Dispatcher;
pub use gateway::{Gateway, JsonLinesGateway};
pub use ingress::{apply_reference_update, IngressMessage, OrderCommand};
pub use sink::spawn_response_writer;
