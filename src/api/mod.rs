pub mod data_engine_handlers;
pub mod exception_handler;
pub mod information_view_handlers;
pub mod instance;
pub mod request_body;
pub mod routes;

pub use exception_handler::{error_reply, ErrorReply};
pub use instance::ServerInstance;
pub use request_body::RequestJson;
pub use routes::*;
