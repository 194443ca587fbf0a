pub mod router;
pub mod status;
pub mod handoff;
pub mod state;
pub mod websocket;
pub mod routes;

pub use router::{PendingResult, ResultRouter};
pub use status::{StatusBuffer, StatusReply, NO_STATUS_AVAILABLE};
pub use handoff::{BackgroundConsumers, JsonHandoff};
pub use state::GatewayState;
pub use websocket::{handle_turn, run_session, ClientConnection, TurnOutcome};
