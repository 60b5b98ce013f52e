pub mod handle;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod tcp;
pub mod ws;

pub use handle::{ServerHandle, ServerStatus};
pub use registry::{Connection, ConnectionId, ConnectionRegistry};
pub use session::{LanguagePair, SessionState, SharedDefaults};
