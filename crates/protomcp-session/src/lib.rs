//! Request correlator, session state machine, dispatcher, progress/
//! cancellation plane, and the `Session` itself that ties them to a
//! concrete transport.

pub mod context;
pub mod correlator;
pub mod dispatcher;
pub mod session;
pub mod state;

pub use context::{Cancellation, PeerFacilities, RequestContext};
pub use correlator::{Completion, Correlator, ProgressReceiver, Waiter};
pub use dispatcher::{Dispatcher, NotificationListener, RequestHandler};
pub use session::{PendingCall, Session, SessionConfig};
pub use state::{SessionState, StateMachine};
