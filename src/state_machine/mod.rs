mod session;
mod stage;

pub use session::{FailureKind, Session, SessionToken};
pub use stage::{Event, InvalidTransition, Stage, StateMachine};
