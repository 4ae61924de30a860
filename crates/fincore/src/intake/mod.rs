//! Request intake: sessions, the state machine and its collaborator seams

pub mod error;
pub mod machine;
pub mod session;
pub mod traits;

pub use error::{Entity, IntakeError, IntakeResult};
pub use machine::{Cancelled, IntakeMachine, Outcome, Progress};
pub use session::{InMemorySessionStore, IntakeStep, KeyedLocks, Session, SessionStore};
pub use traits::{RoleDirectory, TemplateCatalog, TicketRepository};
