pub mod enrollment_store;
pub mod session;

pub use enrollment_store::{EnrollOutcome, EnrollmentStore, SqliteEnrollmentStore};
pub use session::{Session, SessionStore};
