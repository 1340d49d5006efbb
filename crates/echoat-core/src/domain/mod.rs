//! Domain model (task keys, tasks, submissions, errors).

pub mod errors;
pub mod ids;
pub mod submission;
pub mod task;

pub use self::errors::{ErrorKind, SinkError, StoreError, SubmitError, ValidationError};
pub use self::ids::{KeyParseError, TaskKey};
pub use self::submission::{AcceptedSubmission, RawTime, Submission};
pub use self::task::Task;
