//! The review round as one call: capture the diff, resolve the session, then
//! either close the round immediately or hand it to a reviewer.

pub mod assets;
pub mod browser;
pub mod error;
pub mod workflow;

pub use browser::{BrowserLauncher, SystemBrowser};
pub use error::WorkflowError;
pub use workflow::{ReviewOptions, ReviewOutcome, Workflow};
