pub mod generation;
pub mod preview;
pub mod submission_ctx;
pub mod submission_router;

pub use generation::{GeneratedForm, Generation, GenerationReport};
pub use preview::Preview;
pub use submission_ctx::SubmissionCtx;
pub use submission_router::{RouteOutcome, SubmissionRouter};
