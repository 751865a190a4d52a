mod queries;
mod session;
mod view;
mod workflow;

// Public API of the progress subsystem.
pub use crate::error::FlowError;
pub use session::CourseSession;
pub use view::ProgressView;
pub use workflow::{LectureFlowService, LectureOutcome, LectureSignal};
