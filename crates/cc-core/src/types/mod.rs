pub mod enums;
pub mod ids;
pub mod io;
pub mod session;

pub use enums::{DiffSide, FileStatus, ReviewStatus};
pub use ids::{CommentId, IdError, SessionId};
pub use io::{Reply, ReviewResult};
pub use session::{Comment, CommentAnchor, FileSummary, Session};
