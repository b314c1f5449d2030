pub mod git;
pub mod summary;

pub use git::GitDiffSource;
pub use summary::parse_file_summaries;
