pub mod file;
pub mod folder;
pub mod job;
pub mod suggestion;

pub use file::{FileCategory, FileFilter, FileRecord, FileStatus, NewFile};
pub use folder::{DuplicateGroup, Folder, NewFolder};
pub use job::{Job, OrganizeStrategy, Stage};
pub use suggestion::{NewSuggestion, Suggestion, SuggestionFilter, SuggestionKind, SuggestionStatus};
