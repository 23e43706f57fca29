pub mod files;
pub mod folders;
pub mod suggestions;
