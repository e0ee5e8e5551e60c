pub mod complexity;
pub mod file;
pub mod github;

pub use complexity::*;
pub use file::*;
pub use github::*;
