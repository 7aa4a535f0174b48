pub mod ai;
pub mod card;
pub mod file;
pub mod folder;
pub mod user;

pub use ai::*;
pub use card::*;
pub use file::*;
pub use folder::*;
pub use user::*;
