pub mod ai;
pub mod auth;
pub mod card;
pub mod file;
pub mod folder;
pub mod user;

pub use ai::{ChatPdfClient, GeminiClient};
pub use auth::AuthService;
pub use card::CardService;
pub use file::FileService;
pub use folder::FolderService;
pub use user::UserService;
