pub mod ai;
pub mod auth;
pub mod card;
pub mod file;
pub mod folder;
pub mod user;
