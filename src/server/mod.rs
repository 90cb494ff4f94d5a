mod admin;
mod apikeys;
mod auth;
pub mod bootstrap;
mod comments;
mod databases;
mod documents;
mod drawings;
pub mod dto;
mod favorites;
mod groups;
mod permissions;
pub mod response;
mod router;
mod spaces;
pub mod validation;
mod versions;

pub use bootstrap::bootstrap;
pub use router::{AppState, create_router};
