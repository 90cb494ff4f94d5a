mod models;
mod props;
mod role;

pub use models::*;
pub use props::*;
pub use role::*;
