mod refresh_token_store;
mod user_store;

pub use refresh_token_store::*;
pub use user_store::*;
