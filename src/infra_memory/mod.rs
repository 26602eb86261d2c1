//! In-process stores. Used by the `memory` backends and by tests.

mod refresh_token_store_memory;
mod user_store_memory;

pub use refresh_token_store_memory::*;
pub use user_store_memory::*;
