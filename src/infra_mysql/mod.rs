mod refresh_token_store_mysql;
mod user_store_mysql;

pub use refresh_token_store_mysql::*;
pub use user_store_mysql::*;

mod util;
