mod cookie;
mod error;
mod handler;
mod router;

pub use cookie::RefreshCookie;
pub use error::recover_error;
pub use handler::ApiConfig;
pub use router::routes;
