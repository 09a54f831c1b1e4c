pub mod errors;
pub mod field_cache;
pub mod field_state;
pub mod rate_limit;
pub mod session;
pub mod traits;

pub use errors::*;
pub use field_cache::FieldCache;
pub use field_state::FieldState;
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use session::SearchSession;
pub use traits::*;
