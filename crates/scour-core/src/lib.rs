pub mod errors;
pub mod filter;
pub mod model;
pub mod query;
pub mod timeframe;

pub use errors::*;
pub use filter::*;
pub use model::*;
pub use query::*;
pub use timeframe::*;
