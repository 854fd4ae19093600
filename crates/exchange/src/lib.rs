pub mod error;
pub mod remote;
pub mod traits;

pub use error::BybitError;
pub use remote::BybitClient;
pub use traits::TradingApi;
