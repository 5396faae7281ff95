pub mod error;
pub mod ids;
pub mod payload;
pub mod record;

pub use error::{Error, Result};
pub use ids::{Address, Uid};
pub use payload::CoffeeSourcingPayload;
pub use record::AttestationRecord;
