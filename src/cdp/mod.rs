mod client;
mod error;
mod transport;
mod types;

pub use client::{CdpConfig, CdpSession};
pub use error::CdpError;
pub use transport::{NetworkRequestEntry, RingEvent};
pub use types::CdpEvent;
