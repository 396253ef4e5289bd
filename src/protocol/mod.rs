//! # Relay Protocol
//!
//! Payload encoders and the session that delivers commands to the remote
//! device.
//!
//! ## Data Flow
//! ```text
//! send_command -> Encoder::encrypt -> Transport::send  -> device
//! device       -> Transport::receive -> Encoder::decrypt -> Session state -> waiters
//! ```

pub mod encoder;
pub mod session;


pub use encoder::{AesEncoder, ConfiguredEncoder, Encoder, PlainEncoder};
pub use session::{DeliveryEvent, DeliveryState, Session, SessionSnapshot};
