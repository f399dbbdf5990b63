//! By-name type resolution.
//!
//! [`TypeFetcher`] looks a name up in the locking model first, then in a
//! short-lived cache, and finally asks whoever sits on the other end of a
//! [`TypeBus`]. [`ChannelBus`] is an in-process bus for embedders that do not
//! talk to a network.

mod bus;
mod cache;
mod channel;
mod error;
mod fetcher;
mod wire;

pub use bus::TypeBus;
pub use channel::{BusMessage, ChannelBus, Responder};
pub use error::FetchError;
pub use fetcher::TypeFetcher;
pub use wire::{ExecutorQuery, ExecutorReply, FetchRequest, FetchResponse, RequestId};
