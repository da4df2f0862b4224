//! # Realtime Hub
//!
//! A single-process, single-threaded cooperative fan-out hub. One
//! [`Hub`] per process owns every subscription and mutates its map only
//! from its own `run` loop; all external interaction happens through a
//! cheaply-cloneable [`HubHandle`] over channels, so the map itself never
//! needs a lock.
//!
//! Subscribers carry only their own [`subscription::SubscriberId`] — the
//! hub is the sole owner of the registry they're an index into, which is
//! how this workspace expresses the source's Hub<->Client cyclic
//! references as plain values instead.

pub mod error;
pub mod hub;
pub mod metrics;
pub mod subscription;

pub use error::{HubError, HubResult};
pub use hub::{Hub, HubConfig, HubHandle};
pub use metrics::HubMetrics;
pub use subscription::{OutboundMessage, SubjectFilter, SubscriberId, Subscription};
