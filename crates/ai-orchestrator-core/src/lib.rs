//! Core infrastructure shared by every orchestrator crate:
//! - Event system for observability (`events`)
//! - Key-value abstraction backing quota, rate-limit, and L2 cache (`kv`)
//! - Clock and bucket-key helpers (`clock`)

pub mod clock;
pub mod error;
pub mod events;
pub mod kv;

pub use clock::{bucket_key, new_request_id, seconds_until_next_bucket, BucketGranularity, Clock, FakeClock, SystemClock};
pub use error::KvError;
pub use events::{EventListener, EventListeners, FnListener, OrchestratorEvent};
pub use kv::{FakeKeyValueStore, KeyValueStore};
