//! registrar-health — status probing and per-instance health polling.
//!
//! # Architecture
//!
//! ```text
//! HealthPoller (one task per registered instance)
//!   ├── ticker (default 30s, `check_interval` attribute)
//!   ├── StatusProbe::probe() → UP / DOWN
//!   └── StatusCallback on change → registry re-announcement
//! ```
//!
//! The HTTP probe issues a single GET with a 15 second timeout and retries
//! once on transport failure. Only an exact `200 OK` counts as `UP`.

pub mod checker;
pub mod poller;

pub use checker::{HttpStatusProbe, StatusProbe, PROBE_TIMEOUT};
pub use poller::{
    parse_check_interval, BoxFuture, HealthPoller, PollerHandle, StatusCallback,
    DEFAULT_CHECK_INTERVAL,
};
