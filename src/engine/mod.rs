//! Delta Proxy Cache Engine
//!
//! Serves time range queries from a cached series and fetches only the
//! missing extents (deltas) from the origin.
//!
//! - **orchestrator**: [`DeltaProxyCache`], the request state machine
//! - **fast_forward**: Near-real-time value spliced into responses
//! - **outcome**: Cache status, warnings and the served response
//! - **clock**: Wall clock seam
//! - **error**: [`ProxyError`]
//!
//! # Failure Policy
//!
//! | Condition                         | Result                           |
//! |-----------------------------------|----------------------------------|
//! | Some deltas fail                  | Served, `PartialResult` warning  |
//! | All deltas fail, cache overlaps   | Served stale, `Stale` warning    |
//! | All deltas fail, nothing cached   | `UpstreamUnavailable`            |
//! | Cache store fails                 | Proxied, `CacheBypassed` warning |
//! | Fast-forward fails                | Served, `ffstatus=err`           |

pub mod clock;
pub mod error;
pub mod fast_forward;
pub mod orchestrator;
pub mod outcome;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ProxyError, ProxyResult};
pub use fast_forward::FastForwardStatus;
pub use orchestrator::{DeltaProxyCache, EngineConfig};
pub use outcome::{CacheStatus, DeltaResponse, Warning};
