//! Failure classification and busy backoff.
//!
//! Every way a chunk request can go wrong (transport error, per-chunk
//! timeout, busy or no-slice reply, malformed reply) is mapped to an
//! [`ErrorKind`], and the session decides from the kind whether the node
//! survives. Busy nodes are backed off with the exponential [`RetryPolicy`].

mod classify;
mod policy;

pub use classify::{classify_conn_error, classify_reply, Reply};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
