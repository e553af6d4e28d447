//! Egress identity management: the proxy list, its rotation policy and the
//! operator gate that halts traffic after repeated failures.

mod gate;
mod identity;
mod pool;

pub use gate::OperatorGate;
pub use identity::{EgressIdentity, ProxyScheme, load_identity_file, parse_identity_list};
pub use pool::{EgressPool, ErrorAction, PAUSE_THRESHOLD};
