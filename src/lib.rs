mod core;
pub mod error;
pub mod protocol;
pub mod session;
mod test_support;

// Re-export commonly used types for consumers and integration tests
pub use crate::core::identifier::{Id, Key, Token};
pub use crate::core::routing_table::Peer;
pub use crate::core::storage::Value;
pub use crate::error::Error;
pub use crate::session::Session;

use ctor::ctor;
use tracing_subscriber::{fmt, EnvFilter};

#[ctor]
fn init_tracing() {
    // Avoid duplicate initialization if multiple tests run in parallel
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with_target(false)
        .compact()
        .try_init();
}
