pub mod client;
pub mod metrics_client;
pub mod metrics_history;
pub mod resources;
pub mod source;
pub mod utils;

/// Default user agent - automatically uses the package version
///
/// All cluster clients should be built with `client::new(Some(USER_AGENT))`
/// unless the user agent is overridden through `NAVIDASH_USER_AGENT`.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
