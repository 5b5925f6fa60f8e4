pub mod cache;
pub mod config;
pub mod connector;
pub mod limits;
pub mod session;
pub mod traits;
pub mod types;

pub use cache::SessionCache;
pub use config::{CloudConfFile, ConnectionConfig, Identity, StaticConfig};
pub use connector::KeystoneConnector;
pub use session::{AuthGrant, Session};
pub use traits::{ConfigSource, Connector, LimitSource};
pub use types::{LimitReport, LimitValue};
