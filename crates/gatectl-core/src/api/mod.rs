//! Gateway admin API: client, wire types and errors.

mod client;
pub mod error;
pub mod plugins;
pub mod types;

pub use client::ApiClient;
pub use error::{ApiError, ApiErrorKind, ApiResult};
pub use plugins::{PluginInfo, PluginList, PluginService, plugin_error_message};
pub use types::{AuthPayload, Envelope, UserInfo};
