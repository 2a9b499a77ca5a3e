//! Nodelink Core - Connection to a single node of a search cluster
//!
//! A [`Connection`] turns a method, path, query, body and transport options
//! into one HTTP request, drives it to completion on a multiplexing handle it
//! shares with other connections and maps the outcome onto either a
//! [`Response`] or a classified [`Error`].
//!
//! # Main Components
//!
//! - **Configuration**: Host, port, transport options and credentials
//! - **Auth**: Credentials folded into headers and transport options at construction
//! - **Request building**: URI assembly and per-method request shaping
//! - **Execution**: Poll-driven loop over a [`MultiHandle`]
//! - **Classification**: Ordered status/body rules producing a [`FailureKind`]
//!
//! # Example
//!
//! ```no_run
//! use nodelink_core::{shared, Connection, ConnectionConfig, Method, Result, ScriptedMulti, ScriptedResponse};
//!
//! fn example() -> Result<()> {
//!     let multi = shared(ScriptedMulti::new().respond(ScriptedResponse::status(200).body("{}")));
//!     let connection = Connection::new(ConnectionConfig::new("localhost"), multi)?;
//!     let response = connection.perform_request(Method::Get, "/_cluster/health", None, None, None)?;
//!     assert_eq!(response.status, 200);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod response;
pub mod transport;

// Re-export main types for convenience
pub use config::{AuthScheme, ConnectionConfig, Credentials, DEFAULT_PORT};
pub use connection::{Connection, ConnectionBuilder, SNIFF_PATH};
pub use error::{Error, FailureKind, Result, Severity};
pub use http::{
    Method, PollingConfig, QueryParams, RequestObserver, RequestRecord, ResponseParser,
    TracingObserver,
};
pub use response::Response;
pub use transport::{
    shared, MultiHandle, OptionKey, OptionValue, ScriptedMulti, ScriptedResponse,
    SharedMultiHandle, TransportOptions,
};
#[cfg(feature = "curl")]
pub use transport::CurlMulti;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
