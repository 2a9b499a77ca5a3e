//! Request execution against a single node
//!
//! This module provides:
//! - Credential folding into headers and transport options
//! - Request building from method, path, query and body
//! - Poll-driven execution on a shared multiplexing handle
//! - Raw response parsing
//! - Ordered status/body classification into failure kinds
//! - Request lifecycle observation

pub mod auth;
pub mod builder;
pub mod classifier;
pub mod executor;
pub mod observer;
pub mod parser;

pub use auth::{create_auth_handler, transform_config, AuthHandler, AuthTransform};
pub use builder::{Method, QueryParams, RequestBuilder, CONNECT_TIMEOUT, REQUEST_TIMEOUT};
pub use classifier::{classify, failure_message, ClassificationRule};
pub use executor::{PollingConfig, PollingExecutor, RequestResult, IDLE_BACKOFF, WAIT_TIMEOUT};
pub use observer::{RequestObserver, RequestRecord, TracingObserver};
pub use parser::{HttpResponseParser, ParsedResponse, ResponseParser};
