//! A connection to one search node
//!
//! Connections are created once per node by whatever pool owns them. They
//! share the pool's multiplexing handle, consume their credentials at
//! construction and then issue one request at a time.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use serde_json::Value;
use crate::config::ConnectionConfig;
use crate::http::{
    classify, failure_message, transform_config, HttpResponseParser, Method, PollingConfig,
    PollingExecutor, QueryParams, RequestBuilder, RequestObserver, RequestRecord, RequestResult,
    ResponseParser, TracingObserver,
};
use crate::response::Response;
use crate::transport::{SharedMultiHandle, TransportOptions};
use crate::{Error, Result};

/// Path queried by [`Connection::sniff`]
pub const SNIFF_PATH: &str = "/_nodes/_all/clear";

/// Builder for [`Connection`]
#[derive(Default)]
pub struct ConnectionBuilder {
    config: Option<Result<ConnectionConfig>>,
    multi: Option<SharedMultiHandle>,
    parser: Option<Arc<dyn ResponseParser>>,
    observer: Option<Arc<dyn RequestObserver>>,
    polling: PollingConfig,
}

impl ConnectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = Some(Ok(config));
        self
    }

    /// Use a JSON-shaped configuration map; parse errors surface from [`build`](Self::build)
    pub fn config_value(mut self, value: Value) -> Self {
        self.config = Some(ConnectionConfig::from_value(value));
        self
    }

    /// The shared multiplexing handle (required)
    pub fn multi_handle(mut self, multi: SharedMultiHandle) -> Self {
        self.multi = Some(multi);
        self
    }

    pub fn parser(mut self, parser: Arc<dyn ResponseParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn RequestObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn polling(mut self, polling: PollingConfig) -> Self {
        self.polling = polling;
        self
    }

    /// Validate and create the connection
    ///
    /// Failures are reported to the observer before they are returned.
    pub fn build(self) -> Result<Connection> {
        let observer = self
            .observer
            .clone()
            .unwrap_or_else(|| Arc::new(TracingObserver));

        self.try_build(observer.clone()).inspect_err(|e| observer.on_construction_failure(e))
    }

    fn try_build(self, observer: Arc<dyn RequestObserver>) -> Result<Connection> {
        let multi = self.multi.ok_or_else(|| Error::MissingCapability {
            capability: "multiplexing transport handle".to_string(),
        })?;
        let config = self.config.unwrap_or_else(|| {
            Err(Error::MissingConfigKey {
                key: "host".to_string(),
            })
        })?;

        let base_url = config.base_url()?;
        let host = config.host_name().to_string();
        let port = config.resolved_port();
        let scheme = config.scheme().to_string();

        let transformed = transform_config(config);
        let builder = RequestBuilder::new(
            base_url,
            transformed.headers,
            transformed.config.connection_params,
        );

        tracing::debug!(
            target: "nodelink::connection",
            host = %host,
            port = port,
            "Connection created"
        );

        Ok(Connection {
            multi,
            builder,
            host,
            port,
            scheme,
            parser: self.parser.unwrap_or_else(|| Arc::new(HttpResponseParser)),
            observer,
            polling: self.polling,
            in_flight: AtomicBool::new(false),
            alive: AtomicBool::new(false),
            ping_failures: AtomicU32::new(0),
            last_ping: Mutex::new(None),
        })
    }
}

/// Connection to a single node
pub struct Connection {
    multi: SharedMultiHandle,
    builder: RequestBuilder,
    host: String,
    port: u16,
    scheme: String,
    parser: Arc<dyn ResponseParser>,
    observer: Arc<dyn RequestObserver>,
    polling: PollingConfig,
    in_flight: AtomicBool,
    alive: AtomicBool,
    ping_failures: AtomicU32,
    last_ping: Mutex<Option<Instant>>,
}

impl Connection {
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Create a connection with the default parser, observer and polling settings
    pub fn new(config: ConnectionConfig, multi: SharedMultiHandle) -> Result<Self> {
        Self::builder().config(config).multi_handle(multi).build()
    }

    /// Issue one request and classify its outcome
    ///
    /// `uri` is the path on the node; `options` are per-call transport
    /// overrides applied on top of the connection's own.
    pub fn perform_request(
        &self,
        method: Method,
        uri: &str,
        params: Option<&QueryParams>,
        body: Option<&str>,
        options: Option<&TransportOptions>,
    ) -> Result<Response> {
        let _in_flight = InFlight::acquire(&self.in_flight).ok_or_else(|| Error::RequestInFlight {
            host: self.host.clone(),
        })?;

        let request = self.builder.build_request(method, uri, params, body, options);
        let url = request.url.clone();

        match PollingExecutor::new(&self.multi, self.polling).execute(request) {
            Ok(result) => self.process_result(method, &url, body, result),
            Err(error) => {
                let transport_error = error.to_string();
                let record = RequestRecord {
                    method,
                    uri: &url,
                    request_body: body,
                    status: 0,
                    response_body: "",
                    elapsed: Duration::ZERO,
                    transport_error: &transport_error,
                };
                self.observer.on_failure(&record, &error);
                Err(error)
            }
        }
    }

    fn process_result(
        &self,
        method: Method,
        url: &str,
        body: Option<&str>,
        result: RequestResult,
    ) -> Result<Response> {
        if result.is_transport_failure() {
            let error = Error::Transport {
                code: result.error_code,
                message: result.error_message.clone(),
            };
            let record = RequestRecord {
                method,
                uri: url,
                request_body: body,
                status: result.info.status,
                response_body: "",
                elapsed: result.info.total_time,
                transport_error: &result.error_message,
            };
            self.observer.on_failure(&record, &error);
            return Err(error);
        }

        let reported = Some(result.info.status).filter(|status| *status != 0);
        let parsed = self.parser.parse(&result.body, reported);
        let status = match result.info.status {
            0 => parsed.status.unwrap_or(0),
            status => status,
        };
        let record = RequestRecord {
            method,
            uri: url,
            request_body: body,
            status,
            response_body: &parsed.body,
            elapsed: result.info.total_time,
            transport_error: &result.error_message,
        };

        if let Some(kind) = classify(status, &parsed.body) {
            let error = Error::Http {
                kind,
                status_code: status,
                message: failure_message(status, &result.error_message, &parsed.body),
            };
            self.observer.on_failure(&record, &error);
            return Err(error);
        }

        self.observer.on_success(&record);

        let text = match method {
            Method::Head => String::new(),
            _ => parsed.body,
        };
        Ok(Response {
            status,
            text,
            headers: parsed.headers,
            info: result.info,
        })
    }

    /// `HEAD /`; a 200 marks the node alive, anything else marks it dead
    ///
    /// Transport and classified HTTP failures count as a failed ping rather
    /// than an error.
    pub fn ping(&self) -> Result<bool> {
        match self.perform_request(Method::Head, "/", None, None, None) {
            Ok(response) if response.status == 200 => {
                self.mark_alive();
                Ok(true)
            }
            Ok(_) => {
                self.mark_dead();
                Ok(false)
            }
            Err(error @ (Error::Transport { .. } | Error::Http { .. })) => {
                log::debug!("Ping of {} failed: {}", self.host, error);
                self.mark_dead();
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    /// Node information from [`SNIFF_PATH`]
    pub fn sniff(&self) -> Result<Value> {
        self.perform_request(Method::Get, SNIFF_PATH, None, None, None)?
            .json()
    }

    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Release);
        self.ping_failures.store(0, Ordering::Release);
        self.stamp_ping();
    }

    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::Release);
        self.ping_failures.fetch_add(1, Ordering::AcqRel);
        self.stamp_ping();
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Consecutive failed pings since the node was last seen alive
    pub fn ping_failures(&self) -> u32 {
        self.ping_failures.load(Ordering::Acquire)
    }

    pub fn last_ping(&self) -> Option<Instant> {
        *self.last_ping.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn stamp_ping(&self) {
        *self.last_ping.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Instant::now());
    }

    /// Host name without scheme
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Scheme requests are sent with
    pub fn transport_schema(&self) -> &str {
        &self.scheme
    }

    pub fn base_url(&self) -> &str {
        self.builder.base_url()
    }

    /// Headers sent with every request (pre-encoded credentials)
    pub fn headers(&self) -> &std::collections::BTreeMap<String, String> {
        self.builder.headers()
    }

    /// Transport options applied to every request
    pub fn transport_options(&self) -> &TransportOptions {
        self.builder.options()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("base_url", &self.builder.base_url())
            .field("alive", &self.is_alive())
            .field("ping_failures", &self.ping_failures())
            .finish()
    }
}

/// Marks a connection busy for the duration of one request
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
