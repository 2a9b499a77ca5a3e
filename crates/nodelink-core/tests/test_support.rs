//! Shared test support utilities for integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;
use nodelink_core::transport::TransportRequest;
use nodelink_core::{
    Connection, ConnectionConfig, Error, FailureKind, RequestObserver, RequestRecord,
    ScriptedMulti, SharedMultiHandle,
};

/// What a [`RecordingObserver`] saw
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Success { uri: String, status: u16 },
    Failure { uri: String, status: u16, kind: Option<FailureKind>, transport_error: String },
    Construction { message: String },
}

/// Observer that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
    elapsed: Mutex<Vec<Duration>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Elapsed time of every finished request, in order
    pub fn elapsed(&self) -> Vec<Duration> {
        self.elapsed.lock().unwrap().clone()
    }
}

impl RequestObserver for RecordingObserver {
    fn on_success(&self, record: &RequestRecord<'_>) {
        self.elapsed.lock().unwrap().push(record.elapsed);
        self.events.lock().unwrap().push(Event::Success {
            uri: record.uri.to_string(),
            status: record.status,
        });
    }

    fn on_failure(&self, record: &RequestRecord<'_>, error: &Error) {
        self.elapsed.lock().unwrap().push(record.elapsed);
        self.events.lock().unwrap().push(Event::Failure {
            uri: record.uri.to_string(),
            status: record.status,
            kind: error.kind(),
            transport_error: record.transport_error.to_string(),
        });
    }

    fn on_construction_failure(&self, error: &Error) {
        self.events.lock().unwrap().push(Event::Construction {
            message: error.to_string(),
        });
    }
}

/// A connection to `localhost:9200` over a scripted handle, with the handle
/// and observer kept for assertions
pub struct Harness {
    pub connection: Connection,
    pub multi: Arc<Mutex<ScriptedMulti>>,
    pub observer: Arc<RecordingObserver>,
}

impl Harness {
    pub fn new(multi: ScriptedMulti) -> Self {
        Self::with_config(ConnectionConfig::new("localhost"), multi)
    }

    pub fn with_config(config: ConnectionConfig, multi: ScriptedMulti) -> Self {
        let multi = Arc::new(Mutex::new(multi));
        let handle: SharedMultiHandle = multi.clone();
        let observer = Arc::new(RecordingObserver::default());
        let connection = Connection::builder()
            .config(config)
            .multi_handle(handle)
            .observer(observer.clone())
            .build()
            .expect("connection should build");

        Self {
            connection,
            multi,
            observer,
        }
    }

    /// The request most recently registered on the handle
    pub fn last_request(&self) -> TransportRequest {
        self.multi
            .lock()
            .unwrap()
            .log()
            .requests
            .last()
            .cloned()
            .expect("a request should have been registered")
    }

    /// Every registered transfer was removed exactly once
    pub fn assert_balanced(&self) {
        let multi = self.multi.lock().unwrap();
        let log = multi.log();
        assert_eq!(log.outstanding(), 0, "transfers left on the handle");
        for token in &log.added {
            assert_eq!(log.removals_of(*token), 1, "transfer {} removed more than once", token);
        }
    }
}
