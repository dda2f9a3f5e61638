//! In-memory transport for lifecycle tests.

use crate::error::transport::TransportError;
use crate::transport::{EventSink, Socket, SocketId, Transport};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::{Arc, Mutex};

use url::Url;

#[derive(Default)]
struct Record {
    opens: usize,
    live: usize,
    max_live: usize,
    fail_next: usize,
    sinks: Vec<EventSink>,
    closed: Vec<SocketId>,
    sent: Vec<String>,
}

/// Counts opens and live sockets and records every written frame.
#[derive(Clone, Default)]
pub(crate) struct RecordingTransport {
    record: Arc<Mutex<Record>>,
}

impl RecordingTransport {
    pub(crate) fn opens(&self) -> usize {
        self.record.lock().unwrap().opens
    }

    pub(crate) fn live(&self) -> usize {
        self.record.lock().unwrap().live
    }

    pub(crate) fn max_live(&self) -> usize {
        self.record.lock().unwrap().max_live
    }

    pub(crate) fn closed(&self) -> Vec<SocketId> {
        self.record.lock().unwrap().closed.clone()
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.record.lock().unwrap().sent.clone()
    }

    pub(crate) fn last_sink(&self) -> EventSink {
        self.record
            .lock()
            .unwrap()
            .sinks
            .last()
            .cloned()
            .expect("no socket opened yet")
    }

    /// Make the next `count` calls to `open` fail synchronously.
    pub(crate) fn fail_next_opens(&self, count: usize) {
        self.record.lock().unwrap().fail_next = count;
    }
}

impl Transport for RecordingTransport {
    fn open(&self, _url: &Url, sink: EventSink) -> Result<Box<dyn Socket>, TransportError> {
        let mut record = self.record.lock().unwrap();
        if record.fail_next > 0 {
            record.fail_next -= 1;
            return Err(TransportError::Open {
                message: "connection refused".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        record.opens += 1;
        record.live += 1;
        record.max_live = record.max_live.max(record.live);
        let id = sink.socket_id();
        record.sinks.push(sink);

        Ok(Box::new(RecordingSocket {
            id,
            record: Arc::clone(&self.record),
            closed: false,
        }))
    }
}

struct RecordingSocket {
    id: SocketId,
    record: Arc<Mutex<Record>>,
    closed: bool,
}

impl Socket for RecordingSocket {
    fn send_text(&mut self, text: String) -> bool {
        if self.closed {
            return false;
        }
        self.record.lock().unwrap().sent.push(text);
        true
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut record = self.record.lock().unwrap();
        record.live -= 1;
        record.closed.push(self.id);
    }
}

impl Drop for RecordingSocket {
    fn drop(&mut self) {
        self.close();
    }
}
