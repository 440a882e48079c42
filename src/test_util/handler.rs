use std::sync::Mutex;
use async_trait::async_trait;
use crate::connection_handler::ConnectionHandler;
use crate::packet_header::ConnectionId;

/// Collects all callbacks. If `echo` is set, every payload is sent back as a reply.
#[derive(Default)]
pub struct CollectingHandler {
    echo: bool,
    payloads: Mutex<Vec<(ConnectionId, Vec<u8>)>>,
    established: Mutex<Vec<ConnectionId>>,
    failed: Mutex<Vec<ConnectionId>>,
}

impl CollectingHandler {
    pub fn echoing() -> CollectingHandler {
        CollectingHandler {
            echo: true,
            ..Default::default()
        }
    }

    pub fn payloads(&self) -> Vec<(ConnectionId, Vec<u8>)> {
        self.payloads.lock().unwrap().clone()
    }

    pub fn payloads_for(&self, connection_id: ConnectionId) -> Vec<Vec<u8>> {
        self.payloads().into_iter()
            .filter(|(id, _)| *id == connection_id)
            .map(|(_, payload)| payload)
            .collect()
    }

    pub fn established(&self) -> Vec<ConnectionId> {
        self.established.lock().unwrap().clone()
    }

    pub fn failed(&self) -> Vec<ConnectionId> {
        self.failed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConnectionHandler for CollectingHandler {
    async fn on_payload(&self, connection_id: ConnectionId, payload: &[u8]) -> Option<Vec<u8>> {
        self.payloads.lock().unwrap().push((connection_id, payload.to_vec()));
        if self.echo {
            Some(payload.to_vec())
        }
        else {
            None
        }
    }

    async fn on_connection_established(&self, connection_id: ConnectionId) {
        self.established.lock().unwrap().push(connection_id);
    }

    async fn on_connection_failed(&self, connection_id: ConnectionId) {
        self.failed.lock().unwrap().push(connection_id);
    }
}
