use std::net::SocketAddr;
use std::sync::Mutex;
use async_trait::async_trait;
use crate::send_socket::SendSocket;

#[derive(Default)]
pub struct RecordingSendSocket {
    sent: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
}

impl RecordingSendSocket {
    pub fn sent(&self) -> Vec<(SocketAddr, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl SendSocket for RecordingSendSocket {
    async fn do_send_packet(&self, to: SocketAddr, packet_buf: &[u8]) {
        self.sent.lock().unwrap().push((to, packet_buf.to_vec()));
    }
}
