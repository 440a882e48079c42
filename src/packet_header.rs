use std::fmt::{Debug, Display, Formatter};
use anyhow::bail;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use crate::error::RudpError;
use crate::sequence_id::SequenceId;

/// Identifies one logical duplex channel between two endpoints. It is independent of the peer's
///  network address, so a peer can change its address without renegotiating the connection.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ConnectionId(u32);

impl Debug for ConnectionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl Display for ConnectionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl ConnectionId {
    pub fn from_raw(value: u32) -> Self {
        Self(value)
    }

    pub fn to_raw(&self) -> u32 {
        self.0
    }

    /// a cryptographically random id for a new connection
    pub fn random() -> Self {
        Self(rand::random())
    }
}

/// Packet header - all numbers in network byte order (BE):
///
/// ```ascii
/// 0: sequence id (u8)
/// 1: connection id (u32)
/// ```
///
/// An ack is a header without payload. A data packet is a header followed by at least one byte
///  of payload.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct PacketHeader {
    pub sequence_id: SequenceId,
    pub connection_id: ConnectionId,
}

impl PacketHeader {
    pub const SERIALIZED_LEN: usize = std::mem::size_of::<u8>() + std::mem::size_of::<u32>();

    pub fn new(sequence_id: SequenceId, connection_id: ConnectionId) -> PacketHeader {
        PacketHeader {
            sequence_id,
            connection_id,
        }
    }

    pub fn ser(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.sequence_id.to_raw());
        buf.put_u32(self.connection_id.to_raw());
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<PacketHeader> {
        if buf.remaining() < Self::SERIALIZED_LEN {
            bail!(RudpError::MalformedPacket { len: buf.remaining() });
        }

        let sequence_id = SequenceId::from_raw(buf.get_u8());
        let connection_id = ConnectionId::from_raw(buf.get_u32());
        Ok(PacketHeader {
            sequence_id,
            connection_id,
        })
    }

    /// the complete ack packet for this header
    pub fn ack_packet(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SERIALIZED_LEN);
        self.ser(&mut buf);
        buf.freeze()
    }

    /// the complete data packet for this header and the given payload
    pub fn data_packet(&self, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SERIALIZED_LEN + payload.len());
        self.ser(&mut buf);
        buf.put_slice(payload);
        buf.freeze()
    }
}

/// An inbound packet. Acks and data packets are distinguished purely by their length.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Packet<'a> {
    Ack(PacketHeader),
    Data(PacketHeader, &'a [u8]),
}

impl<'a> Packet<'a> {
    pub fn parse(mut buf: &'a [u8]) -> anyhow::Result<Packet<'a>> {
        let header = PacketHeader::deser(&mut buf)?;
        if buf.is_empty() {
            Ok(Packet::Ack(header))
        }
        else {
            Ok(Packet::Data(header, buf))
        }
    }

    pub fn header(&self) -> &PacketHeader {
        match self {
            Packet::Ack(header) => header,
            Packet::Data(header, _) => header,
        }
    }
}
