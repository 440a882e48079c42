use std::fmt::{Display, Formatter};

/// Position of a message in a connection's outbound / inbound order. This is a ring counter
///  over a single byte, and two of its values are reserved for control purposes: [SequenceId::SYN]
///  (re)establishes a connection, and [SequenceId::ERROR_ACK] tells a sender that the receiver
///  does not know the connection. The remaining 254 values number regular messages.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SequenceId(u8);

impl Display for SequenceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SequenceId {
    pub const SYN: SequenceId = SequenceId(0);
    pub const ERROR_ACK: SequenceId = SequenceId(1);

    /// number of distinct values, i.e. the number of slots in a ring buffer indexed by SequenceId
    pub const RING_SIZE: usize = 256;

    pub fn from_raw(value: u8) -> Self {
        Self(value)
    }

    pub fn to_raw(&self) -> u8 {
        self.0
    }

    pub fn is_reserved(&self) -> bool {
        *self == Self::SYN || *self == Self::ERROR_ACK
    }

    /// index into a ring buffer of [SequenceId::RING_SIZE] slots
    pub fn slot(&self) -> usize {
        self.0 as usize
    }

    /// The id following this one, skipping reserved values. This wraps around from 255 to 2.
    pub fn next(&self) -> SequenceId {
        let mut result = self.0.wrapping_add(1);
        while SequenceId(result).is_reserved() {
            result = result.wrapping_add(1);
        }
        SequenceId(result)
    }

    /// Returns true if `self` comes after `other` on the ring, i.e. if `other` is less than half a
    ///  ring behind `self`. NB: Equal ids are not 'after' each other.
    ///
    /// `a.is_after(b)` reads "a is after b": `from_raw(3).is_after(from_raw(250))` is true, since 3
    ///  is 9 steps past 250 when the counter wraps.
    pub fn is_after(&self, other: SequenceId) -> bool {
        other.0.wrapping_sub(self.0) as usize > Self::RING_SIZE / 2
    }
}
