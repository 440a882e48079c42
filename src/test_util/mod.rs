//! Utilities for testing protocol functionality: a socket recording everything sent through it,
//!  a handler collecting everything the protocol reports, and an in-memory network connecting
//!  several [crate::end_point::EndPoint]s.

pub mod socket;
pub mod handler;
pub mod loopback;

pub use handler::CollectingHandler;
pub use loopback::LoopbackNetwork;
pub use socket::RecordingSendSocket;
