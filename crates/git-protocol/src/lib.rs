//! Git wire protocol framing primitives.
//!
//! This crate covers format-level responsibilities only: pkt-line
//! encode/decode, capability list parsing, and ref advertisement
//! formatting. It does not implement negotiation, side-band demuxing, or
//! any transport handshake — those live in an external transport.

pub mod capability;
pub mod pktline;
pub mod refadv;

/// Errors that can occur during protocol framing.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid pkt-line: {0}")]
    InvalidPktLine(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
