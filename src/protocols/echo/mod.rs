//! UDP echo relay.
//!
//! Every datagram received is sent back, byte for byte, to its sender:
//!
//! ```text
//! Client -> relay: ping
//! Relay -> client: ping
//! ```
//!
//! At most `MAX_DATAGRAM` bytes are read per receive; longer datagrams are
//! truncated and only the retained prefix is echoed. Datagrams are handled
//! one at a time, so a client always gets its reply before the relay reads
//! the next datagram.
//!
//! `send_words` is the matching client: it relays a line of text one word
//! per datagram and collects the replies.

pub mod handler;

pub use handler::{send_words, EchoRelay};
