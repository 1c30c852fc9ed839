//! Protocol implementations.
//!
//! - `http`: message board pages, static files and form submission over TCP
//! - `echo`: UDP datagram echo relay

pub mod echo;
pub mod http;
