//! HTTP message board.
//!
//! - `GET /` and `GET /message` render the built-in pages
//! - `GET /<path>` serves a file from the served root, or the 404 page
//! - `POST <any path>` stores a `username`/`message` form submission and
//!   always answers `302 Found` with `Location: /`
//!
//! One request is served per connection (`Connection: close`).

pub mod handler;
pub mod parser;
pub mod response;
pub mod server;

pub use server::HttpServer;
