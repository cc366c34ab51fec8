//! IPC: s-expression request/response protocol over a session.

pub mod dispatch;
pub mod server;

pub use dispatch::handle_message;
pub use server::serve;
