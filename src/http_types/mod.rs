//! Request and response types exchanged with whatever transport sits in
//! front of the router. No I/O happens here.

mod request;
mod response;

pub use request::Request;
pub use response::{reason_phrase, CompletedResponse};
