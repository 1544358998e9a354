//! HTTP layer for chatrelay.
//!
//! `POST /api/chat` streams plain text. The session inspection routes answer
//! with the JSON envelope from [`response`]. Errors are plain text.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;

#[cfg(test)]
pub(crate) mod test_support;
