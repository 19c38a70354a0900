//! Stages run by [`crate::EndpointLayer`] on the way out of a handler.
//!
//! Each stage either fully handles the response (claims the request in the
//! [`crate::RequestContext`] and rewrites it) or returns it untouched.

pub mod exception;
pub mod result;
pub mod view;
