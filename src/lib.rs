//! Mailflow — email dispatch and engagement-tracking pipeline.
//!
//! Turns an abstract send request into a provider-specific delivery,
//! instruments the content for open/click/reply tracking, and reconciles
//! scheduled sends against asynchronous provider feedback.

pub mod config;
pub mod dispatch;
pub mod engagement;
pub mod error;
pub mod http;
pub mod instrument;
pub mod message;
pub mod provider;
pub mod queue;
pub mod suppression;
