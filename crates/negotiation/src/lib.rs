//! Inquiry negotiation engine.
//!
//! Every operation loads the inquiry, lets the aggregate decide, and
//! commits the outcome atomically. Notifications that only inform a
//! party about a change already made are sent in their own transaction
//! and may fail without undoing that change.

mod engine;

pub use engine::InquiryEngine;
