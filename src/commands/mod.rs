//! Command handlers
//!
//! The operations a front end drives: start, stop, pause and resume a
//! recording, query its status, and list capture devices.

pub mod recording;
