//! Core session I/O pipeline.
//!
//! This module contains the concurrent heart of the crate:
//!
//! - **byte_queue**: bounded ring buffer between the reader thread and the
//!   owning task; its fixed capacity is the pipeline's backpressure bound
//! - **session**: connection lifecycle, reader thread, notification drain,
//!   write paths, and ordered teardown
//!
//! # Architecture
//!
//! ```text
//! Transport bytes ──► reader thread ──► ByteQueue ──► notification
//!                                                         │
//!                          owning task: drain ◄───────────┘
//!                                 │
//!                                 ▼
//!                        Emulator::append(bytes)
//! ```

pub mod byte_queue;
pub mod session;
