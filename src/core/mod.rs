//! # Core Protocol Components
//!
//! Packet representation and the stream codec.
//!
//! ## Components
//! - **Packet**: header + opaque body, with the identity field helpers
//! - **Codec**: Tokio codec for framing packets over byte streams
//! - **Types**: `SessionId`
//!
//! ## Wire Format
//! ```text
//! [Type(4, LE)] [TotalSize(4, LE)] [Body(TotalSize - 8)]
//! ```
//!
//! ## Security
//! - Maximum packet size: 1024 bytes, header included
//! - Size validation before allocation

pub mod codec;
pub mod packet;
pub mod types;
