//! RRC (Radio Resource Control) protocol library
//!
//! Bit-packed encoding and decoding of the RRC messages exchanged between a
//! gNB and its UEs.
//!
//! # Modules
//!
//! - `codec` - Bit-level primitives and the `PerCodec` trait
//! - `ies` - Information elements shared across messages
//! - `message` - Logical channel message types
//! - `procedures` - Messages grouped per RRC procedure

pub mod codec;
pub mod ies;
pub mod message;
pub mod procedures;

pub use codec::{decode_rrc, encode_rrc, DecodeError, EncodeError, PerCodec, PerDecoder, PerEncoder};
pub use message::{BcchMessage, DlCcchMessage, DlDcchMessage, RrcChannel, UlCcchMessage, UlDcchMessage};
