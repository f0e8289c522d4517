//! Byte-level encoding for BPE tokenization.
//!
//! Every input byte is a symbol, so any UTF-8 text has a base representation
//! and decoding restores the exact input bytes.

pub mod byte_level;

pub use byte_level::{byte_to_char, bytes_to_symbols, char_to_byte, ByteLevelEncoder};
