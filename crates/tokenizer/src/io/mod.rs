//! Saving and loading trained tokenizers.
//!
//! Two layouts are supported: the `<prefix>-vocab.json` / `<prefix>-merges.txt`
//! pair, and a single `tokenizer.json` bundle that also records the
//! configuration.

pub mod format;
pub mod load;
pub mod save;

pub use format::{SerializedTokenizer, VocabEntries, BUNDLE_FILE, MERGES_HEADER};
pub use load::{LoadedModel, TokenizerLoader};
pub use save::TokenizerSaver;
