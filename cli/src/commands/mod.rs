//! CLI commands for bpeprep.

pub mod clean;
pub mod decode;
pub mod encode;
pub mod run;
pub mod train;

pub use clean::CleanCommand;
pub use decode::DecodeCommand;
pub use encode::EncodeCommand;
pub use run::RunCommand;
pub use train::TrainCommand;
