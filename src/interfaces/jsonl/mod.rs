//! Newline-delimited JSON command scripts.

pub mod command;
pub mod command_reader;
pub mod result_writer;

pub use command::{Command, execute};
pub use command_reader::CommandReader;
pub use result_writer::ResultWriter;
