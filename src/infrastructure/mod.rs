//! Infrastructure implementations of the domain's collaborator traits.

mod file_sink;

pub use file_sink::FileMessageSink;
