/// Rust source backend: lowers a compiled `Program` to a standalone module
/// implementing the same named procedures.
mod context;
mod emit;
mod writer;

pub use emit::emit;
