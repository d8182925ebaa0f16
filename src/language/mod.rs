//! Language Registry (C1)
//!
//! A registry of known languages, each described by a name, a set of file
//! extensions, and which runtimes (native / portable) can parse it. A
//! mutable, read-mostly table open to `add_language` / `remove_language`
//! at runtime.

mod registry;

pub use registry::{LanguageDescriptor, LanguageRegistry};
