//! Splitter implementations.

mod character;
mod text;

pub use character::CharacterSplitter;
pub use text::TextSplitter;
