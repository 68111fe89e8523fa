pub mod chunker;
pub mod embedder;
pub mod index;
