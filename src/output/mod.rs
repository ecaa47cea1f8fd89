//! Progress reporting and document output

pub mod assembler;
pub mod progress;

pub use assembler::{assemble, render_html, write_document, DocumentMeta};
pub use progress::ProgressReporter;
