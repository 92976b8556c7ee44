pub mod epub;

pub use epub::{extract_metadata_from_epub, read_epub_metadata};
