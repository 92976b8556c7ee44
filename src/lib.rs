//! Helpers behind a personal book catalog: collection queries, edit-form
//! sync, per-user author/tag resolution and metadata extraction from EPUB
//! files and Google Books volumes.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod form;
pub mod google_books;
pub mod lookup;
pub mod metadata;
pub mod models;
pub mod parser;
pub mod query;

pub use config::CatalogConfig;
pub use error::{CatalogError, Result};
pub use form::{update_book_with_form_data, BookForm};
pub use lookup::{authors_from_author_list, get_or_create, UserScoped};
pub use metadata::{book_model_from_api_data, parse_year, remove_page_curl};
pub use models::{Author, Book, EpubMetadata, Tag};
pub use parser::extract_metadata_from_epub;
pub use query::{build_query, BookQuery, Page, SearchMeta, SortField, SortOrder};
