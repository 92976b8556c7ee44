use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{insert_book_row, persist_relations};
use crate::error::{CatalogError, Result};
use crate::lookup::get_or_create;
use crate::models::{Author, Book, Tag};

/// A validated book edit form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookForm {
    pub title: Option<String>,
    pub publisher: Option<String>,
    pub publication_year: Option<String>,
    pub comments: Option<String>,
    pub cover_image: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Blank entries dropped, repeats collapsed, first-seen order kept.
fn distinct_names(names: &[String]) -> Vec<&str> {
    let mut result: Vec<&str> = vec![];
    for name in names {
        let name = name.trim();
        if !name.is_empty() && !result.contains(&name) {
            result.push(name);
        }
    }
    result
}

/// Overwrite `book` with the form's fields and replace its authors and tags.
///
/// Authors and tags are resolved by name for the book's owner, creating any
/// that do not exist yet. Everything is written in a single transaction and
/// `book` is only modified after the commit succeeds.
pub fn update_book_with_form_data(
    conn: &mut Connection,
    book: &mut Book,
    form: &BookForm,
) -> Result<()> {
    let user_id = book.user_id.clone();
    let now = Utc::now();
    log::info!("saving form data for book {:?}: {:?}", book.id, form.title);

    let tx = conn.transaction()?;

    let mut authors = Vec::new();
    for name in distinct_names(&form.authors) {
        authors.push(get_or_create::<Author>(&tx, name, &user_id)?);
    }
    let mut tags = Vec::new();
    for name in distinct_names(&form.tags) {
        tags.push(get_or_create::<Tag>(&tx, name, &user_id)?);
    }

    let mut updated = Book {
        title: form.title.clone(),
        publisher: form.publisher.clone(),
        publication_year: form.publication_year.clone(),
        comments: form.comments.clone(),
        cover_image: form.cover_image.clone(),
        authors: vec![],
        tags: vec![],
        ..book.clone()
    };

    let book_id = match updated.id.clone() {
        Some(id) => {
            let changed = tx.execute(
                "UPDATE books SET title = ?1, publisher = ?2, publication_year = ?3, comments = ?4, cover_image = ?5, updated_at = ?6 \
                 WHERE id = ?7 AND user_id = ?8",
                params![
                    updated.title,
                    updated.publisher,
                    updated.publication_year,
                    updated.comments,
                    updated.cover_image,
                    now.timestamp_millis(),
                    id,
                    user_id
                ],
            )?;
            if changed == 0 {
                return Err(CatalogError::BookNotFound(id));
            }
            id
        }
        None => {
            let id = Uuid::new_v4().to_string();
            let created_at = updated.created_at.unwrap_or(now);
            insert_book_row(&tx, &id, &updated, created_at, now)?;
            updated.id = Some(id.clone());
            updated.created_at = Some(created_at);
            id
        }
    };

    persist_relations(&tx, &book_id, &mut authors, &mut tags)?;
    tx.commit()?;

    updated.authors = authors;
    updated.tags = tags;
    *book = updated;
    Ok(())
}
