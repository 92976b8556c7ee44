use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{CatalogError, Result};
use crate::models::{Author, Book, Tag};

pub(crate) const BOOK_COLUMNS: &str = "books.id, books.user_id, books.title, books.publisher, \
    books.publication_year, books.cover_image, books.comments, books.gbooks_id, \
    books.last_read, books.created_at";

pub(crate) fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    let last_read: Option<i64> = row.get(8)?;
    let created_at: Option<i64> = row.get(9)?;
    Ok(Book {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        publisher: row.get(3)?,
        publication_year: row.get(4)?,
        cover_image: row.get(5)?,
        comments: row.get(6)?,
        gbooks_id: row.get(7)?,
        last_read: last_read.and_then(DateTime::<Utc>::from_timestamp_millis),
        created_at: created_at.and_then(DateTime::<Utc>::from_timestamp_millis),
        authors: vec![],
        tags: vec![],
    })
}

fn author_from_row(row: &Row<'_>) -> rusqlite::Result<Author> {
    Ok(Author {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
    })
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        user_id: row.get(1)?,
        tag_name: row.get(2)?,
    })
}

/// Primary-key lookup. Not user scoped; callers compare `user_id`.
pub fn get_author(conn: &Connection, author_id: &str) -> Result<Option<Author>> {
    let author = conn
        .query_row(
            "SELECT id, user_id, name FROM authors WHERE id = ?1",
            params![author_id],
            author_from_row,
        )
        .optional()?;
    Ok(author)
}

/// Primary-key lookup. Not user scoped; callers compare `user_id`.
pub fn get_tag(conn: &Connection, tag_id: &str) -> Result<Option<Tag>> {
    let tag = conn
        .query_row(
            "SELECT id, user_id, tag_name FROM tags WHERE id = ?1",
            params![tag_id],
            tag_from_row,
        )
        .optional()?;
    Ok(tag)
}

pub fn find_author_by_name(conn: &Connection, user_id: &str, name: &str) -> Result<Option<Author>> {
    let author = conn
        .query_row(
            "SELECT id, user_id, name FROM authors WHERE user_id = ?1 AND name = ?2",
            params![user_id, name],
            author_from_row,
        )
        .optional()?;
    Ok(author)
}

pub fn find_tag_by_name(conn: &Connection, user_id: &str, tag_name: &str) -> Result<Option<Tag>> {
    let tag = conn
        .query_row(
            "SELECT id, user_id, tag_name FROM tags WHERE user_id = ?1 AND tag_name = ?2",
            params![user_id, tag_name],
            tag_from_row,
        )
        .optional()?;
    Ok(tag)
}

/// All authors of `user_id` whose name is exactly one of `names`.
pub(crate) fn find_authors_by_names(
    conn: &Connection,
    user_id: &str,
    names: &[String],
) -> Result<Vec<Author>> {
    if names.is_empty() {
        return Ok(vec![]);
    }
    let placeholders = vec!["?"; names.len()].join(", ");
    let sql = format!(
        "SELECT id, user_id, name FROM authors WHERE user_id = ? AND name IN ({})",
        placeholders
    );
    let mut values: Vec<&str> = Vec::with_capacity(names.len() + 1);
    values.push(user_id);
    values.extend(names.iter().map(String::as_str));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(values), author_from_row)?;
    let mut authors = Vec::new();
    for row in rows {
        authors.push(row?);
    }
    Ok(authors)
}

pub fn insert_author(conn: &Connection, author: &mut Author) -> Result<()> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO authors (id, user_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, author.user_id, author.name, Utc::now().timestamp_millis()],
    )?;
    author.id = Some(id);
    Ok(())
}

pub fn insert_tag(conn: &Connection, tag: &mut Tag) -> Result<()> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO tags (id, user_id, tag_name, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, tag.user_id, tag.tag_name, Utc::now().timestamp_millis()],
    )?;
    tag.id = Some(id);
    Ok(())
}

pub fn load_book(conn: &Connection, user_id: &str, book_id: &str) -> Result<Option<Book>> {
    let sql = format!(
        "SELECT {} FROM books WHERE books.id = ?1 AND books.user_id = ?2",
        BOOK_COLUMNS
    );
    let book = conn
        .query_row(&sql, params![book_id, user_id], book_from_row)
        .optional()?;
    match book {
        Some(mut book) => {
            load_relations(conn, &mut book)?;
            Ok(Some(book))
        }
        None => Ok(None),
    }
}

/// Fill `authors` and `tags` in link order.
pub(crate) fn load_relations(conn: &Connection, book: &mut Book) -> Result<()> {
    let book_id = match book.id.as_deref() {
        Some(id) => id,
        None => return Ok(()),
    };

    let mut stmt = conn.prepare_cached(
        "SELECT authors.id, authors.user_id, authors.name FROM book_authors \
         JOIN authors ON authors.id = book_authors.author_id \
         WHERE book_authors.book_id = ?1 \
         ORDER BY book_authors.position, authors.name",
    )?;
    let rows = stmt.query_map(params![book_id], author_from_row)?;
    let mut authors = Vec::new();
    for row in rows {
        authors.push(row?);
    }

    let mut stmt = conn.prepare_cached(
        "SELECT tags.id, tags.user_id, tags.tag_name FROM book_tags \
         JOIN tags ON tags.id = book_tags.tag_id \
         WHERE book_tags.book_id = ?1 \
         ORDER BY book_tags.position, tags.tag_name",
    )?;
    let rows = stmt.query_map(params![book_id], tag_from_row)?;
    let mut tags = Vec::new();
    for row in rows {
        tags.push(row?);
    }

    book.authors = authors;
    book.tags = tags;
    Ok(())
}

/// Store any unpersisted authors/tags and replace the book's link rows.
///
/// Runs on whatever connection or transaction it is handed; the caller owns
/// the commit.
pub(crate) fn persist_relations(
    conn: &Connection,
    book_id: &str,
    authors: &mut [Author],
    tags: &mut [Tag],
) -> Result<()> {
    for author in authors.iter_mut() {
        if !author.is_persisted() {
            insert_author(conn, author)?;
        }
    }
    for tag in tags.iter_mut() {
        if !tag.is_persisted() {
            insert_tag(conn, tag)?;
        }
    }

    conn.execute("DELETE FROM book_authors WHERE book_id = ?1", params![book_id])?;
    conn.execute("DELETE FROM book_tags WHERE book_id = ?1", params![book_id])?;

    for (position, author) in authors.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO book_authors (book_id, author_id, position) VALUES (?1, ?2, ?3)",
            params![book_id, author.id, position as i64],
        )?;
    }
    for (position, tag) in tags.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO book_tags (book_id, tag_id, position) VALUES (?1, ?2, ?3)",
            params![book_id, tag.id, position as i64],
        )?;
    }
    Ok(())
}

pub(crate) fn insert_book_row(
    conn: &Connection,
    id: &str,
    book: &Book,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO books (id, user_id, title, publisher, publication_year, cover_image, comments, gbooks_id, last_read, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            id,
            book.user_id,
            book.title,
            book.publisher,
            book.publication_year,
            book.cover_image,
            book.comments,
            book.gbooks_id,
            book.last_read.map(|value| value.timestamp_millis()),
            created_at.timestamp_millis(),
            now.timestamp_millis()
        ],
    )?;
    Ok(())
}

/// Persist a candidate book together with its authors and tags.
///
/// Ids are written back into `book` only once the transaction commits.
pub fn insert_book(conn: &mut Connection, book: &mut Book) -> Result<()> {
    let id = book
        .id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let now = Utc::now();
    let created_at = book.created_at.unwrap_or(now);
    let mut authors = book.authors.clone();
    let mut tags = book.tags.clone();

    let tx = conn.transaction()?;
    insert_book_row(&tx, &id, book, created_at, now)?;
    persist_relations(&tx, &id, &mut authors, &mut tags)?;
    tx.commit()?;

    log::info!("stored book {} for user {}: {:?}", id, book.user_id, book.title);
    book.id = Some(id);
    book.created_at = Some(created_at);
    book.authors = authors;
    book.tags = tags;
    Ok(())
}

pub fn mark_read(conn: &Connection, user_id: &str, book_id: &str, at: DateTime<Utc>) -> Result<()> {
    let updated = conn.execute(
        "UPDATE books SET last_read = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
        params![
            at.timestamp_millis(),
            Utc::now().timestamp_millis(),
            book_id,
            user_id
        ],
    )?;
    if updated == 0 {
        return Err(CatalogError::BookNotFound(book_id.to_string()));
    }
    Ok(())
}

/// Tags of `user_id` that are attached to at least one book, by name.
pub fn get_tags(conn: &Connection, user_id: &str) -> Result<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT tags.id, tags.user_id, tags.tag_name FROM tags \
         JOIN book_tags ON book_tags.tag_id = tags.id \
         WHERE tags.user_id = ?1 \
         ORDER BY tags.tag_name",
    )?;
    let rows = stmt.query_map(params![user_id], tag_from_row)?;
    let mut tags = Vec::new();
    for row in rows {
        tags.push(row?);
    }
    Ok(tags)
}

/// Authors of `user_id` that are attached to at least one book, by name.
pub fn get_authors(conn: &Connection, user_id: &str) -> Result<Vec<Author>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT authors.id, authors.user_id, authors.name FROM authors \
         JOIN book_authors ON book_authors.author_id = authors.id \
         WHERE authors.user_id = ?1 \
         ORDER BY authors.name",
    )?;
    let rows = stmt.query_map(params![user_id], author_from_row)?;
    let mut authors = Vec::new();
    for row in rows {
        authors.push(row?);
    }
    Ok(authors)
}
