use std::collections::{HashMap, HashSet};

use rusqlite::Connection;

use crate::catalog;
use crate::error::Result;
use crate::models::{Author, Tag};

/// An entity whose name is unique per owning user.
pub trait UserScoped: Sized {
    fn find_by_name(conn: &Connection, user_id: &str, name: &str) -> Result<Option<Self>>;

    /// Build an unpersisted instance.
    fn unsaved(name: &str, user_id: &str) -> Self;
}

impl UserScoped for Author {
    fn find_by_name(conn: &Connection, user_id: &str, name: &str) -> Result<Option<Self>> {
        catalog::find_author_by_name(conn, user_id, name)
    }

    fn unsaved(name: &str, user_id: &str) -> Self {
        Author::new(name, user_id)
    }
}

impl UserScoped for Tag {
    fn find_by_name(conn: &Connection, user_id: &str, name: &str) -> Result<Option<Self>> {
        catalog::find_tag_by_name(conn, user_id, name)
    }

    fn unsaved(name: &str, user_id: &str) -> Self {
        Tag::new(name, user_id)
    }
}

/// Return the stored `E` named `name` for `user_id`, or a fresh unpersisted one.
///
/// Nothing is written. Two calls for the same missing name give two separate
/// unpersisted values, so callers must not persist both.
pub fn get_or_create<E: UserScoped>(conn: &Connection, name: &str, user_id: &str) -> Result<E> {
    match E::find_by_name(conn, user_id, name)? {
        Some(existing) => Ok(existing),
        None => Ok(E::unsaved(name, user_id)),
    }
}

/// Resolve a list of author names in one query, creating unpersisted authors
/// for names the user does not have yet. Matching is exact and case sensitive.
/// The result follows the order of `author_names`, repeats dropped.
pub fn authors_from_author_list(
    conn: &Connection,
    author_names: &[String],
    user_id: &str,
) -> Result<Vec<Author>> {
    let mut stored: HashMap<String, Author> =
        catalog::find_authors_by_names(conn, user_id, author_names)?
            .into_iter()
            .map(|author| (author.name.clone(), author))
            .collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut authors = Vec::with_capacity(author_names.len());
    for name in author_names {
        if !seen.insert(name.as_str()) {
            continue;
        }
        match stored.remove(name) {
            Some(author) => authors.push(author),
            None => authors.push(Author::new(name, user_id)),
        }
    }
    Ok(authors)
}
