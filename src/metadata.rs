use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;
use crate::lookup::authors_from_author_list;
use crate::models::Book;

/// A Google Books volume resource, reduced to the fields the catalog uses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Volume {
    pub id: String,
    #[serde(rename = "volumeInfo")]
    pub volume_info: VolumeInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    pub title: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub image_links: Option<ImageLinks>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageLinks {
    pub thumbnail: Option<String>,
    pub small_thumbnail: Option<String>,
}

/// Pull the year out of a formatted date string such as `2012-05-06`.
///
/// The first `-`-separated part that is exactly four characters long wins.
pub fn parse_year(date: &str) -> Option<String> {
    date.split('-')
        .find(|part| part.chars().count() == 4)
        .map(str::to_string)
}

/// Drop the `edge=curl` parameter Google Books adds to cover thumbnails.
pub fn remove_page_curl(url: &str) -> Result<String> {
    let mut parsed = Url::parse(url)?;
    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| key != "edge")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }
    Ok(parsed.to_string())
}

/// Build an unpersisted book for `user_id` from a raw volume payload.
pub fn book_model_from_api_data(
    conn: &Connection,
    user_id: &str,
    api_data: &serde_json::Value,
) -> Result<Book> {
    let volume = Volume::deserialize(api_data)?;
    book_from_volume(conn, user_id, &volume)
}

pub fn book_from_volume(conn: &Connection, user_id: &str, volume: &Volume) -> Result<Book> {
    let info = &volume.volume_info;
    let cover_image = match info
        .image_links
        .as_ref()
        .and_then(|links| links.thumbnail.as_deref())
    {
        Some(thumbnail) => Some(remove_page_curl(thumbnail)?),
        None => None,
    };

    let mut book = Book::new(user_id);
    book.gbooks_id = Some(volume.id.clone());
    book.title = info.title.clone();
    book.publisher = info.publisher.clone();
    book.publication_year = info.published_date.as_deref().and_then(parse_year);
    book.cover_image = cover_image;
    book.authors = authors_from_author_list(conn, &info.authors, user_id)?;
    Ok(book)
}
