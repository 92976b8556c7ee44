use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Book {
    pub id: Option<String>, // UUID, None until stored
    pub user_id: String,
    pub title: Option<String>,
    pub publisher: Option<String>,
    pub publication_year: Option<String>,
    pub cover_image: Option<String>,
    pub comments: Option<String>,
    pub gbooks_id: Option<String>,
    pub last_read: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub authors: Vec<Author>,
    pub tags: Vec<Tag>,
}

impl Book {
    pub fn new(user_id: &str) -> Self {
        Self {
            id: None,
            user_id: user_id.to_string(),
            title: None,
            publisher: None,
            publication_year: None,
            cover_image: None,
            comments: None,
            gbooks_id: None,
            last_read: None,
            created_at: None,
            authors: vec![],
            tags: vec![],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: Option<String>,
    pub user_id: String,
    pub name: String,
}

impl Author {
    pub fn new(name: &str, user_id: &str) -> Self {
        Self {
            id: None,
            user_id: user_id.to_string(),
            name: name.to_string(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: Option<String>,
    pub user_id: String,
    pub tag_name: String,
}

impl Tag {
    pub fn new(tag_name: &str, user_id: &str) -> Self {
        Self {
            id: None,
            user_id: user_id.to_string(),
            tag_name: tag_name.to_string(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// Bibliographic fields read out of an EPUB package document.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct EpubMetadata {
    pub title: Option<String>,
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<String>,
}
