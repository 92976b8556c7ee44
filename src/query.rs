use rusqlite::types::Value;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::catalog::{self, BOOK_COLUMNS};
use crate::config::{CatalogConfig, DEFAULT_PER_PAGE};
use crate::error::Result;
use crate::models::Book;

pub const MULTIPLE_AUTHORS: &str = "(multiple authors)";
pub const MULTIPLE_TAGS: &str = "(multiple tags)";

const AUTHOR_SORT_EXPR: &str = "(SELECT MIN(authors.name) FROM book_authors \
    JOIN authors ON authors.id = book_authors.author_id \
    WHERE book_authors.book_id = books.id)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Title,
    Publisher,
    PublicationYear,
    LastRead,
    Author,
}

impl SortField {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "title" => Some(Self::Title),
            "publisher" => Some(Self::Publisher),
            "publication_year" => Some(Self::PublicationYear),
            "last_read" => Some(Self::LastRead),
            "author" => Some(Self::Author),
            _ => None,
        }
    }

    fn expression(self) -> &'static str {
        match self {
            Self::Title => "books.title",
            Self::Publisher => "books.publisher",
            Self::PublicationYear => "books.publication_year",
            Self::LastRead => "books.last_read",
            // A book with several authors sorts under the alphabetically first one.
            Self::Author => AUTHOR_SORT_EXPR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Only an explicit `desc` is descending.
    pub fn parse(value: &str) -> Self {
        if value == "desc" {
            Self::Desc
        } else {
            Self::Asc
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Filter, sort and page options for one collection listing.
#[derive(Debug, Clone, PartialEq)]
pub struct BookQuery {
    pub q: Option<String>,
    pub page: u32,
    pub per_page: u32,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub publisher: Option<String>,
    pub year: Option<String>,
    pub sort: Option<SortField>,
    pub order: Option<SortOrder>,
}

impl Default for BookQuery {
    fn default() -> Self {
        Self {
            q: None,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            authors: vec![],
            tags: vec![],
            publisher: None,
            year: None,
            sort: None,
            order: None,
        }
    }
}

impl BookQuery {
    /// Read options from request parameters.
    ///
    /// `author` and `tag` may repeat. Blank values are ignored, unknown keys
    /// are skipped and an unrecognized `sort` falls back to the default order.
    pub fn from_params<I, K, V>(params: I, config: &CatalogConfig) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = Self {
            per_page: config.default_per_page,
            ..Self::default()
        };
        for (key, value) in params {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "q" => query.q = Some(value.to_string()),
                "pg" => {
                    // Numbers past u32 saturate so they still land beyond the last page.
                    query.page = value
                        .parse::<u64>()
                        .ok()
                        .filter(|page| *page > 0)
                        .map_or(1, |page| u32::try_from(page).unwrap_or(u32::MAX))
                }
                "per_pg" => {
                    query.per_page = value
                        .parse::<u32>()
                        .ok()
                        .filter(|size| *size > 0)
                        .unwrap_or(config.default_per_page)
                        .min(config.max_per_page)
                }
                "author" => query.authors.push(value.to_string()),
                "tag" => query.tags.push(value.to_string()),
                "publisher" => query.publisher = Some(value.to_string()),
                "year" => query.year = Some(value.to_string()),
                "sort" => {
                    query.sort = SortField::parse(value);
                    if query.sort.is_none() {
                        log::debug!("unknown sort field {:?}, using default", value);
                    }
                }
                "order" => query.order = Some(SortOrder::parse(value)),
                _ => {}
            }
        }
        query
    }

    /// Effective sort after defaults: last read, newest first, when no valid
    /// field was given.
    pub fn resolved_sort(&self) -> (SortField, SortOrder) {
        match self.sort {
            None => (SortField::LastRead, SortOrder::Desc),
            Some(SortField::LastRead) => {
                (SortField::LastRead, self.order.unwrap_or(SortOrder::Desc))
            }
            Some(field) => (field, self.order.unwrap_or(SortOrder::Asc)),
        }
    }
}

/// Human-readable echo of the filters that were applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
}

impl SearchMeta {
    pub fn is_empty(&self) -> bool {
        self.author.is_none()
            && self.tag.is_none()
            && self.publisher.is_none()
            && self.year.is_none()
            && self.q.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn pages(&self) -> u64 {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(self.per_page as u64)
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        (self.page as u64) < self.pages()
    }

    pub fn prev_num(&self) -> Option<u32> {
        self.has_prev().then(|| self.page - 1)
    }

    pub fn next_num(&self) -> Option<u32> {
        self.has_next().then(|| self.page + 1)
    }
}

/// WHERE clauses and their bound values, added one filter at a time.
#[derive(Debug, Default)]
struct BookSelect {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl BookSelect {
    fn for_user(user_id: &str) -> Self {
        let mut select = Self::default();
        select.clauses.push("books.user_id = ?".to_string());
        select.values.push(Value::Text(user_id.to_string()));
        select
    }

    fn linked_to_authors(&mut self, author_ids: &[String]) -> &mut Self {
        if !author_ids.is_empty() {
            self.clauses.push(format!(
                "EXISTS (SELECT 1 FROM book_authors WHERE book_authors.book_id = books.id \
                 AND book_authors.author_id IN ({}))",
                placeholders(author_ids.len())
            ));
            self.values
                .extend(author_ids.iter().map(|id| Value::Text(id.clone())));
        }
        self
    }

    fn linked_to_tags(&mut self, tag_ids: &[String]) -> &mut Self {
        if !tag_ids.is_empty() {
            self.clauses.push(format!(
                "EXISTS (SELECT 1 FROM book_tags WHERE book_tags.book_id = books.id \
                 AND book_tags.tag_id IN ({}))",
                placeholders(tag_ids.len())
            ));
            self.values.extend(tag_ids.iter().map(|id| Value::Text(id.clone())));
        }
        self
    }

    fn publisher_contains(&mut self, publisher: Option<&str>) -> &mut Self {
        if let Some(publisher) = publisher {
            self.clauses
                .push("books.publisher LIKE ? ESCAPE '\\'".to_string());
            self.values.push(Value::Text(like_pattern(publisher)));
        }
        self
    }

    fn year_equals(&mut self, year: Option<&str>) -> &mut Self {
        if let Some(year) = year {
            self.clauses.push("books.publication_year = ?".to_string());
            self.values.push(Value::Text(year.to_string()));
        }
        self
    }

    fn matches_text(&mut self, q: Option<&str>) -> &mut Self {
        if let Some(q) = q {
            self.clauses.push(
                "(books.title LIKE ? ESCAPE '\\' \
                  OR books.publisher LIKE ? ESCAPE '\\' \
                  OR EXISTS (SELECT 1 FROM book_authors \
                    JOIN authors ON authors.id = book_authors.author_id \
                    WHERE book_authors.book_id = books.id AND authors.name LIKE ? ESCAPE '\\') \
                  OR EXISTS (SELECT 1 FROM book_tags \
                    JOIN tags ON tags.id = book_tags.tag_id \
                    WHERE book_tags.book_id = books.id AND tags.tag_name LIKE ? ESCAPE '\\'))"
                    .to_string(),
            );
            let pattern = like_pattern(q);
            for _ in 0..4 {
                self.values.push(Value::Text(pattern.clone()));
            }
        }
        self
    }

    fn where_sql(&self) -> String {
        self.clauses.join(" AND ")
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// `%term%` with LIKE wildcards in `term` matched literally. SQLite's LIKE is
/// already case-insensitive for ASCII.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if ch == '\\' || ch == '%' || ch == '_' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn order_sql(field: SortField, order: SortOrder) -> String {
    let expr = field.expression();
    // NULLs last in both directions, then a stable tiebreak.
    format!("{expr} IS NULL, {expr} {}, books.id ASC", order.keyword())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

fn describe_filters(conn: &Connection, user_id: &str, query: &BookQuery) -> Result<SearchMeta> {
    let mut meta = SearchMeta::default();

    match query.authors.as_slice() {
        [] => {}
        [author_id] => {
            if let Some(author) = catalog::get_author(conn, author_id)? {
                if author.user_id == user_id {
                    meta.author = Some(author.name);
                }
            }
        }
        _ => meta.author = Some(MULTIPLE_AUTHORS.to_string()),
    }

    match query.tags.as_slice() {
        [] => {}
        [tag_id] => {
            if let Some(tag) = catalog::get_tag(conn, tag_id)? {
                if tag.user_id == user_id {
                    meta.tag = Some(tag.tag_name);
                }
            }
        }
        _ => meta.tag = Some(MULTIPLE_TAGS.to_string()),
    }

    meta.publisher = non_empty(&query.publisher).map(str::to_string);
    meta.year = non_empty(&query.year).map(str::to_string);
    meta.q = non_empty(&query.q).map(str::to_string);
    Ok(meta)
}

/// One page of `user_id`'s books matching every filter in `query`, plus a
/// description of the filters for display.
pub fn build_query(
    conn: &Connection,
    user_id: &str,
    query: &BookQuery,
) -> Result<(Page<Book>, SearchMeta)> {
    let meta = describe_filters(conn, user_id, query)?;

    let mut select = BookSelect::for_user(user_id);
    select
        .linked_to_authors(&query.authors)
        .linked_to_tags(&query.tags)
        .publisher_contains(non_empty(&query.publisher))
        .year_equals(non_empty(&query.year))
        .matches_text(non_empty(&query.q));
    let where_sql = select.where_sql();

    let page = query.page.max(1);
    let per_page = query.per_page.max(1);
    let (sort, order) = query.resolved_sort();

    // COUNT and page SELECT read the same snapshot.
    let tx = conn.unchecked_transaction()?;
    let total: i64 = tx.query_row(
        &format!("SELECT COUNT(*) FROM books WHERE {}", where_sql),
        rusqlite::params_from_iter(select.values.iter()),
        |row| row.get(0),
    )?;
    let total = total.max(0) as u64;

    // Both factors are below 2^32, so the product fits in u64.
    let offset = u64::from(page - 1) * u64::from(per_page);
    if offset >= total {
        log::debug!(
            "book query user={} page={} per_page={} is past the end ({} matches)",
            user_id,
            page,
            per_page,
            total
        );
        return Ok((
            Page {
                items: vec![],
                page,
                per_page,
                total,
            },
            meta,
        ));
    }

    let sql = format!(
        "SELECT {} FROM books WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
        BOOK_COLUMNS,
        where_sql,
        order_sql(sort, order)
    );
    log::debug!(
        "book query user={} sort={:?} order={:?} page={} per_page={}",
        user_id,
        sort,
        order,
        page,
        per_page
    );

    let mut values = select.values;
    values.push(Value::Integer(i64::from(per_page)));
    // offset < total, and total came from an i64 COUNT.
    values.push(Value::Integer(offset as i64));

    let mut items = Vec::new();
    {
        let mut stmt = tx.prepare(&sql)?;
        let rows =
            stmt.query_map(rusqlite::params_from_iter(values.iter()), catalog::book_from_row)?;
        for row in rows {
            let mut book = row?;
            catalog::load_relations(&tx, &mut book)?;
            items.push(book);
        }
    }
    tx.commit()?;

    Ok((
        Page {
            items,
            page,
            per_page,
            total,
        },
        meta,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{insert_author, insert_book};
    use crate::db::open_in_memory;
    use crate::models::{Author, Tag};
    use chrono::{DateTime, Utc};

    struct Seed<'a> {
        title: Option<&'a str>,
        publisher: Option<&'a str>,
        year: Option<&'a str>,
        last_read: Option<i64>,
        authors: &'a [&'a str],
        tags: &'a [&'a str],
    }

    impl<'a> Seed<'a> {
        fn titled(title: &'a str) -> Self {
            Self {
                title: Some(title),
                publisher: None,
                year: None,
                last_read: None,
                authors: &[],
                tags: &[],
            }
        }
    }

    fn seed(conn: &mut Connection, user_id: &str, seed: Seed<'_>) -> Book {
        let mut book = Book::new(user_id);
        book.title = seed.title.map(str::to_string);
        book.publisher = seed.publisher.map(str::to_string);
        book.publication_year = seed.year.map(str::to_string);
        book.last_read = seed.last_read.and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
        book.authors = seed
            .authors
            .iter()
            .map(|name| {
                crate::lookup::get_or_create::<Author>(conn, name, user_id).unwrap()
            })
            .collect();
        book.tags = seed
            .tags
            .iter()
            .map(|name| crate::lookup::get_or_create::<Tag>(conn, name, user_id).unwrap())
            .collect();
        insert_book(conn, &mut book).unwrap();
        book
    }

    fn titles(page: &Page<Book>) -> Vec<Option<String>> {
        page.items.iter().map(|book| book.title.clone()).collect()
    }

    fn some(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|value| Some(value.to_string())).collect()
    }

    #[test]
    fn single_owned_author_is_named_in_meta() {
        let mut conn = open_in_memory().unwrap();
        let book = seed(&mut conn, "u1", Seed { authors: &["Ursula K. Le Guin"], ..Seed::titled("Earthsea") });
        seed(&mut conn, "u1", Seed::titled("Other"));
        let author_id = book.authors[0].id.clone().unwrap();

        let query = BookQuery { authors: vec![author_id], ..BookQuery::default() };
        let (page, meta) = build_query(&conn, "u1", &query).unwrap();

        assert_eq!(meta.author.as_deref(), Some("Ursula K. Le Guin"));
        assert_eq!(titles(&page), some(&["Earthsea"]));
    }

    #[test]
    fn several_authors_use_placeholder() {
        let mut conn = open_in_memory().unwrap();
        let a = seed(&mut conn, "u1", Seed { authors: &["A"], ..Seed::titled("First") });
        let b = seed(&mut conn, "u1", Seed { authors: &["B"], ..Seed::titled("Second") });
        seed(&mut conn, "u1", Seed { authors: &["C"], ..Seed::titled("Third") });

        let query = BookQuery {
            authors: vec![a.authors[0].id.clone().unwrap(), b.authors[0].id.clone().unwrap()],
            sort: Some(SortField::Title),
            ..BookQuery::default()
        };
        let (page, meta) = build_query(&conn, "u1", &query).unwrap();

        assert_eq!(meta.author.as_deref(), Some(MULTIPLE_AUTHORS));
        assert_eq!(titles(&page), some(&["First", "Second"]));
    }

    #[test]
    fn foreign_author_has_no_meta_and_filters_everything_out() {
        let mut conn = open_in_memory().unwrap();
        seed(&mut conn, "u1", Seed { authors: &["Mine"], ..Seed::titled("Mine") });
        let mut foreign = Author::new("Theirs", "u2");
        insert_author(&conn, &mut foreign).unwrap();

        let query = BookQuery { authors: vec![foreign.id.unwrap()], ..BookQuery::default() };
        let (page, meta) = build_query(&conn, "u1", &query).unwrap();

        assert!(meta.author.is_none());
        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);

        let missing = BookQuery { authors: vec!["no-such-id".to_string()], ..BookQuery::default() };
        let (_, meta) = build_query(&conn, "u1", &missing).unwrap();
        assert!(meta.is_empty());
    }

    #[test]
    fn tag_filter_and_meta() {
        let mut conn = open_in_memory().unwrap();
        let tagged = seed(&mut conn, "u1", Seed { tags: &["fantasy"], ..Seed::titled("Tagged") });
        seed(&mut conn, "u1", Seed { tags: &["history"], ..Seed::titled("Untagged") });
        let tag_id = tagged.tags[0].id.clone().unwrap();

        let query = BookQuery { tags: vec![tag_id.clone()], ..BookQuery::default() };
        let (page, meta) = build_query(&conn, "u1", &query).unwrap();
        assert_eq!(meta.tag.as_deref(), Some("fantasy"));
        assert_eq!(titles(&page), some(&["Tagged"]));

        let query = BookQuery { tags: vec![tag_id, "x".to_string()], ..BookQuery::default() };
        let (_, meta) = build_query(&conn, "u1", &query).unwrap();
        assert_eq!(meta.tag.as_deref(), Some(MULTIPLE_TAGS));
    }

    #[test]
    fn year_filter_is_exact() {
        let mut conn = open_in_memory().unwrap();
        seed(&mut conn, "u1", Seed { year: Some("1999"), ..Seed::titled("A") });
        seed(&mut conn, "u1", Seed { year: Some("2001"), ..Seed::titled("B") });
        seed(&mut conn, "u1", Seed { year: Some("1999"), ..Seed::titled("C") });
        seed(&mut conn, "u1", Seed::titled("D"));

        let query = BookQuery {
            year: Some("1999".to_string()),
            sort: Some(SortField::Title),
            ..BookQuery::default()
        };
        let (page, meta) = build_query(&conn, "u1", &query).unwrap();

        assert_eq!(titles(&page), some(&["A", "C"]));
        assert_eq!(meta.year.as_deref(), Some("1999"));
    }

    #[test]
    fn publisher_filter_is_case_insensitive_substring() {
        let mut conn = open_in_memory().unwrap();
        seed(&mut conn, "u1", Seed { publisher: Some("Penguin Books"), ..Seed::titled("A") });
        seed(&mut conn, "u1", Seed { publisher: Some("Tor"), ..Seed::titled("B") });

        let query = BookQuery { publisher: Some("penguin".to_string()), ..BookQuery::default() };
        let (page, meta) = build_query(&conn, "u1", &query).unwrap();

        assert_eq!(titles(&page), some(&["A"]));
        assert_eq!(meta.publisher.as_deref(), Some("penguin"));
    }

    #[test]
    fn free_text_searches_title_publisher_authors_and_tags() {
        let mut conn = open_in_memory().unwrap();
        seed(&mut conn, "u1", Seed::titled("The Dragon Reborn"));
        seed(&mut conn, "u1", Seed { publisher: Some("Dragonfly Press"), ..Seed::titled("B") });
        seed(&mut conn, "u1", Seed { authors: &["Anne DRAGONetti"], ..Seed::titled("C") });
        seed(&mut conn, "u1", Seed { tags: &["dragons"], ..Seed::titled("D") });
        seed(&mut conn, "u1", Seed::titled("E"));
        seed(&mut conn, "u2", Seed::titled("Dragon of another user"));

        let query = BookQuery {
            q: Some("dragon".to_string()),
            sort: Some(SortField::Title),
            ..BookQuery::default()
        };
        let (page, meta) = build_query(&conn, "u1", &query).unwrap();

        assert_eq!(titles(&page), some(&["B", "C", "D", "The Dragon Reborn"]));
        assert_eq!(meta.q.as_deref(), Some("dragon"));
    }

    #[test]
    fn wildcards_in_search_are_literal() {
        let mut conn = open_in_memory().unwrap();
        seed(&mut conn, "u1", Seed::titled("100% Pure"));
        seed(&mut conn, "u1", Seed::titled("Plain"));

        let query = BookQuery { q: Some("%".to_string()), ..BookQuery::default() };
        let (page, _) = build_query(&conn, "u1", &query).unwrap();
        assert_eq!(titles(&page), some(&["100% Pure"]));
    }

    #[test]
    fn default_sort_is_last_read_descending_nulls_last() {
        let mut conn = open_in_memory().unwrap();
        seed(&mut conn, "u1", Seed { last_read: Some(100), ..Seed::titled("old") });
        seed(&mut conn, "u1", Seed::titled("never"));
        seed(&mut conn, "u1", Seed { last_read: Some(300), ..Seed::titled("new") });

        let (page, _) = build_query(&conn, "u1", &BookQuery::default()).unwrap();
        assert_eq!(titles(&page), some(&["new", "old", "never"]));

        let query = BookQuery {
            sort: Some(SortField::LastRead),
            order: Some(SortOrder::Asc),
            ..BookQuery::default()
        };
        let (page, _) = build_query(&conn, "u1", &query).unwrap();
        assert_eq!(titles(&page), some(&["old", "new", "never"]));
    }

    #[test]
    fn unknown_sort_ignores_requested_order() {
        let mut conn = open_in_memory().unwrap();
        seed(&mut conn, "u1", Seed { last_read: Some(100), ..Seed::titled("old") });
        seed(&mut conn, "u1", Seed { last_read: Some(300), ..Seed::titled("new") });

        let params = vec![("sort", "rating"), ("order", "asc")];
        let query = BookQuery::from_params(params, &CatalogConfig::default());
        let (page, _) = build_query(&conn, "u1", &query).unwrap();
        assert_eq!(titles(&page), some(&["new", "old"]));
    }

    #[test]
    fn title_sort_ascending_by_default_with_nulls_last() {
        let mut conn = open_in_memory().unwrap();
        seed(&mut conn, "u1", Seed::titled("Beta"));
        seed(&mut conn, "u1", Seed { title: None, ..Seed::titled("") });
        seed(&mut conn, "u1", Seed::titled("Alpha"));

        let query = BookQuery { sort: Some(SortField::Title), ..BookQuery::default() };
        let (page, _) = build_query(&conn, "u1", &query).unwrap();
        assert_eq!(
            titles(&page),
            vec![Some("Alpha".to_string()), Some("Beta".to_string()), None]
        );

        let query = BookQuery {
            sort: Some(SortField::Title),
            order: Some(SortOrder::Desc),
            ..BookQuery::default()
        };
        let (page, _) = build_query(&conn, "u1", &query).unwrap();
        assert_eq!(
            titles(&page),
            vec![Some("Beta".to_string()), Some("Alpha".to_string()), None]
        );
    }

    #[test]
    fn author_sort_uses_first_author_name() {
        let mut conn = open_in_memory().unwrap();
        seed(&mut conn, "u1", Seed { authors: &["Zola", "Balzac"], ..Seed::titled("pair") });
        seed(&mut conn, "u1", Seed { authors: &["Camus"], ..Seed::titled("single") });
        seed(&mut conn, "u1", Seed::titled("anonymous"));

        let query = BookQuery { sort: Some(SortField::Author), ..BookQuery::default() };
        let (page, _) = build_query(&conn, "u1", &query).unwrap();
        assert_eq!(titles(&page), some(&["pair", "single", "anonymous"]));
    }

    #[test]
    fn pages_are_bounded_and_out_of_range_is_empty() {
        let mut conn = open_in_memory().unwrap();
        for title in ["a", "b", "c", "d", "e"] {
            seed(&mut conn, "u1", Seed::titled(title));
        }

        let query = BookQuery {
            sort: Some(SortField::Title),
            per_page: 2,
            page: 3,
            ..BookQuery::default()
        };
        let (page, _) = build_query(&conn, "u1", &query).unwrap();
        assert_eq!(titles(&page), some(&["e"]));
        assert_eq!(page.total, 5);
        assert_eq!(page.pages(), 3);
        assert!(!page.has_next());
        assert_eq!(page.prev_num(), Some(2));

        let query = BookQuery { page: 9, ..query };
        let (page, _) = build_query(&conn, "u1", &query).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 5);
    }

    #[test]
    fn extreme_page_and_size_give_an_empty_page() {
        let mut conn = open_in_memory().unwrap();
        seed(&mut conn, "u1", Seed::titled("only"));

        let query = BookQuery {
            page: u32::MAX,
            per_page: u32::MAX,
            ..BookQuery::default()
        };
        let (page, _) = build_query(&conn, "u1", &query).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 1);
        assert_eq!(page.page, u32::MAX);
        assert!(!page.has_next());

        let query = BookQuery {
            page: 1,
            per_page: u32::MAX,
            ..BookQuery::default()
        };
        let (page, _) = build_query(&conn, "u1", &query).unwrap();
        assert_eq!(titles(&page), some(&["only"]));
    }

    #[test]
    fn oversized_pg_param_is_past_the_end() {
        let mut conn = open_in_memory().unwrap();
        seed(&mut conn, "u1", Seed::titled("only"));

        let config = CatalogConfig::default();
        let query = BookQuery::from_params(vec![("pg", "5000000000")], &config);
        assert_eq!(query.page, u32::MAX);
        let (page, _) = build_query(&conn, "u1", &query).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 1);

        let query = BookQuery::from_params(vec![("pg", "-3")], &config);
        assert_eq!(query.page, 1);
    }

    #[test]
    fn other_users_books_are_invisible() {
        let mut conn = open_in_memory().unwrap();
        seed(&mut conn, "u1", Seed::titled("mine"));
        seed(&mut conn, "u2", Seed::titled("theirs"));

        let (page, meta) = build_query(&conn, "u1", &BookQuery::default()).unwrap();
        assert_eq!(titles(&page), some(&["mine"]));
        assert!(meta.is_empty());
    }

    #[test]
    fn params_are_parsed_with_defaults() {
        let config = CatalogConfig::default();
        let params = vec![
            ("author", "a1"),
            ("author", "a2"),
            ("pg", "zero"),
            ("per_pg", "5000"),
            ("q", "  "),
            ("sort", "publication_year"),
            ("order", "sideways"),
            ("unused", "x"),
        ];
        let query = BookQuery::from_params(params, &config);

        assert_eq!(query.authors, vec!["a1".to_string(), "a2".to_string()]);
        assert_eq!(query.page, 1);
        assert_eq!(query.per_page, config.max_per_page);
        assert!(query.q.is_none());
        assert_eq!(
            query.resolved_sort(),
            (SortField::PublicationYear, SortOrder::Asc)
        );

        let empty = BookQuery::from_params(Vec::<(String, String)>::new(), &config);
        assert_eq!(empty.per_page, config.default_per_page);
        assert_eq!(empty.resolved_sort(), (SortField::LastRead, SortOrder::Desc));
    }

    #[test]
    fn meta_serializes_only_applied_filters() {
        let meta = SearchMeta {
            year: Some("2012".to_string()),
            ..SearchMeta::default()
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json, serde_json::json!({ "year": "2012" }));
    }
}
