use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{CatalogError, Result};
use crate::metadata::parse_year;
use crate::models::EpubMetadata;

/// Read title, authors, publisher and publication year from an EPUB file.
///
/// The file handle lives only for the duration of the call and is closed on
/// every return path, including parse failures.
pub fn extract_metadata_from_epub(path: &Path) -> Result<EpubMetadata> {
    let file = File::open(path)?;
    let metadata = read_epub_metadata(file);
    if let Err(err) = &metadata {
        log::warn!("epub metadata failed for {}: {}", path.display(), err);
    }
    metadata
}

pub fn read_epub_metadata<R: Read + Seek>(reader: R) -> Result<EpubMetadata> {
    let mut archive = ZipArchive::new(reader)?;

    // 1. META-INF/container.xml points at the package document
    let opf_path = find_opf_path(&mut archive)?;

    // 2. Dublin Core fields from the package metadata
    let opf = read_entry(&mut archive, &opf_path)?;
    parse_opf(&opf)
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String> {
    let mut entry = archive.by_name(name).map_err(|err| match err {
        zip::result::ZipError::FileNotFound => CatalogError::InvalidEpub(format!("missing {}", name)),
        other => other.into(),
    })?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml)?;
    Ok(xml)
}

fn find_opf_path<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let xml = read_entry(archive, "META-INF/container.xml")?;

    let mut reader = Reader::from_str(&xml);
    let mut buf = Vec::new();

    // Looking for <rootfile ... full-path="OEBPS/content.opf" ... />
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"rootfile" {
                    for attr in e.attributes() {
                        let attr = attr.map_err(quick_xml::Error::from)?;
                        if attr.key.as_ref() == b"full-path" {
                            return Ok(String::from_utf8_lossy(&attr.value).to_string());
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => (),
        }
        buf.clear();
    }

    Err(CatalogError::InvalidEpub(
        "no rootfile in META-INF/container.xml".to_string(),
    ))
}

#[derive(Clone, Copy)]
enum DcField {
    Title,
    Creator,
    Publisher,
    Date,
}

impl DcField {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::Title),
            b"creator" => Some(Self::Creator),
            b"publisher" => Some(Self::Publisher),
            b"date" => Some(Self::Date),
            _ => None,
        }
    }
}

fn parse_opf(opf: &str) -> Result<EpubMetadata> {
    let mut reader = Reader::from_str(opf);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut meta = EpubMetadata::default();
    let mut dates: Vec<String> = Vec::new();
    let mut in_metadata = false;
    let mut current: Option<DcField> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"metadata" {
                    in_metadata = true;
                } else if in_metadata {
                    current = DcField::from_local_name(name.as_ref());
                    text.clear();
                }
            }
            Ok(Event::Text(e)) => {
                if current.is_some() {
                    text.push_str(&e.unescape()?);
                }
            }
            Ok(Event::CData(e)) => {
                if current.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"metadata" {
                    break;
                }
                if let Some(field) = current.take() {
                    let value = text.trim().to_string();
                    if !value.is_empty() {
                        match field {
                            DcField::Title => {
                                if meta.title.is_none() {
                                    meta.title = Some(value);
                                }
                            }
                            DcField::Creator => meta.authors.push(value),
                            DcField::Publisher => {
                                if meta.publisher.is_none() {
                                    meta.publisher = Some(value);
                                }
                            }
                            DcField::Date => dates.push(value),
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => (),
        }
        buf.clear();
    }

    meta.publication_year = dates.first().and_then(|date| parse_year(date));
    Ok(meta)
}
