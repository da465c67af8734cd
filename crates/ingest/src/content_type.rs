//! Mapping from a `Content-Type` header to a declared [`FileType`].

use crate::types::FileType;

pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Media types accepted as zip uploads. Browsers and tooling disagree on the
/// name, so the non-standard aliases are accepted too.
pub const ZIP_MEDIA_TYPES: [&str; 3] = [
    "application/zip",
    "application/x-zip-compressed",
    "application/zip-compressed",
];

/// Derive the declared file type from a raw `Content-Type` header value.
///
/// Parameters such as `; charset=utf-8` are ignored and the comparison is
/// case-insensitive. Anything unrecognized maps to [`FileType::Invalid`].
///
/// ```rust
/// use ingest::{file_type_for_content_type, FileType};
///
/// assert_eq!(file_type_for_content_type("application/json; charset=utf-8"), FileType::StructuredDocument);
/// assert_eq!(file_type_for_content_type("application/x-zip-compressed"), FileType::Archive);
/// assert_eq!(file_type_for_content_type("text/plain"), FileType::Invalid);
/// ```
pub fn file_type_for_content_type(header: &str) -> FileType {
    let Some(media_type) = essence(header) else {
        return FileType::Invalid;
    };

    if media_type == JSON_MEDIA_TYPE {
        FileType::StructuredDocument
    } else if ZIP_MEDIA_TYPES.contains(&media_type.as_str()) {
        FileType::Archive
    } else {
        FileType::Invalid
    }
}

fn essence(header: &str) -> Option<String> {
    let media_type = header.split(';').next()?.trim();
    let (kind, subtype) = media_type.split_once('/')?;
    let valid_part =
        |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_graphic() && c != '/');
    if !valid_part(kind) || !valid_part(subtype) {
        return None;
    }
    Some(media_type.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_with_parameters() {
        assert_eq!(
            file_type_for_content_type("Application/JSON ; charset=UTF-8"),
            FileType::StructuredDocument
        );
    }

    #[test]
    fn every_zip_alias_is_an_archive() {
        for media_type in ZIP_MEDIA_TYPES {
            assert_eq!(file_type_for_content_type(media_type), FileType::Archive);
        }
    }

    #[test]
    fn malformed_headers_are_invalid() {
        for header in ["", "json", "application/", "/zip", "application/zip/extra", "multipart/form-data"] {
            assert_eq!(file_type_for_content_type(header), FileType::Invalid, "{header}");
        }
    }
}
