//! Tag-validating scan of a structured upload.
//!
//! Drives `serde_json`'s streaming deserializer over the document looking for
//! two top-level members: `data`, whose value must be an array, and `meta`,
//! whose value must decode into a [`Metadata`] record with a recognized
//! category. Every other value is skipped without being built. Scanning stops
//! at the first token that completes both; the rest of the document is not
//! parsed here.
//!
//! Wrong-shaped members are tolerated. A `data` that is not an array, or a
//! `meta` that fails to decode or names an unknown category, is treated as
//! absent and the scan keeps going, so a later well-formed member can still
//! satisfy validation.
//!
//! ```rust
//! use ingest::{scan_tags, DataType, TracingEvents, DEFAULT_MAX_META_BYTES};
//!
//! let mut doc = &br#"{"meta":{"type":"users","methods":1,"version":5},"data":[]}"#[..];
//! let meta = scan_tags(&mut doc, DEFAULT_MAX_META_BYTES, &TracingEvents).unwrap();
//! assert_eq!(meta.data_type, DataType::Users);
//! assert_eq!(meta.version, 5);
//! ```
use std::cell::RefCell;
use std::fmt;
use std::io::BufRead;

use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::error::Category;

use crate::error::{IngestError, IoStage, ValidationError};
use crate::events::{IngestEvent, IngestEvents, MetaSkipReason};
use crate::trail::{ByteTrail, Recorded, TrailReader, MAX_NESTING};
use crate::types::{Metadata, RawMetadata};

/// UTF-8 byte-order mark.
pub const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Error message used to unwind the deserializer once both tags are in.
const SCAN_COMPLETE: &str = "tag scan complete";

/// Per-call scan state. Never shared between calls.
#[derive(Debug, Default)]
struct ScanState {
    meta: Option<Metadata>,
    data_tag_found: bool,
    data_tag_validated: bool,
}

impl ScanState {
    fn complete(&self) -> bool {
        self.data_tag_validated && self.meta.is_some()
    }

    fn missing_tags(&self) -> ValidationError {
        match (self.meta.is_some(), self.data_tag_validated) {
            (false, false) => ValidationError::NoTagFound,
            (true, false) => ValidationError::DataTagNotFound,
            (false, true) | (true, true) => ValidationError::MetaTagNotFound,
        }
    }

    fn finish(self) -> Result<Metadata, ValidationError> {
        match self.meta {
            Some(meta) if self.data_tag_validated => Ok(meta),
            _ => Err(self.missing_tags()),
        }
    }
}

struct Scan<'a> {
    state: ScanState,
    trail: &'a RefCell<ByteTrail>,
    max_meta_bytes: usize,
    events: &'a dyn IngestEvents,
}

/// Skip a leading UTF-8 byte-order mark, if any.
///
/// Only the reader's position moves; whatever sits underneath (a tee, for
/// instance) has already seen the bytes.
pub fn skip_bom<R: BufRead>(reader: &mut R) -> Result<(), IngestError> {
    for (index, expected) in UTF8_BOM.iter().enumerate() {
        let next = loop {
            match reader.fill_buf() {
                Ok(buf) => break buf.first().copied(),
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(IngestError::io(IoStage::ReadSource, err)),
            }
        };
        match next {
            Some(byte) if byte == *expected => reader.consume(1),
            // 0xEF cannot start a JSON document, so a partial mark is an error
            // rather than something to put back.
            Some(_) | None if index > 0 => {
                return Err(ValidationError::InvalidJson(
                    "incomplete byte-order mark".to_string(),
                )
                .into());
            }
            _ => return Ok(()),
        }
    }
    Ok(())
}

/// Scan `reader` until both required tags are confirmed.
///
/// On success the reader is left a few bytes past the token that completed
/// validation; callers that need the whole stream consumed must drain it.
pub fn scan_tags<R: BufRead>(
    reader: &mut R,
    max_meta_bytes: usize,
    events: &dyn IngestEvents,
) -> Result<Metadata, IngestError> {
    let trail = RefCell::new(ByteTrail::default());
    let mut deserializer =
        serde_json::Deserializer::from_reader(TrailReader::new(reader, &trail));
    let mut scan = Scan {
        state: ScanState::default(),
        trail: &trail,
        max_meta_bytes,
        events,
    };

    let walked = match Document(&mut scan).deserialize(&mut deserializer) {
        Ok(()) => deserializer.end(),
        Err(err) => Err(err),
    };

    let state = scan.state;
    match walked {
        // Completion unwinds the parser with an error; anything else that
        // stops it before then is a real failure.
        Err(err) if !state.complete() => Err(walk_failure(err, &trail.borrow(), &state)),
        _ => state.finish().map_err(IngestError::from),
    }
}

fn walk_failure(err: serde_json::Error, trail: &ByteTrail, state: &ScanState) -> IngestError {
    if trail.nesting_exceeded() {
        return ValidationError::InvalidJson(format!(
            "exceeded max nesting depth of {MAX_NESTING}"
        ))
        .into();
    }
    match err.classify() {
        Category::Io => IngestError::io(IoStage::ReadSource, err.into()),
        Category::Eof if !trail.inside_recorded_value() && trail.ended_cleanly() => {
            state.missing_tags().into()
        }
        Category::Eof => {
            ValidationError::InvalidJson("unexpected end of input".to_string()).into()
        }
        Category::Syntax | Category::Data => ValidationError::InvalidJson(err.to_string()).into(),
    }
}

fn decode_meta(bytes: &[u8], events: &dyn IngestEvents) -> Option<Metadata> {
    let raw = match serde_json::from_slice::<RawMetadata>(bytes) {
        Ok(raw) => raw,
        Err(err) => {
            events.record(IngestEvent::MetaTagSkipped {
                reason: MetaSkipReason::Malformed(err.to_string()),
            });
            return None;
        }
    };
    match raw.recognize() {
        Ok(meta) => Some(meta),
        Err(unrecognized) => {
            events.record(IngestEvent::MetaTagSkipped {
                reason: MetaSkipReason::UnrecognizedType(unrecognized.0),
            });
            None
        }
    }
}

/// Scalar visits for a visitor whose scalars all take the same path.
macro_rules! on_scalar {
    ($this:ident => $body:expr) => {
        on_scalar!(@visit $this => $body; visit_bool(bool), visit_i64(i64), visit_u64(u64), visit_f64(f64), visit_str(&str));

        fn visit_unit<E: de::Error>(self) -> Result<(), E> {
            let $this = self;
            $body
        }
    };
    (@visit $this:ident => $body:expr; $($method:ident($ty:ty)),*) => {
        $(
            fn $method<E: de::Error>(self, _value: $ty) -> Result<(), E> {
                let $this = self;
                $body
            }
        )*
    };
}

/// The top-level value. Only an object can hold tags.
struct Document<'s, 'a>(&'s mut Scan<'a>);

impl<'de> DeserializeSeed<'de> for Document<'_, '_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for Document<'_, '_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON document")
    }

    // Scalars carry no tags.
    on_scalar!(_document => Ok(()));

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let scan = self.0;
        while let Some(key) = map.next_key::<TopLevelKey>()? {
            match key {
                TopLevelKey::Data if !scan.state.data_tag_found => {
                    scan.state.data_tag_found = true;
                    map.next_value_seed(DataValue(&mut *scan))?;
                }
                TopLevelKey::Meta if scan.state.meta.is_none() => {
                    map.next_value_seed(MetaValue(&mut *scan))?;
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
            if scan.state.complete() {
                return Err(de::Error::custom(SCAN_COMPLETE));
            }
        }
        Ok(())
    }
}

/// Member name at the top level of the document.
enum TopLevelKey {
    Meta,
    Data,
    Other,
}

impl<'de> de::Deserialize<'de> for TopLevelKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl Visitor<'_> for KeyVisitor {
            type Value = TopLevelKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object key")
            }

            fn visit_str<E: de::Error>(self, key: &str) -> Result<TopLevelKey, E> {
                Ok(match key {
                    "meta" => TopLevelKey::Meta,
                    "data" => TopLevelKey::Data,
                    _ => TopLevelKey::Other,
                })
            }
        }

        deserializer.deserialize_identifier(KeyVisitor)
    }
}

/// Value of a `data` member. Only an opening bracket confirms it; the scan
/// stops right there if `meta` is already in.
struct DataValue<'s, 'a>(&'s mut Scan<'a>);

impl<'de> DeserializeSeed<'de> for DataValue<'_, '_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl DataValue<'_, '_> {
    fn reject(self) {
        self.0.state.data_tag_found = false;
    }
}

impl<'de> Visitor<'de> for DataValue<'_, '_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a data array")
    }

    on_scalar!(data => {
        data.reject();
        Ok(())
    });

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        self.reject();
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        let scan = self.0;
        scan.state.data_tag_validated = true;
        if scan.state.complete() {
            return Err(de::Error::custom(SCAN_COMPLETE));
        }
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(())
    }
}

/// Value of a `meta` member: skipped by the parser while its raw bytes are
/// recorded, then decoded on its own so a bad candidate does not end the
/// scan.
struct MetaValue<'s, 'a>(&'s mut Scan<'a>);

impl<'de> DeserializeSeed<'de> for MetaValue<'_, '_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        let scan = self.0;
        scan.trail.borrow_mut().start_recording(scan.max_meta_bytes);
        deserializer.deserialize_ignored_any(IgnoredAny)?;

        let recorded = scan.trail.borrow_mut().finish_recording();
        match recorded {
            Some(Recorded::Bytes(bytes)) => scan.state.meta = decode_meta(&bytes, scan.events),
            Some(Recorded::Oversized) => scan.events.record(IngestEvent::MetaTagSkipped {
                reason: MetaSkipReason::Oversized {
                    limit: scan.max_meta_bytes,
                },
            }),
            None => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_META_BYTES;
    use crate::events::RecordingEvents;
    use crate::types::{CollectionMethods, DataType};

    fn scan(input: &str) -> (Result<Metadata, IngestError>, RecordingEvents) {
        let events = RecordingEvents::new();
        let mut reader = input.as_bytes();
        let result = scan_tags(&mut reader, DEFAULT_MAX_META_BYTES, &events);
        (result, events)
    }

    fn reason(result: Result<Metadata, IngestError>) -> ValidationError {
        match result {
            Err(IngestError::Validation(reason)) => reason,
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn accepts_meta_then_data() {
        let (result, _) = scan(r#"{"meta":{"type":"users","methods":1,"version":5},"data":[]}"#);
        let meta = result.unwrap();
        assert_eq!(meta.data_type, DataType::Users);
        assert_eq!(meta.version, 5);
        assert_eq!(meta.methods, CollectionMethods::GROUP);
    }

    #[test]
    fn accepts_data_then_meta_with_extra_keys() {
        let (result, _) = scan(
            r#"{"extra": {"data": 1, "meta": 2}, "data": [{"a": 1}], "count": 3,
                "meta": {"type": "computers", "version": 6, "unknown": null}}"#,
        );
        assert_eq!(result.unwrap().data_type, DataType::Computers);
    }

    #[test]
    fn missing_meta() {
        let (result, _) = scan(r#"{"data":[]}"#);
        assert_eq!(reason(result), ValidationError::MetaTagNotFound);
    }

    #[test]
    fn missing_data() {
        let (result, _) = scan(r#"{"meta":{"type":"groups","version":5}}"#);
        assert_eq!(reason(result), ValidationError::DataTagNotFound);
    }

    #[test]
    fn unrecognized_category_counts_as_absent() {
        let (result, events) = scan(r#"{"meta":{"type":"bogus","version":1}}"#);
        assert_eq!(reason(result), ValidationError::NoTagFound);
        assert_eq!(
            events.skipped_meta(),
            vec![MetaSkipReason::UnrecognizedType("bogus".into())]
        );
    }

    #[test]
    fn non_array_data_is_skipped_until_a_real_one() {
        let (result, _) = scan(
            r#"{"data": "x", "meta": {"type": "ous", "version": 4}, "data": [1, 2]}"#,
        );
        assert_eq!(result.unwrap().data_type, DataType::Ous);

        let (result, _) = scan(r#"{"data": {"k": []}, "meta": {"type": "ous", "version": 4}}"#);
        assert_eq!(reason(result), ValidationError::DataTagNotFound);
    }

    #[test]
    fn malformed_meta_is_skipped_and_a_later_one_wins() {
        let (result, events) = scan(
            r#"{"meta": {"type": "users", "version": "five"},
                "meta": {"type": "domains", "version": 5}, "data": []}"#,
        );
        assert_eq!(result.unwrap().data_type, DataType::Domains);
        assert!(matches!(
            events.skipped_meta().as_slice(),
            [MetaSkipReason::Malformed(_)]
        ));
    }

    #[test]
    fn non_object_meta_is_skipped() {
        let (result, events) = scan(r#"{"meta": [1, 2], "data": []}"#);
        assert_eq!(reason(result), ValidationError::MetaTagNotFound);
        assert_eq!(events.skipped_meta().len(), 1);
    }

    #[test]
    fn nested_tags_do_not_count() {
        let (result, _) = scan(
            r#"{"wrapper": {"meta": {"type": "users", "version": 1}, "data": []}}"#,
        );
        assert_eq!(reason(result), ValidationError::NoTagFound);
    }

    #[test]
    fn top_level_array_has_no_tags() {
        let (result, _) = scan(r#"[{"meta": {"type": "users"}}, {"data": []}]"#);
        assert_eq!(reason(result), ValidationError::NoTagFound);
    }

    #[test]
    fn stops_at_first_confirmation() {
        // Everything after the opening bracket of `data` is garbage, but the
        // scan is already satisfied by then.
        let input = r#"{"meta":{"type":"azure","version":6},"data":[ not json at all"#;
        let mut reader = input.as_bytes();
        let meta = scan_tags(&mut reader, DEFAULT_MAX_META_BYTES, &RecordingEvents::new()).unwrap();
        assert_eq!(meta.data_type, DataType::Azure);
        // The parser peeks past the bracket before it unwinds.
        assert!(!reader.is_empty());
        assert!(b" not json at all".ends_with(reader));
    }

    #[test]
    fn syntax_errors_are_invalid_json() {
        for bad in [r#"{"meta" 1}"#, r#"{"data": [1,, 2]}"#, "not json", r#"{"a": "unterminated"#] {
            let (result, _) = scan(bad);
            assert!(
                matches!(reason(result), ValidationError::InvalidJson(_)),
                "{bad}"
            );
        }
    }

    #[test]
    fn truncated_document_is_classified() {
        let (result, _) = scan(r#"{"meta":{"type":"users","version":5},"data":"#);
        assert_eq!(reason(result), ValidationError::DataTagNotFound);
    }

    #[test]
    fn empty_input_has_no_tags() {
        let (result, _) = scan("");
        assert_eq!(reason(result), ValidationError::NoTagFound);
    }

    #[test]
    fn oversized_meta_is_skipped() {
        let events = RecordingEvents::new();
        let mut reader = &br#"{"meta":{"type":"users","version":5},"data":[]}"#[..];
        let result = scan_tags(&mut reader, 8, &events);
        assert_eq!(reason(result), ValidationError::MetaTagNotFound);
        assert_eq!(
            events.skipped_meta(),
            vec![MetaSkipReason::Oversized { limit: 8 }]
        );
    }

    #[test]
    fn bom_is_skipped_only_when_complete() {
        let mut reader = &b"\xEF\xBB\xBF{}"[..];
        skip_bom(&mut reader).unwrap();
        assert_eq!(reader, &b"{}"[..]);

        let mut reader = &b"{}"[..];
        skip_bom(&mut reader).unwrap();
        assert_eq!(reader, &b"{}"[..]);

        let mut reader = &b"\xEF\xBB{}"[..];
        assert!(matches!(
            skip_bom(&mut reader),
            Err(IngestError::Validation(ValidationError::InvalidJson(_)))
        ));
    }

    #[test]
    fn input_cut_inside_a_meta_value_is_invalid_json() {
        for input in [
            r#"{"data":[1],"meta":{"type":"us"#,
            r#"{"data":[1], "meta": "unterm"#,
            r#"{"data":[1],"meta":{"type":"users","#,
            r#"{"meta":{"type":"users","version":5"#,
        ] {
            let (result, _) = scan(input);
            assert!(
                matches!(reason(result), ValidationError::InvalidJson(_)),
                "{input}"
            );
        }
    }

    #[test]
    fn input_cut_inside_any_token_is_invalid_json() {
        for input in [r#"{"data":[1],"x":nul"#, r#"{"data":[1],"x":1."#, r#"{"data":[1],"ke"#] {
            let (result, _) = scan(input);
            assert!(
                matches!(reason(result), ValidationError::InvalidJson(_)),
                "{input}"
            );
        }
    }

    #[test]
    fn input_cut_between_tokens_is_classified() {
        for input in [
            r#"{"data":[1],"x":"#,
            r#"{"data":[1],"x":12"#,
            r#"{"data":[1],"x":true"#,
            r#"{"data":[1],"meta":"#,
            r#"{"data":[1],"meta": "#,
        ] {
            let (result, _) = scan(input);
            assert_eq!(reason(result), ValidationError::MetaTagNotFound, "{input}");
        }
    }

    #[test]
    fn scalar_meta_at_end_of_input_is_skipped() {
        let (result, events) = scan(r#"{"data":[1],"meta":5"#);
        assert_eq!(reason(result), ValidationError::MetaTagNotFound);
        assert!(matches!(
            events.skipped_meta().as_slice(),
            [MetaSkipReason::Malformed(_)]
        ));
    }

    #[test]
    fn trailing_value_is_invalid_json() {
        let (result, _) = scan(r#"{"data":[]} {}"#);
        assert!(matches!(reason(result), ValidationError::InvalidJson(_)));

        let (result, _) = scan("{\"data\":[]}\n\t ");
        assert_eq!(reason(result), ValidationError::MetaTagNotFound);
    }

    #[test]
    fn nesting_past_the_cap_is_invalid_json() {
        let (result, _) = scan(&"[".repeat(10_001));
        match reason(result) {
            ValidationError::InvalidJson(detail) => assert!(detail.contains("nesting"), "{detail}"),
            other => panic!("expected invalid json, got {other:?}"),
        }

        let mut doc = format!(r#"{{"extra":{}1{}"#, "[".repeat(500), "]".repeat(500));
        doc.push_str(r#","meta":{"type":"gpos","version":6},"data":[]}"#);
        let (result, _) = scan(&doc);
        assert_eq!(result.unwrap().data_type, DataType::Gpos);
    }

    #[test]
    fn meta_field_names_ignore_ascii_case() {
        let (result, _) = scan(r#"{"meta":{"Type":"users","Version":5,"METHODS":3},"data":[]}"#);
        let meta = result.unwrap();
        assert_eq!(meta.data_type, DataType::Users);
        assert_eq!(meta.version, 5);
        assert_eq!(meta.methods.bits(), 3);
    }

    #[test]
    fn duplicate_meta_fields_keep_the_last_value() {
        let (result, events) =
            scan(r#"{"meta":{"type":"bogus","type":"users","version":5},"data":[]}"#);
        assert_eq!(result.unwrap().data_type, DataType::Users);
        assert!(events.skipped_meta().is_empty());
    }

    #[test]
    fn read_errors_are_io_failures() {
        struct BrokenSource;

        impl std::io::Read for BrokenSource {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "peer went away",
                ))
            }
        }

        let mut reader = std::io::BufReader::new(std::io::Read::chain(
            &br#"{"data":[1,"#[..],
            BrokenSource,
        ));
        let result = scan_tags(&mut reader, DEFAULT_MAX_META_BYTES, &RecordingEvents::new());
        match result {
            Err(IngestError::Io { stage, source }) => {
                assert_eq!(stage, IoStage::ReadSource);
                assert_eq!(source.kind(), std::io::ErrorKind::ConnectionReset);
            }
            other => panic!("expected read failure, got {other:?}"),
        }
    }
}
