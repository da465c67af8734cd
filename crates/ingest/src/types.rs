//! Core data model for upload staging.
//!
//! These types describe what a caller declares about an upload and what the
//! validator hands back once the payload has been confirmed.
//!
//! ```text
//! FileType (declared by caller)
//! ├── Invalid              never reaches the pipeline
//! ├── StructuredDocument   JSON with top-level `meta` + `data`
//! └── Archive              zip, signature-checked only
//!
//! Metadata (decoded from the `meta` member)
//! ├── data_type: DataType          closed set of categories
//! ├── methods: CollectionMethods   opaque bit set
//! └── version: i64
//! ```
use std::fmt;
use std::str::FromStr;

use serde::de::{Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

/// Caller-asserted category of an upload, usually derived from the
/// `Content-Type` header via [`file_type_for_content_type`](crate::file_type_for_content_type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Invalid,
    StructuredDocument,
    Archive,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Invalid => "invalid",
            FileType::StructuredDocument => "structured_document",
            FileType::Archive => "archive",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recognized data categories for the `meta.type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Sessions,
    Users,
    Groups,
    Computers,
    Gpos,
    Ous,
    Domains,
    Deleted,
    Containers,
    LocalGroups,
    AiaCas,
    RootCas,
    EnterpriseCas,
    NtAuthStores,
    CertTemplates,
    Azure,
    IssuancePolicies,
}

impl DataType {
    pub const ALL: [DataType; 17] = [
        DataType::Sessions,
        DataType::Users,
        DataType::Groups,
        DataType::Computers,
        DataType::Gpos,
        DataType::Ous,
        DataType::Domains,
        DataType::Deleted,
        DataType::Containers,
        DataType::LocalGroups,
        DataType::AiaCas,
        DataType::RootCas,
        DataType::EnterpriseCas,
        DataType::NtAuthStores,
        DataType::CertTemplates,
        DataType::Azure,
        DataType::IssuancePolicies,
    ];

    /// Wire name as it appears in `meta.type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Sessions => "sessions",
            DataType::Users => "users",
            DataType::Groups => "groups",
            DataType::Computers => "computers",
            DataType::Gpos => "gpos",
            DataType::Ous => "ous",
            DataType::Domains => "domains",
            DataType::Deleted => "deleted",
            DataType::Containers => "containers",
            DataType::LocalGroups => "localgroups",
            DataType::AiaCas => "aiacas",
            DataType::RootCas => "rootcas",
            DataType::EnterpriseCas => "enterprisecas",
            DataType::NtAuthStores => "ntauthstores",
            DataType::CertTemplates => "certtemplates",
            DataType::Azure => "azure",
            DataType::IssuancePolicies => "issuancepolicies",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a category name is outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized data type {0:?}")]
pub struct UnrecognizedDataType(pub String);

impl FromStr for DataType {
    type Err = UnrecognizedDataType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL
            .iter()
            .copied()
            .find(|candidate| candidate.as_str() == s)
            .ok_or_else(|| UnrecognizedDataType(s.to_string()))
    }
}

/// Collection flags carried in `meta.methods`.
///
/// The value is opaque to validation; named flags exist for callers that want
/// to inspect it. Unknown bits are kept as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionMethods(pub u64);

impl CollectionMethods {
    pub const GROUP: Self = Self(1 << 0);
    pub const LOCAL_ADMIN: Self = Self(1 << 1);
    pub const GPO_LOCAL_GROUP: Self = Self(1 << 2);
    pub const SESSION: Self = Self(1 << 3);
    pub const LOGGED_ON: Self = Self(1 << 4);
    pub const TRUSTS: Self = Self(1 << 5);
    pub const ACL: Self = Self(1 << 6);
    pub const CONTAINER: Self = Self(1 << 7);
    pub const RDP: Self = Self(1 << 8);
    pub const OBJECT_PROPS: Self = Self(1 << 9);
    pub const SESSION_LOOP: Self = Self(1 << 10);
    pub const LOGGED_ON_LOOP: Self = Self(1 << 11);
    pub const DCOM: Self = Self(1 << 12);
    pub const SPN_TARGETS: Self = Self(1 << 13);
    pub const PS_REMOTE: Self = Self(1 << 14);
    pub const USER_RIGHTS: Self = Self(1 << 15);
    pub const CA_REGISTRY: Self = Self(1 << 16);
    pub const DC_REGISTRY: Self = Self(1 << 17);
    pub const CERT_SERVICES: Self = Self(1 << 18);

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for CollectionMethods {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Decoded `meta` member of a structured upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub methods: CollectionMethods,
    pub version: i64,
}

/// Lenient wire shape used while scanning.
///
/// Field names match without regard to ASCII case and a repeated field keeps
/// its last value. `null` leaves a field as it was. Missing numeric fields
/// default to zero and unknown fields are ignored; the category is checked
/// separately so an unknown name is distinguishable from a shape error.
#[derive(Debug, Default)]
pub(crate) struct RawMetadata {
    pub data_type: Option<String>,
    pub methods: u64,
    pub version: i64,
}

impl RawMetadata {
    pub(crate) fn recognize(self) -> Result<Metadata, UnrecognizedDataType> {
        let name = self.data_type.unwrap_or_default();
        let data_type = name.parse::<DataType>()?;
        Ok(Metadata {
            data_type,
            methods: CollectionMethods(self.methods),
            version: self.version,
        })
    }
}

impl<'de> Deserialize<'de> for RawMetadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RawMetadataVisitor;

        impl<'de> Visitor<'de> for RawMetadataVisitor {
            type Value = RawMetadata;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a meta object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawMetadata, A::Error> {
                let mut raw = RawMetadata::default();
                while let Some(key) = map.next_key::<String>()? {
                    if key.eq_ignore_ascii_case("type") {
                        if let Some(name) = map.next_value::<Option<String>>()? {
                            raw.data_type = Some(name);
                        }
                    } else if key.eq_ignore_ascii_case("methods") {
                        if let Some(methods) = map.next_value::<Option<u64>>()? {
                            raw.methods = methods;
                        }
                    } else if key.eq_ignore_ascii_case("version") {
                        if let Some(version) = map.next_value::<Option<i64>>()? {
                            raw.version = version;
                        }
                    } else {
                        map.next_value::<IgnoredAny>()?;
                    }
                }
                Ok(raw)
            }
        }

        deserializer.deserialize_map(RawMetadataVisitor)
    }
}
