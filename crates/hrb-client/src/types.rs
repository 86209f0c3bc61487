//! View models parsed from service responses.
//!
//! These are point-in-time snapshots: the service holds the truth, and a
//! value here is only as fresh as the response that produced it.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Number of hex digits in a blob id.
const ID_DIGITS: usize = 40;

/// Visibility tier of a blob.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Readable by the owner only.
    #[default]
    Private,
    /// Readable by any authenticated user.
    Shared,
    /// Readable by anyone, and listed by the public blob query.
    Public,
}

impl Permission {
    /// Wire representation, as used in `perm=` form fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Private => "private",
            Permission::Shared => "shared",
            Permission::Public => "public",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "private" => Ok(Permission::Private),
            "shared" => Ok(Permission::Shared),
            "public" => Ok(Permission::Public),
            other => Err(Error::BadRequest(format!("unknown permission: {other}"))),
        }
    }
}

/// Content identifier assigned by the service: 40 lowercase hex digits.
///
/// The client never computes one; ids are only extracted from responses.
/// Anything that is not exactly 40 hex digits is a collection name as far as
/// the service is concerned, never a malformed id.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct BlobId(String);

impl BlobId {
    /// Validate a blob id, normalizing to lowercase.
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() == ID_DIGITS && hex::decode(s).is_ok() {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(Error::BadRequest(format!("not a blob id: {s:?}")))
        }
    }

    /// Extract the id from the trailing digits of a `Location` path.
    pub(crate) fn from_location(location: &str) -> Result<Self> {
        let tail = location
            .len()
            .checked_sub(ID_DIGITS)
            .and_then(|start| location.get(start..))
            .ok_or_else(|| {
                Error::InvalidResponse(format!("location too short for a blob id: {location}"))
            })?;
        Self::parse(tail)
            .map_err(|_| Error::InvalidResponse(format!("no blob id at end of location: {location}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BlobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A stored binary object.
///
/// `data` is populated only by the blob-content operations; listings leave
/// it `None`. Conversely the content operations cannot see `timestamp` and
/// `permission`, which only appear in listings.
#[derive(Clone, Debug)]
pub struct Blob {
    /// Content identifier.
    pub id: BlobId,
    /// Original upload name, recovered percent-decoded.
    pub filename: Option<String>,
    /// Content type as reported by the service.
    pub mime: String,
    /// Service-assigned creation time.
    pub timestamp: Option<DateTime<Utc>>,
    /// Visibility tier.
    pub permission: Option<Permission>,
    /// Raw content.
    pub data: Option<Bytes>,
}

/// One row of the collection listing: name, owner and cover, no elements.
#[derive(Clone, Debug)]
pub struct CollectionInfo {
    /// `/`-separated hierarchical name; empty for the root collection.
    pub name: String,
    /// Owning user.
    pub owner: String,
    /// Cover blob, if one is set. Always a member of this collection.
    pub cover: Option<BlobId>,
}

/// Full collection detail, including its member blobs.
#[derive(Clone, Debug)]
pub struct Collection {
    /// `/`-separated hierarchical name; empty for the root collection.
    pub name: String,
    /// Owning user.
    pub owner: String,
    /// Cover blob, if one is set.
    pub cover: Option<BlobId>,
    /// Member blobs keyed by id.
    pub elements: HashMap<BlobId, Blob>,
}

impl Collection {
    /// Look up a member blob.
    pub fn blob(&self, id: &BlobId) -> Option<&Blob> {
        self.elements.get(id)
    }

    pub fn contains(&self, id: &BlobId) -> bool {
        self.elements.contains_key(id)
    }
}

/// A scoped, anonymous, read-only share link.
///
/// The trailing token of the link is the auth key; presenting it on read
/// paths of the collection it was created for grants access as if by an
/// authenticated viewer scoped to that collection.
#[derive(Clone, Debug)]
pub struct ShareLink {
    url: String,
}

impl ShareLink {
    pub(crate) fn new(url: String) -> Self {
        Self { url }
    }

    /// The full share URL as issued by the service.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The auth key: the `auth` query parameter if the link carries one,
    /// otherwise the last path segment.
    pub fn auth_key(&self) -> &str {
        let (path, query) = match self.url.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (self.url.as_str(), None),
        };
        if let Some(query) = query {
            for pair in query.split('&') {
                if let Some(key) = pair.strip_prefix("auth=") {
                    return key;
                }
            }
        }
        path.rsplit('/').next().unwrap_or(path)
    }
}

// ==================== Wire formats ====================

#[derive(Debug, Deserialize)]
pub(crate) struct CollectionListWire {
    pub colls: Vec<CollectionEntryWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CollectionEntryWire {
    pub coll: String,
    #[serde(default)]
    pub cover: Option<String>,
    pub owner: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CollectionDetailWire {
    #[serde(default)]
    pub username: Option<String>,
    pub collection: String,
    pub owner: String,
    #[serde(default)]
    pub meta: CollectionMetaWire,
    #[serde(default)]
    pub elements: HashMap<String, ElementWire>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CollectionMetaWire {
    #[serde(default)]
    pub cover: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ElementWire {
    #[serde(default)]
    pub filename: Option<String>,
    pub mime: String,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub perm: Option<Permission>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BlobSetWire {
    #[serde(default)]
    pub elements: HashMap<String, ElementWire>,
}

fn parse_cover(cover: Option<String>) -> Result<Option<BlobId>> {
    match cover.as_deref() {
        None | Some("") => Ok(None),
        Some(id) => BlobId::parse(id)
            .map(Some)
            .map_err(|_| Error::InvalidResponse(format!("malformed cover id: {id}"))),
    }
}

impl TryFrom<CollectionEntryWire> for CollectionInfo {
    type Error = Error;

    fn try_from(wire: CollectionEntryWire) -> Result<Self> {
        Ok(Self {
            name: wire.coll,
            owner: wire.owner,
            cover: parse_cover(wire.cover)?,
        })
    }
}

impl TryFrom<CollectionDetailWire> for Collection {
    type Error = Error;

    fn try_from(wire: CollectionDetailWire) -> Result<Self> {
        Ok(Self {
            name: wire.collection,
            owner: wire.owner,
            cover: parse_cover(wire.meta.cover)?,
            elements: blobs_from_elements(wire.elements)?,
        })
    }
}

/// Convert a listing's `elements` object into view-model blobs keyed by id.
pub(crate) fn blobs_from_elements(
    elements: HashMap<String, ElementWire>,
) -> Result<HashMap<BlobId, Blob>> {
    elements
        .into_iter()
        .map(|(id, element)| {
            let id = BlobId::parse(&id)
                .map_err(|_| Error::InvalidResponse(format!("malformed blob id in listing: {id}")))?;
            let blob = Blob {
                id: id.clone(),
                filename: element.filename,
                mime: element.mime,
                timestamp: element.timestamp.and_then(|secs| DateTime::from_timestamp(secs, 0)),
                permission: element.perm,
                data: None,
            };
            Ok((id, blob))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn blob_id_accepts_40_hex_digits() {
        let id = BlobId::parse(ID).unwrap();
        assert_eq!(id.as_str(), ID);
    }

    #[test]
    fn blob_id_normalizes_case() {
        let id = BlobId::parse(&ID.to_uppercase()).unwrap();
        assert_eq!(id.as_str(), ID);
    }

    #[test]
    fn short_or_funny_strings_are_not_blob_ids() {
        // these are collection names, not malformed ids
        assert!(BlobId::parse("FF0000000000000000FF").is_err());
        assert!(BlobId::parse("0L00000000000000000PP0000000000000000003").is_err());
        assert!(BlobId::parse("").is_err());
    }

    #[test]
    fn id_from_location_tail() {
        let location = format!("/api/sumsum/holiday/{ID}");
        assert_eq!(BlobId::from_location(&location).unwrap().as_str(), ID);

        assert!(BlobId::from_location("/api/short").is_err());
        // non-ASCII tail must not panic on char boundaries
        assert!(BlobId::from_location("/api/sumsum/女神ハイリア/女神ハイリア女神ハイリア女神").is_err());
    }

    #[test]
    fn permission_round_trip() {
        for perm in [Permission::Private, Permission::Shared, Permission::Public] {
            assert_eq!(perm.as_str().parse::<Permission>().unwrap(), perm);
        }
        assert!("protected".parse::<Permission>().is_err());
    }

    #[test]
    fn parse_collection_list() {
        let json = r#"{"colls": [
            {"coll": "", "cover": "", "owner": "sumsum"},
            {"coll": "some/collection", "cover": "0123456789abcdef0123456789abcdef01234567", "owner": "sumsum"}
        ]}"#;
        let wire: CollectionListWire = serde_json::from_str(json).unwrap();
        let infos: Vec<CollectionInfo> = wire
            .colls
            .into_iter()
            .map(CollectionInfo::try_from)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].name, "");
        assert_eq!(infos[0].cover, None);
        assert_eq!(infos[1].name, "some/collection");
        assert_eq!(infos[1].cover.as_ref().unwrap().as_str(), ID);
    }

    #[test]
    fn parse_collection_detail() {
        let json = format!(
            r#"{{
                "username": "sumsum",
                "collection": "holiday",
                "owner": "sumsum",
                "meta": {{"cover": "{ID}"}},
                "elements": {{
                    "{ID}": {{"filename": "lena.jpg", "mime": "image/jpeg", "timestamp": 1537592400, "perm": "public"}}
                }}
            }}"#
        );
        let wire: CollectionDetailWire = serde_json::from_str(&json).unwrap();
        assert_eq!(wire.username.as_deref(), Some("sumsum"));

        let coll = Collection::try_from(wire).unwrap();
        assert_eq!(coll.name, "holiday");
        assert_eq!(coll.owner, "sumsum");
        assert_eq!(coll.cover.as_ref().unwrap().as_str(), ID);

        let blob = coll.blob(&BlobId::parse(ID).unwrap()).unwrap();
        assert_eq!(blob.filename.as_deref(), Some("lena.jpg"));
        assert_eq!(blob.mime, "image/jpeg");
        assert_eq!(blob.permission, Some(Permission::Public));
        assert_eq!(blob.timestamp.unwrap().timestamp(), 1537592400);
        assert!(blob.data.is_none());
    }

    #[test]
    fn detail_without_username_or_meta_is_valid() {
        // the third-party view omits the owner-identifying field
        let json = r#"{"collection": "holiday", "owner": "sumsum", "elements": {}}"#;
        let wire: CollectionDetailWire = serde_json::from_str(json).unwrap();
        assert_eq!(wire.username, None);

        let coll = Collection::try_from(wire).unwrap();
        assert_eq!(coll.cover, None);
        assert!(coll.elements.is_empty());
    }

    #[test]
    fn malformed_listing_id_is_rejected() {
        let json = r#"{"collection": "c", "owner": "o", "elements": {"nothex": {"mime": "image/png"}}}"#;
        let wire: CollectionDetailWire = serde_json::from_str(json).unwrap();
        match Collection::try_from(wire) {
            Err(Error::InvalidResponse(_)) => {}
            other => panic!("expected InvalidResponse, got {other:?}"),
        }
    }

    #[test]
    fn share_link_key_extraction() {
        let with_query =
            ShareLink::new("https://example.com/view/sumsum/holiday?auth=a1b2c3d4".into());
        assert_eq!(with_query.auth_key(), "a1b2c3d4");

        let path_only = ShareLink::new("https://example.com/share/a1b2c3d4".into());
        assert_eq!(path_only.auth_key(), "a1b2c3d4");
    }
}
