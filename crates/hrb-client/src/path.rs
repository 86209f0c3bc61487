//! Resource path construction and escaping.
//!
//! A collection name is one logical string that may contain `/` as a
//! hierarchy separator (e.g. `"some/collection"`). Each slash-delimited
//! segment is percent-encoded on its own and the segments are re-joined with
//! literal `/`, so a reserved character inside a segment can never turn into
//! an extra path separator. Escaping the whole name in one pass corrupts it;
//! escaping nothing lets `#` or `?` cut the path short.
//!
//! Absent parts serialize as empty segments, not omitted ones: the server
//! distinguishes `/api/<owner>//` (root collection listing) from
//! `/api/<owner>/` by the trailing double slash.

use std::borrow::Cow;

/// Top-level action of a resource path.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Action {
    Api,
    Upload,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Action::Api => "api",
            Action::Upload => "upload",
        }
    }
}

/// Build `/{action}/{owner}/{collection}/{leaf}` with every segment escaped
/// independently.
pub(crate) fn resource_path(action: Action, owner: &str, collection: &str, leaf: &str) -> String {
    format!(
        "/{}/{}/{}/{}",
        action.as_str(),
        urlencoding::encode(owner),
        encode_segments(collection),
        urlencoding::encode(leaf),
    )
}

/// Percent-encode each `/`-delimited segment of a collection name, keeping
/// the separators themselves literal.
fn encode_segments(name: &str) -> String {
    name.split('/')
        .map(|segment| urlencoding::encode(segment))
        .collect::<Vec<_>>()
        .join("/")
}

/// Append a query string to `path`. A `Some` value serializes as `k=v` with
/// the value escaped; `None` serializes the bare key, used for flag
/// parameters like `json`.
pub(crate) fn query_url(path: &str, params: &[(&str, Option<&str>)]) -> String {
    let mut url = String::from(path);
    for (i, (key, value)) in params.iter().enumerate() {
        url.push(if i == 0 { '?' } else { '&' });
        url.push_str(&urlencoding::encode(key));
        if let Some(value) = value {
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
    }
    url
}

/// Percent-decode one path or header component. `None` if the escapes do not
/// decode to valid UTF-8.
pub(crate) fn decode_component(component: &str) -> Option<String> {
    urlencoding::decode(component).ok().map(Cow::into_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_path() {
        assert_eq!(
            resource_path(Action::Api, "sumsum", "holiday", "abc123"),
            "/api/sumsum/holiday/abc123"
        );
    }

    #[test]
    fn root_collection_listing_keeps_empty_segments() {
        assert_eq!(resource_path(Action::Api, "sumsum", "", ""), "/api/sumsum//");
    }

    #[test]
    fn slash_in_collection_name_stays_a_separator() {
        assert_eq!(
            resource_path(Action::Api, "sumsum", "some/collection", ""),
            "/api/sumsum/some/collection/"
        );
    }

    #[test]
    fn reserved_characters_are_escaped_per_segment() {
        assert_eq!(
            resource_path(Action::Upload, "sumsum", "a b/c?d", "x&y.jpg"),
            "/upload/sumsum/a%20b/c%3Fd/x%26y.jpg"
        );
    }

    #[test]
    fn unicode_round_trip() {
        for name in ["女神ハイリア", "初雪の大魔女・リーチェ.jpg", "happy😆faces😄.jpg", "派石😊.jpg"] {
            let encoded = encode_segments(name);
            assert!(encoded.is_ascii());
            assert_eq!(decode_component(&encoded).as_deref(), Some(name));
        }
    }

    #[test]
    fn nested_unicode_collection() {
        let path = resource_path(Action::Api, "sumsum", "相簿/夏天", "");
        assert_eq!(path, "/api/sumsum/%E7%9B%B8%E7%B0%BF/%E5%A4%8F%E5%A4%A9/");
    }

    #[test]
    fn query_values_and_flags() {
        assert_eq!(
            query_url("/query/collection", &[("user", Some("sumsum")), ("json", None)]),
            "/query/collection?user=sumsum&json"
        );
        assert_eq!(query_url("/query/blob", &[]), "/query/blob");
        assert_eq!(
            query_url("/query/blob", &[("id", Some("ff00")), ("owner", Some("a b"))]),
            "/query/blob?id=ff00&owner=a%20b"
        );
    }

    #[test]
    fn invalid_escapes_do_not_decode() {
        assert_eq!(decode_component("%ff%fe"), None);
    }
}
