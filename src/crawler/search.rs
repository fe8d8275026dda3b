//! Keyword search against the mirror search API
//!
//! `GET {endpoint}/user/search.html?q=<keyword>&so=undefined`, answered with
//! a JSON list of hits. A bare `1` body is the mirror's "nothing found"
//! sentinel.

use crate::crawler::single::{Lookup, LookupRequest};
use crate::state::Endpoint;
use crate::storage::search_key;
use crate::FetchError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

const SEARCH_PATH: &str = "/user/search.html";
const REFERER_PATH: &str = "/s";
const EMPTY_SENTINEL: &str = "1";

/// One search result as served by the mirrors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub articlename: String,
    #[serde(default)]
    pub author: String,
    /// Path of the novel's catalog page
    #[serde(default)]
    pub url_list: String,
    #[serde(default)]
    pub url_img: String,
    #[serde(default)]
    pub intro: String,
}

/// Search lookup for one keyword
#[derive(Debug, Clone)]
pub struct SearchLookup {
    keyword: String,
}

impl SearchLookup {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into().trim().to_string(),
        }
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }
}

impl Lookup for SearchLookup {
    type Output = Vec<SearchHit>;

    fn cache_key(&self) -> String {
        search_key(&self.keyword)
    }

    fn request(&self, endpoint: &Endpoint) -> Result<LookupRequest, FetchError> {
        let build_error = |e: url::ParseError| FetchError::Transport {
            url: endpoint.to_string(),
            message: e.to_string(),
        };

        let mut url = endpoint.resolve(SEARCH_PATH).map_err(build_error)?;
        url.query_pairs_mut()
            .append_pair("q", &self.keyword)
            .append_pair("so", "undefined");

        let mut referer = endpoint.resolve(REFERER_PATH).map_err(build_error)?;
        referer.query_pairs_mut().append_pair("q", &self.keyword);

        Ok(LookupRequest {
            url,
            headers: vec![("referer".to_string(), referer.to_string())],
        })
    }

    fn decode(&self, body: &str, url: &Url, _endpoint: &Endpoint) -> Result<Vec<SearchHit>, FetchError> {
        decode_hits(body, url.as_str())
    }
}

/// Decodes a search API body
///
/// # Returns
///
/// * `Ok(Vec<SearchHit>)` - At least one hit
/// * `Err(FetchError::EmptySentinel)` - `1`, an empty list, an empty object or `null`
/// * `Err(FetchError::Decode)` - Anything that is not a hit list
pub fn decode_hits(body: &str, url: &str) -> Result<Vec<SearchHit>, FetchError> {
    let body = body.trim();
    let empty = || FetchError::EmptySentinel {
        url: url.to_string(),
    };
    let decode_error = |message: String| FetchError::Decode {
        url: url.to_string(),
        message,
    };

    if body == EMPTY_SENTINEL {
        return Err(empty());
    }

    let value: Value = serde_json::from_str(body).map_err(|e| decode_error(e.to_string()))?;
    let hits = match value {
        Value::Null => return Err(empty()),
        Value::Array(items) if items.is_empty() => return Err(empty()),
        Value::Object(map) if map.is_empty() => return Err(empty()),
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value::<SearchHit>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| decode_error(e.to_string()))?,
        object @ Value::Object(_) => {
            vec![serde_json::from_value::<SearchHit>(object).map_err(|e| decode_error(e.to_string()))?]
        }
        other => return Err(decode_error(format!("unexpected JSON {}", other))),
    };

    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://www.mirror.cfd/user/search.html?q=x";

    #[test]
    fn test_request_layout() {
        let endpoint = Endpoint::parse("https://www.mirror.cfd").unwrap();
        let request = SearchLookup::new(" 剑来 ").request(&endpoint).unwrap();

        assert_eq!(request.url.path(), "/user/search.html");
        let pairs: Vec<(String, String)> = request.url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("q".to_string(), "剑来".to_string()),
                ("so".to_string(), "undefined".to_string())
            ]
        );
        let (name, referer) = &request.headers[0];
        assert_eq!(name, "referer");
        assert!(referer.starts_with("https://www.mirror.cfd/s?q="));
    }

    #[test]
    fn test_decode_hits() {
        let body = r#"[{"articlename":"剑来","author":"烽火戏诸侯","url_list":"/book/1/","url_img":"/img/1.jpg","intro":"大千世界"}]"#;
        let hits = decode_hits(body, URL).unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].articlename, "剑来");
        assert_eq!(hits[0].url_list, "/book/1/");
    }

    #[test]
    fn test_decode_sentinels() {
        for body in ["1", " 1\n", "[]", "{}", "null"] {
            assert!(
                matches!(decode_hits(body, URL), Err(FetchError::EmptySentinel { .. })),
                "body {:?} should be the empty sentinel",
                body
            );
        }
    }

    #[test]
    fn test_decode_malformed() {
        for body in ["<html>blocked</html>", "[1, 2]", "\"text\"", ""] {
            assert!(
                matches!(decode_hits(body, URL), Err(FetchError::Decode { .. })),
                "body {:?} should be a decode error",
                body
            );
        }
    }

    #[test]
    fn test_cache_key_ignores_surrounding_whitespace() {
        assert_eq!(
            SearchLookup::new("剑来").cache_key(),
            SearchLookup::new(" 剑来").cache_key()
        );
    }
}
