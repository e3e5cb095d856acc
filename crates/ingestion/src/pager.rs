//! Paginated metadata search
//!
//! Walks the repository's advanced-search endpoint one page at a time. Every
//! attempt goes through the shared [`RequestPacer`]. Failed attempts are
//! retried with exponential backoff until the configured time budget is
//! spent; after that the page is reported as failed and the harvester stops
//! the source.

use crate::errors::IngestionError;
use crate::rate_limit::RequestPacer;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoffBuilder};
use repoharvest_common::config::HarvestConfig;
use repoharvest_common::metrics;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// One page of search results
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub items: Vec<RawRecord>,
    /// `page < numberOfPages` as reported by the server
    pub has_more: bool,
    pub total_pages: u32,
}

/// Source of paginated metadata records
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_page(&self, source_id: &str, page: u32) -> Result<SearchPage, IngestionError>;
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub results: Vec<RawRecord>,

    #[serde(rename = "pagingInfo")]
    pub paging_info: PagingInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingInfo {
    #[serde(rename = "numberOfPages", deserialize_with = "de::flexible_int")]
    pub number_of_pages: u32,
}

/// A search result as served by the repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "ID", deserialize_with = "de::flexible_int")]
    pub id: i64,

    #[serde(rename = "Naslov", default, deserialize_with = "de::null_as_default")]
    pub title: String,

    #[serde(rename = "LetoIzida", default, deserialize_with = "de::optional_int")]
    pub year: Option<i32>,

    #[serde(rename = "IzpisPolniUrl", default)]
    pub display_url: Option<String>,

    #[serde(rename = "Osebe", default, deserialize_with = "de::null_as_default")]
    pub authors: Vec<RawAuthor>,

    #[serde(rename = "Organizacije", default, deserialize_with = "de::null_as_default")]
    pub affiliations: Vec<RawAffiliation>,

    #[serde(rename = "Datoteke", default, deserialize_with = "de::null_as_default")]
    pub files: Vec<RawFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAuthor {
    #[serde(rename = "Ime", default, deserialize_with = "de::null_as_default")]
    pub name: String,

    #[serde(rename = "Priimek", default, deserialize_with = "de::null_as_default")]
    pub surname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAffiliation {
    #[serde(rename = "OrganizacijaID", deserialize_with = "de::flexible_int")]
    pub id: i64,

    /// Full name
    #[serde(rename = "Naziv", default, deserialize_with = "de::null_as_default")]
    pub long_name: String,

    /// Abbreviation
    #[serde(rename = "Kratica", default, deserialize_with = "de::null_as_default")]
    pub short_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFile {
    #[serde(rename = "ID", deserialize_with = "de::flexible_int")]
    pub id: i64,

    #[serde(rename = "PrenosPolniUrl", default, deserialize_with = "de::null_as_default")]
    pub download_url: String,
}

/// Lenient deserializers: the endpoint is loose about nulls and sometimes
/// sends numbers as strings
mod de {
    use serde::de::{self, Deserialize, Deserializer};
    use serde_json::Value;

    pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + Deserialize<'de>,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    fn int_from_value<T, E>(value: &Value) -> Result<Option<T>, E>
    where
        T: TryFrom<i64>,
        E: de::Error,
    {
        let parsed = match value {
            Value::Null => return Ok(None),
            Value::Number(n) => n.as_i64(),
            Value::String(s) if s.trim().is_empty() => return Ok(None),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };

        parsed
            .and_then(|n| T::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| E::custom(format!("expected an integer, got {}", value)))
    }

    pub fn flexible_int<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<i64>,
    {
        let value = Value::deserialize(deserializer)?;
        int_from_value::<T, D::Error>(&value)?.ok_or_else(|| de::Error::custom("missing integer"))
    }

    pub fn optional_int<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<i64>,
    {
        let value = Value::deserialize(deserializer)?;
        int_from_value::<T, D::Error>(&value)
    }
}

// ============================================================================
// HTTP pager
// ============================================================================

/// Search pager for the repository's `getAdvancedSearch` command
pub struct SearchPager {
    client: reqwest::Client,
    pacer: RequestPacer,
    search_url: String,
    work_type: u32,
    language: u32,
    full_text_only: bool,
    retry_initial: Duration,
    retry_max_elapsed: Duration,
}

impl SearchPager {
    pub fn new(client: reqwest::Client, pacer: RequestPacer, config: &HarvestConfig) -> Self {
        Self {
            client,
            pacer,
            search_url: config.search_url.clone(),
            work_type: config.work_type,
            language: config.language,
            full_text_only: config.full_text_only,
            retry_initial: config.fetch_retry_initial(),
            retry_max_elapsed: config.fetch_retry_max_elapsed(),
        }
    }

    fn query_params(&self, source_id: &str, page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("cmd", "getAdvancedSearch".to_string()),
            ("source", source_id.to_string()),
            ("workType", self.work_type.to_string()),
            ("language", self.language.to_string()),
            ("fullTextOnly", u8::from(self.full_text_only).to_string()),
            ("page", page.to_string()),
        ]
    }

    async fn fetch_once(&self, source_id: &str, page: u32) -> Result<SearchResponse, reqwest::Error> {
        self.pacer.acquire().await;

        self.client
            .get(&self.search_url)
            .query(&self.query_params(source_id, page))
            .send()
            .await?
            .error_for_status()?
            .json::<SearchResponse>()
            .await
    }
}

/// Client errors other than 429 will not fix themselves
fn is_permanent(error: &reqwest::Error) -> bool {
    error
        .status()
        .map(|s| s.is_client_error() && s.as_u16() != 429)
        .unwrap_or(false)
}

#[async_trait]
impl MetadataSource for SearchPager {
    #[instrument(skip(self))]
    async fn fetch_page(&self, source_id: &str, page: u32) -> Result<SearchPage, IngestionError> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.retry_initial)
            .with_max_elapsed_time(Some(self.retry_max_elapsed))
            .build();

        let response = retry(policy, || async move {
            self.fetch_once(source_id, page).await.map_err(|e| {
                if is_permanent(&e) {
                    return backoff::Error::permanent(e);
                }
                warn!(error = %e, "Search request failed, will retry");
                metrics::record_fetch_retry(source_id);
                backoff::Error::transient(e)
            })
        })
        .await
        .map_err(|e| IngestionError::FetchError {
            source_id: source_id.to_string(),
            page,
            message: e.to_string(),
        })?;

        metrics::record_page_fetched(source_id);

        let total_pages = response.paging_info.number_of_pages;
        debug!(items = response.results.len(), total_pages, "Search page fetched");

        Ok(SearchPage {
            items: response.results,
            has_more: page < total_pages,
            total_pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_response() {
        let body = serde_json::json!({
            "results": [{
                "ID": 151234,
                "Naslov": "Analiza omrežij",
                "LetoIzida": "2021",
                "IzpisPolniUrl": "https://repo.example/IzpisGradiva.php?id=151234",
                "Osebe": [{"Ime": "Ana", "Priimek": "Novak"}],
                "Organizacije": [{"OrganizacijaID": "25", "Naziv": "Fakulteta za računalništvo in informatiko", "Kratica": "FRI"}],
                "Datoteke": [{"ID": 99, "PrenosPolniUrl": "https://repo.example/Dokument.php?id=99"}]
            }, {
                "ID": "151235",
                "Naslov": null,
                "LetoIzida": null,
                "Osebe": null,
                "Organizacije": [],
                "Datoteke": null
            }],
            "pagingInfo": {"numberOfPages": 12}
        });

        let response: SearchResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.paging_info.number_of_pages, 12);
        assert_eq!(response.results.len(), 2);

        let first = &response.results[0];
        assert_eq!(first.id, 151234);
        assert_eq!(first.year, Some(2021));
        assert_eq!(first.affiliations[0].id, 25);
        assert_eq!(first.affiliations[0].short_name, "FRI");
        assert_eq!(first.files[0].id, 99);

        let second = &response.results[1];
        assert_eq!(second.id, 151235);
        assert_eq!(second.title, "");
        assert_eq!(second.year, None);
        assert!(second.authors.is_empty());
        assert!(second.files.is_empty());
    }

    #[test]
    fn test_reject_non_numeric_id() {
        let body = serde_json::json!({"ID": "abc", "Naslov": "x"});
        assert!(serde_json::from_value::<RawRecord>(body).is_err());
    }

    #[test]
    fn test_query_params() {
        let pager = SearchPager::new(
            reqwest::Client::new(),
            RequestPacer::unlimited(),
            &HarvestConfig::default(),
        );
        let params = pager.query_params("25", 3);
        assert!(params.contains(&("cmd", "getAdvancedSearch".to_string())));
        assert!(params.contains(&("source", "25".to_string())));
        assert!(params.contains(&("fullTextOnly", "1".to_string())));
        assert!(params.contains(&("page", "3".to_string())));
    }
}
