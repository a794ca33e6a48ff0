pub mod error;

pub use error::{BingError, Result};

use serde::Deserialize;

const VIDEO_SEARCH_URL: &str = "https://api.bing.microsoft.com/v7.0/videos/search";

/// Results requested per query.
const RESULT_COUNT: &str = "5";

#[derive(Debug, Clone, Deserialize)]
pub struct VideoSearchResponse {
    #[serde(default)]
    pub value: Vec<Video>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "contentUrl")]
    pub content_url: Option<String>,
}

impl VideoSearchResponse {
    /// Trimmed descriptions of every result that has one.
    pub fn descriptions(&self) -> Vec<String> {
        self.value
            .iter()
            .filter_map(|v| v.description.as_deref())
            .map(|d| d.trim().to_string())
            .collect()
    }
}

pub struct BingClient {
    client: reqwest::Client,
    api_key: String,
}

impl BingClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }

    pub async fn search_videos(&self, query: &str) -> Result<VideoSearchResponse> {
        tracing::debug!(query, "Video search");
        let resp = self
            .client
            .get(VIDEO_SEARCH_URL)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .query(&[("q", query), ("count", RESULT_COUNT)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptions_skip_results_without_one() {
        let json = r#"{"value": [
            {"name": "a", "description": "  Provided to YouTube by DistroKid  "},
            {"name": "b"},
            {"name": "c", "description": "Official video"}
        ]}"#;
        let resp: VideoSearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            resp.descriptions(),
            vec!["Provided to YouTube by DistroKid", "Official video"]
        );
    }

    #[test]
    fn empty_body_has_no_results() {
        let resp: VideoSearchResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.descriptions().is_empty());
    }
}
