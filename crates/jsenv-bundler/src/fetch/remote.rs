//! HTTP(S) content fetched at build time or proxied in dev.

use jsenv_graph::url::Url;

/// Request headers passed on to the remote server. Everything else
/// (cookies, authorization) stays local.
pub const FORWARDED_HEADERS: [&str; 3] = ["accept", "accept-language", "user-agent"];

#[derive(Debug, Clone)]
pub struct RemoteResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    /// URL after redirects.
    pub final_url: Url,
}

impl RemoteResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RemoteFetcher {
    client: reqwest::Client,
}

impl RemoteFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fetch(
        &self,
        url: &Url,
        headers: &[(String, String)],
    ) -> Result<RemoteResponse, reqwest::Error> {
        let mut request = self.client.get(url.as_str());
        for (name, value) in forwardable(headers) {
            request = request.header(name, value);
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let final_url = Url::parse(response.url().as_str()).unwrap_or_else(|_| url.clone());
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok(RemoteResponse {
            status,
            content_type,
            bytes,
            final_url,
        })
    }
}

/// Keep only the headers listed in [`FORWARDED_HEADERS`].
pub fn forwardable(headers: &[(String, String)]) -> Vec<(&str, &str)> {
    headers
        .iter()
        .filter(|(name, _)| {
            FORWARDED_HEADERS
                .iter()
                .any(|allowed| name.eq_ignore_ascii_case(allowed))
        })
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_allowed_headers_are_forwarded() {
        let headers = vec![
            ("Accept".to_string(), "text/css".to_string()),
            ("Cookie".to_string(), "session=1".to_string()),
            ("User-Agent".to_string(), "test".to_string()),
            ("authorization".to_string(), "Bearer x".to_string()),
            ("accept-language".to_string(), "fr".to_string()),
        ];
        let forwarded = forwardable(&headers);
        let names: Vec<&str> = forwarded.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["Accept", "User-Agent", "accept-language"]);
    }

    #[test]
    fn test_success_range() {
        let response = RemoteResponse {
            status: 204,
            content_type: None,
            bytes: Vec::new(),
            final_url: Url::parse("https://a.com/").unwrap(),
        };
        assert!(response.is_success());
        assert!(!RemoteResponse { status: 404, ..response }.is_success());
    }
}
