//! Loading the content of a URL.
//!
//! Plugins get the first chance (`fetch_url_content`), then the default
//! loader for the URL's scheme runs: inline content carried by the parent,
//! `data:` payloads, files through the [`Runtime`], and remote URLs through
//! HTTP.

pub mod data_url;
pub mod preserved;
pub mod remote;

pub use preserved::PreservedUrls;
pub use remote::RemoteFetcher;

use jsenv_graph::content_type;
use jsenv_graph::runtime::Runtime;
use jsenv_graph::url::{Url, UrlKind, file_url_to_path};
use jsenv_graph::{Content, UrlInfo};
use std::sync::Arc;

use crate::plugins::{FetchContext, FetchedContent, PluginList};
use crate::scenario::Scenario;
use crate::{Error, Result};

/// Where a fetch request came from, for error reporting.
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    pub importer_url: Option<String>,
    pub specifier: Option<String>,
    /// Headers of the client request that triggered the fetch (dev only).
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    plugins: Arc<PluginList>,
    runtime: Arc<dyn Runtime>,
    project_url: Url,
    scenario: Scenario,
    remote: RemoteFetcher,
}

impl Fetcher {
    pub fn new(
        plugins: Arc<PluginList>,
        runtime: Arc<dyn Runtime>,
        project_url: Url,
        scenario: Scenario,
    ) -> Self {
        Self {
            plugins,
            runtime,
            project_url,
            scenario,
            remote: RemoteFetcher::new(),
        }
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    pub async fn fetch(&self, info: &UrlInfo, request: &FetchRequest) -> Result<FetchedContent> {
        let ctx = FetchContext {
            scenario: self.scenario,
            project_url: &self.project_url,
            runtime: &self.runtime,
        };
        for plugin in self.plugins.iter() {
            if let Some(fetched) = plugin.fetch_url_content(info, &ctx).await? {
                tracing::debug!(url = %info.url, plugin = plugin.name(), "fetched by plugin");
                return Ok(fetched);
            }
        }

        if info.is_inline {
            return inline_content(info, request);
        }

        let url = Url::parse(&info.url).map_err(|_| not_found(info, request))?;
        match UrlKind::of(&url) {
            UrlKind::Data => {
                let data = data_url::decode(&info.url).map_err(|_| not_found(info, request))?;
                let is_text = content_type::is_text(&data.content_type);
                Ok(FetchedContent::new(
                    Content::from_bytes(data.bytes, is_text),
                    data.content_type,
                ))
            }
            UrlKind::File => self.fetch_file(&url, info, request).await,
            UrlKind::Http => self.fetch_remote(&url, info, request).await,
            UrlKind::Other => Err(not_found(info, request)),
        }
    }

    async fn fetch_file(
        &self,
        url: &Url,
        info: &UrlInfo,
        request: &FetchRequest,
    ) -> Result<FetchedContent> {
        let path = file_url_to_path(url).map_err(|_| not_found(info, request))?;
        let bytes = match self.runtime.read_file(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.is_not_found() => return Err(not_found(info, request)),
            Err(error) => return Err(error.into()),
        };
        let last_modified = self
            .runtime
            .metadata(&path)
            .await
            .ok()
            .and_then(|metadata| metadata.modified);
        let mime = info
            .content_type
            .clone()
            .unwrap_or_else(|| content_type::from_url(url).to_string());
        let is_text = content_type::is_text(&mime);
        Ok(
            FetchedContent::new(Content::from_bytes(bytes, is_text), mime)
                .with_last_modified(last_modified),
        )
    }

    async fn fetch_remote(
        &self,
        url: &Url,
        info: &UrlInfo,
        request: &FetchRequest,
    ) -> Result<FetchedContent> {
        let response = self
            .remote
            .fetch(url, &request.headers)
            .await
            .map_err(|e| Error::RemoteFetch {
                url: info.url.clone(),
                reason: e.to_string(),
            })?;
        if !response.is_success() {
            tracing::warn!(url = %info.url, status = response.status, "remote fetch failed");
            return Err(not_found(info, request));
        }
        let mime = response
            .content_type
            .clone()
            .unwrap_or_else(|| content_type::from_url(url).to_string());
        let is_text = content_type::is_text(&mime);
        let original_url = (response.final_url != *url).then(|| response.final_url.to_string());
        Ok(FetchedContent {
            original_url,
            ..FetchedContent::new(Content::from_bytes(response.bytes, is_text), mime)
        })
    }
}

/// Inline nodes carry the content their parent extracted.
fn inline_content(info: &UrlInfo, request: &FetchRequest) -> Result<FetchedContent> {
    let content = info
        .original_content
        .clone()
        .ok_or_else(|| not_found(info, request))?;
    let mime = info
        .content_type
        .clone()
        .unwrap_or_else(|| content_type::DEFAULT_CONTENT_TYPE.to_string());
    Ok(FetchedContent::new(content, mime))
}

fn not_found(info: &UrlInfo, request: &FetchRequest) -> Error {
    Error::ResourceNotFound {
        url: info.url.clone(),
        importer_url: request.importer_url.clone(),
        specifier: request.specifier.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{Plugin, PluginRegistry};
    use async_trait::async_trait;
    use jsenv_graph::runtime::test_utils::TestRuntime;

    fn fetcher(registry: PluginRegistry, runtime: TestRuntime) -> Fetcher {
        Fetcher::new(
            Arc::new(registry.for_scenario(Scenario::Dev)),
            Arc::new(runtime),
            Url::parse("file:///p/").unwrap(),
            Scenario::Dev,
        )
    }

    #[tokio::test]
    async fn test_file_content_and_type() {
        let runtime = TestRuntime::new("/p").with_file("/p/main.js", "export {}");
        let fetcher = fetcher(PluginRegistry::new(), runtime);
        let fetched = fetcher
            .fetch(&UrlInfo::new("file:///p/main.js"), &FetchRequest::default())
            .await
            .unwrap();
        assert_eq!(fetched.content.as_text(), Some("export {}"));
        assert_eq!(fetched.content_type, "text/javascript");
        assert!(fetched.last_modified.is_some());
    }

    #[tokio::test]
    async fn test_missing_file_reports_importer() {
        let fetcher = fetcher(PluginRegistry::new(), TestRuntime::new("/p"));
        let request = FetchRequest {
            importer_url: Some("file:///p/main.js".into()),
            specifier: Some("./missing.js".into()),
            headers: Vec::new(),
        };
        let err = fetcher
            .fetch(&UrlInfo::new("file:///p/missing.js"), &request)
            .await
            .unwrap_err();
        match err {
            Error::ResourceNotFound {
                url,
                importer_url,
                specifier,
            } => {
                assert_eq!(url, "file:///p/missing.js");
                assert_eq!(importer_url.as_deref(), Some("file:///p/main.js"));
                assert_eq!(specifier.as_deref(), Some("./missing.js"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_data_and_inline() {
        let fetcher = fetcher(PluginRegistry::new(), TestRuntime::new("/p"));
        let fetched = fetcher
            .fetch(
                &UrlInfo::new("data:text/css,body%7Bcolor:red%7D"),
                &FetchRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(fetched.content.as_text(), Some("body{color:red}"));

        let mut inline = UrlInfo::new("file:///p/index.html@L3C1-script.js");
        inline.is_inline = true;
        inline.content_type = Some("text/javascript".into());
        inline.original_content = Some(Content::from("console.log(1)"));
        let fetched = fetcher.fetch(&inline, &FetchRequest::default()).await.unwrap();
        assert_eq!(fetched.content.as_text(), Some("console.log(1)"));
        assert_eq!(fetched.content_type, "text/javascript");
    }

    #[derive(Debug)]
    struct VirtualEnv;

    #[async_trait]
    impl Plugin for VirtualEnv {
        fn name(&self) -> &str {
            "virtual-env"
        }

        async fn fetch_url_content(
            &self,
            info: &UrlInfo,
            _ctx: &FetchContext<'_>,
        ) -> Result<Option<FetchedContent>> {
            Ok((info.url == "file:///p/__env__.js")
                .then(|| FetchedContent::new("export const env = 'dev';", "text/javascript")))
        }
    }

    #[tokio::test]
    async fn test_plugin_fetch_comes_first() {
        let mut registry = PluginRegistry::new();
        registry.add(VirtualEnv);
        let fetcher = fetcher(registry, TestRuntime::new("/p"));
        let fetched = fetcher
            .fetch(&UrlInfo::new("file:///p/__env__.js"), &FetchRequest::default())
            .await
            .unwrap();
        assert!(fetched.content.as_text().unwrap().contains("dev"));
    }
}
