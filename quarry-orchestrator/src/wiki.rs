//! Wiki markup rendering.

use crate::orchestrator::Orchestrator;
use quarry_core::{ProjectId, QuarryResult, WikiRendering};
use quarry_transport::TransportRequest;
use serde_json::json;

impl Orchestrator {
    /// Render wiki markup to HTML in the context of a project.
    ///
    /// Exactly one call. The rendering depends on project state the cache
    /// cannot track, so it is never cached and invalidates nothing.
    #[tracing::instrument(skip(self, content), fields(content_len = content.len()))]
    pub async fn convert_wiki_to_html(
        &self,
        project_id: ProjectId,
        content: &str,
    ) -> QuarryResult<WikiRendering> {
        let response = self
            .call(TransportRequest::post(
                format!("/v3/projects/{}/wiki2html", project_id),
                json!({ "content": content }),
            ))
            .await?;

        let html = response
            .get("html")
            .and_then(|html| html.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(WikiRendering { project_id, html })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReadOptions;
    use quarry_test_utils::{test_config, MockTransport};
    use quarry_transport::Method;
    use std::sync::Arc;

    fn setup() -> (Arc<MockTransport>, Orchestrator) {
        let mock = Arc::new(MockTransport::new());
        let orch = Orchestrator::with_transport(&test_config(), mock.clone()).unwrap();
        (mock, orch)
    }

    #[tokio::test(start_paused = true)]
    async fn test_wiki_is_one_uncached_call() {
        let (mock, orch) = setup();
        mock.on(
            Method::Post,
            "/v3/projects/4/wiki2html",
            json!({"html": "<p><b>bold</b></p>"}),
        );

        for _ in 0..2 {
            let rendered = orch
                .convert_wiki_to_html(ProjectId::new(4), "__bold__")
                .await
                .unwrap();
            assert_eq!(rendered.html, "<p><b>bold</b></p>");
        }

        assert_eq!(mock.calls_to(Method::Post, "/v3/projects/4/wiki2html"), 2);
        assert_eq!(mock.calls()[0].body, Some(json!({"content": "__bold__"})));
        assert!(orch.cache().is_empty());
        let stats = orch.stats();
        assert_eq!((stats.api_calls, stats.cache_hits, stats.cache_misses), (2, 0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wiki_leaves_cached_reads_alone() {
        let (mock, orch) = setup();
        mock.on(Method::Get, "/v3/projects/4", json!({"id": 4}));
        mock.on(Method::Post, "/v3/projects/4/wiki2html", json!({}));

        orch.get_project_complete(
            &crate::ProjectRequest {
                include_trackers: false,
                ..crate::ProjectRequest::new(ProjectId::new(4))
            },
            ReadOptions::default(),
        )
        .await
        .unwrap();
        let rendered = orch
            .convert_wiki_to_html(ProjectId::new(4), "")
            .await
            .unwrap();

        assert_eq!(rendered.html, "");
        assert_eq!(orch.cache().len(), 1);
    }
}
