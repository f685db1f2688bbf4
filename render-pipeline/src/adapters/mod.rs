pub mod clip_rendering;
pub mod clip_stitching;
pub mod document_extraction;
pub mod http;
pub mod scene_planning;

pub use clip_rendering::{ClipRenderer, HttpClipRenderer, RenderTarget};
pub use clip_stitching::{ClipStitcher, HttpClipStitcher, StitchOptions, StitchRequest};
pub use document_extraction::{DocumentAiExtractor, DocumentExtractor, PdfTextExtractor};
pub use scene_planning::{OpenAiSceneModel, PlanningRequest, SceneModel, ScenePlanner};

#[cfg(test)]
pub(crate) mod test_server {
    use axum::Router;

    /// Serves `app` on an ephemeral local port and returns its base URL.
    pub async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }
}
