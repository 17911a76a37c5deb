pub mod http;
pub mod proto;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;

use crate::error::ChatResult;
use crate::transcript::TranscriptEntry;

pub use http::HttpBackend;
pub use proto::AnalysisReply;

/// Raw image body returned by the plot endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotPayload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// The remote service that generates questions, analyses transcripts and
/// renders the plot. Every call is a single request/response exchange.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Follow-up questions for the first message of a cycle.
    async fn fetch_questions(&self, message: &str) -> ChatResult<Vec<String>>;

    /// Submits a finished transcript and returns its analysis.
    async fn save_responses(&self, messages: &[TranscriptEntry]) -> ChatResult<AnalysisReply>;

    async fn fetch_plot(&self) -> ChatResult<PlotPayload>;
}
