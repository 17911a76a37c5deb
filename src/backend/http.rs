use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use super::proto::{
    AnalysisReply, HelloResponse, QuestionsRequest, QuestionsResponse, SaveResponsesRequest,
    SaveResponsesResponse,
};
use super::{Backend, PlotPayload};
use crate::error::{ChatError, ChatResult, RetryConfig, retry_with_backoff};
use crate::transcript::TranscriptEntry;

pub const QUESTIONS_ENDPOINT: &str = "getlistquestions";
pub const SAVE_RESPONSES_ENDPOINT: &str = "saveResponses";
pub const PLOT_ENDPOINT: &str = "plot";
pub const HELLO_ENDPOINT: &str = "hello";

/// reqwest-backed client for the analysis service.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    retry: RetryConfig,
}

impl HttpBackend {
    pub fn new(base_url: &Url, timeout: Duration, retry: RetryConfig) -> ChatResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChatError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: with_trailing_slash(base_url),
            retry,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, name: &str) -> ChatResult<Url> {
        self.base_url
            .join(name)
            .map_err(|e| ChatError::config(format!("invalid endpoint {name}: {e}")))
    }

    /// GETs `/hello`, the backend's liveness route.
    pub async fn hello(&self) -> ChatResult<String> {
        let url = self.endpoint(HELLO_ENDPOINT)?;
        let response = retry_with_backoff(&self.retry, HELLO_ENDPOINT, || {
            self.get_once(HELLO_ENDPOINT, url.clone())
        })
        .await?;
        let body: HelloResponse = response
            .json()
            .await
            .map_err(|e| ChatError::from_reqwest(HELLO_ENDPOINT, e))?;
        Ok(body.message)
    }

    async fn post_json<Req, Resp>(&self, name: &'static str, body: &Req) -> ChatResult<Resp>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.endpoint(name)?;
        retry_with_backoff(&self.retry, name, || self.post_once(name, url.clone(), body)).await
    }

    async fn post_once<Req, Resp>(&self, name: &str, url: Url, body: &Req) -> ChatResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        debug!(endpoint = name, "POST {url}");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ChatError::from_reqwest(name, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::status(name, status.as_u16()));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| ChatError::from_reqwest(name, e))
    }

    async fn get_once(&self, name: &str, url: Url) -> ChatResult<reqwest::Response> {
        debug!(endpoint = name, "GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ChatError::from_reqwest(name, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::status(name, status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_questions(&self, message: &str) -> ChatResult<Vec<String>> {
        let response: QuestionsResponse = self
            .post_json(QUESTIONS_ENDPOINT, &QuestionsRequest { message })
            .await?;
        info!(count = response.list_questions.len(), "fetched follow-up questions");
        Ok(response.list_questions)
    }

    async fn save_responses(&self, messages: &[TranscriptEntry]) -> ChatResult<AnalysisReply> {
        let response: SaveResponsesResponse = self
            .post_json(SAVE_RESPONSES_ENDPOINT, &SaveResponsesRequest { messages })
            .await?;
        info!(turns = messages.len(), "transcript analysed");
        Ok(response.reply)
    }

    async fn fetch_plot(&self) -> ChatResult<PlotPayload> {
        let url = self.endpoint(PLOT_ENDPOINT)?;
        let response = retry_with_backoff(&self.retry, PLOT_ENDPOINT, || {
            self.get_once(PLOT_ENDPOINT, url.clone())
        })
        .await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ChatError::from_reqwest(PLOT_ENDPOINT, e))?;
        info!(bytes = bytes.len(), "fetched plot");

        Ok(PlotPayload {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

/// `Url::join` replaces the last path segment unless the base ends in `/`.
fn with_trailing_slash(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
