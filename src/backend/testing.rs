//! Scripted in-process backend for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{AnalysisReply, Backend, PlotPayload};
use crate::error::{ChatError, ChatResult};
use crate::transcript::TranscriptEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Questions(String),
    Save(Vec<TranscriptEntry>),
    Plot,
}

/// Answers each call from a queue of preset results and records every call.
/// An empty queue answers with a network error.
#[derive(Default)]
pub struct FakeBackend {
    questions: Mutex<VecDeque<ChatResult<Vec<String>>>>,
    replies: Mutex<VecDeque<ChatResult<AnalysisReply>>>,
    plots: Mutex<VecDeque<ChatResult<PlotPayload>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeBackend {
    pub fn push_questions<I, S>(&self, questions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = questions.into_iter().map(Into::into).collect();
        self.questions.lock().unwrap().push_back(Ok(list));
    }

    pub fn push_questions_error(&self, err: ChatError) {
        self.questions.lock().unwrap().push_back(Err(err));
    }

    pub fn push_reply(&self, reply: AnalysisReply) {
        self.replies.lock().unwrap().push_back(Ok(reply));
    }

    pub fn push_reply_error(&self, err: ChatError) {
        self.replies.lock().unwrap().push_back(Err(err));
    }

    pub fn push_plot(&self, bytes: &[u8], content_type: &str) {
        self.plots.lock().unwrap().push_back(Ok(PlotPayload {
            bytes: bytes.to_vec(),
            content_type: Some(content_type.to_string()),
        }));
    }

    pub fn push_plot_error(&self, err: ChatError) {
        self.plots.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn saved_transcripts(&self) -> Vec<Vec<TranscriptEntry>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Save(messages) => Some(messages),
                _ => None,
            })
            .collect()
    }
}

fn unscripted<T>(what: &str) -> ChatResult<T> {
    Err(ChatError::network(format!("no scripted {what}")))
}

#[async_trait]
impl Backend for FakeBackend {
    async fn fetch_questions(&self, message: &str) -> ChatResult<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Questions(message.to_string()));
        self.questions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| unscripted("questions"))
    }

    async fn save_responses(&self, messages: &[TranscriptEntry]) -> ChatResult<AnalysisReply> {
        self.calls.lock().unwrap().push(Call::Save(messages.to_vec()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| unscripted("reply"))
    }

    async fn fetch_plot(&self) -> ChatResult<PlotPayload> {
        self.calls.lock().unwrap().push(Call::Plot);
        self.plots
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| unscripted("plot"))
    }
}

pub fn reply(polarity: &str, concern: &str, category: &str, intensity: &str) -> AnalysisReply {
    AnalysisReply {
        polarity: polarity.into(),
        concern: concern.into(),
        category: category.into(),
        intensity: intensity.into(),
        recorded_at: None,
    }
}

/// A backend whose calls never answer in test time, except for an optional
/// plot that is returned right away.
#[derive(Default)]
pub struct StalledBackend {
    pub plot: Option<PlotPayload>,
}

impl StalledBackend {
    async fn stall<T>(&self, endpoint: &str) -> ChatResult<T> {
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        Err(ChatError::timeout(endpoint))
    }
}

#[async_trait]
impl Backend for StalledBackend {
    async fn fetch_questions(&self, _message: &str) -> ChatResult<Vec<String>> {
        self.stall("getlistquestions").await
    }

    async fn save_responses(&self, _messages: &[TranscriptEntry]) -> ChatResult<AnalysisReply> {
        self.stall("saveResponses").await
    }

    async fn fetch_plot(&self) -> ChatResult<PlotPayload> {
        match &self.plot {
            Some(payload) => Ok(payload.clone()),
            None => self.stall("plot").await,
        }
    }
}
