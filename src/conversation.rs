//! The question/answer cycle.
//!
//! A cycle starts with the greeting. The first message fetches a list of
//! follow-up questions; each later message answers the question on screen.
//! The answer to the last question submits the whole transcript for analysis,
//! stores the returned classification and resets the transcript to the
//! greeting.

use tracing::{debug, error, info, warn};

use crate::backend::{AnalysisReply, Backend};
use crate::transcript::{Transcript, TranscriptEntry};

/// Where the current cycle stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleState {
    AwaitingFirstMessage,
    /// `questions[index]` is the question on screen. `index < questions.len()`.
    AwaitingAnswer { questions: Vec<String>, index: usize },
    /// The final transcript is with the backend.
    Submitting { questions: Vec<String> },
}

/// The four classification fields of the latest finished cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSnapshot {
    pub polarity: String,
    pub concern: String,
    pub category: String,
    pub intensity: String,
    pub recorded_at: Option<String>,
}

impl From<AnalysisReply> for ResultSnapshot {
    fn from(reply: AnalysisReply) -> Self {
        Self {
            polarity: reply.polarity,
            concern: reply.concern,
            category: reply.category,
            intensity: reply.intensity,
            recorded_at: reply.recorded_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input; nothing changed and nothing was sent.
    Ignored,
    /// The next question is now the last bot turn.
    Asked(String),
    /// The cycle finished and the transcript was reset.
    Completed(ResultSnapshot),
    /// A backend call failed; state is as before the submission.
    Failed,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    transcript: Transcript,
    state: CycleState,
    results: ResultSnapshot,
}

impl Conversation {
    pub fn new<S: Into<String>>(greeting: S) -> Self {
        Self {
            transcript: Transcript::new(greeting),
            state: CycleState::AwaitingFirstMessage,
            results: ResultSnapshot::default(),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    pub fn results(&self) -> &ResultSnapshot {
        &self.results
    }

    /// Handles one user message. The user turn is committed only when the step
    /// it triggers succeeds, so a failed call can be retried by resending.
    pub async fn submit<B>(&mut self, backend: &B, input: &str) -> SubmitOutcome
    where
        B: Backend + ?Sized,
    {
        if input.trim().is_empty() {
            debug!("ignoring blank submission");
            return SubmitOutcome::Ignored;
        }

        match self.state.clone() {
            CycleState::AwaitingFirstMessage => self.open_cycle(backend, input).await,
            CycleState::AwaitingAnswer { questions, index } if index + 1 < questions.len() => {
                self.advance(input, questions, index)
            }
            // A `Submitting` state here means an earlier submission was
            // abandoned mid-flight; the last answer was never committed.
            CycleState::AwaitingAnswer { questions, .. } | CycleState::Submitting { questions } => {
                self.finish_cycle(backend, input, questions).await
            }
        }
    }

    async fn open_cycle<B>(&mut self, backend: &B, input: &str) -> SubmitOutcome
    where
        B: Backend + ?Sized,
    {
        let fetched = match backend.fetch_questions(input).await {
            Ok(list) => list,
            Err(err) => {
                error!(error = %err, "failed to fetch follow-up questions");
                return SubmitOutcome::Failed;
            }
        };

        // The backend pads its list with an empty sentinel.
        let questions: Vec<String> = fetched
            .into_iter()
            .filter(|q| !q.trim().is_empty())
            .collect();

        let Some(first) = questions.first().cloned() else {
            warn!("backend returned no follow-up questions, submitting right away");
            return self.finish_cycle(backend, input, questions).await;
        };

        debug!(count = questions.len(), "cycle opened");
        self.transcript.push(TranscriptEntry::user(input));
        self.transcript.push(TranscriptEntry::bot(first.clone()));
        self.state = CycleState::AwaitingAnswer {
            questions,
            index: 0,
        };
        SubmitOutcome::Asked(first)
    }

    fn advance(&mut self, input: &str, questions: Vec<String>, index: usize) -> SubmitOutcome {
        let next = index + 1;
        let question = questions[next].clone();

        debug!(index = next, total = questions.len(), "advancing to next question");
        self.transcript.push(TranscriptEntry::user(input));
        self.transcript.push(TranscriptEntry::bot(question.clone()));
        self.state = CycleState::AwaitingAnswer {
            questions,
            index: next,
        };
        SubmitOutcome::Asked(question)
    }

    async fn finish_cycle<B>(&mut self, backend: &B, input: &str, questions: Vec<String>) -> SubmitOutcome
    where
        B: Backend + ?Sized,
    {
        let mut messages = self.transcript.entries().to_vec();
        messages.push(TranscriptEntry::user(input));

        self.state = CycleState::Submitting {
            questions: questions.clone(),
        };

        match backend.save_responses(&messages).await {
            Ok(reply) => {
                let snapshot = ResultSnapshot::from(reply);
                info!(
                    polarity = %snapshot.polarity,
                    category = %snapshot.category,
                    intensity = %snapshot.intensity,
                    "cycle completed"
                );
                self.results = snapshot.clone();
                self.transcript.reset();
                self.state = CycleState::AwaitingFirstMessage;
                SubmitOutcome::Completed(snapshot)
            }
            Err(err) => {
                error!(error = %err, "failed to submit responses");
                self.state = match questions.len() {
                    0 => CycleState::AwaitingFirstMessage,
                    len => CycleState::AwaitingAnswer {
                        questions,
                        index: len - 1,
                    },
                };
                SubmitOutcome::Failed
            }
        }
    }
}
