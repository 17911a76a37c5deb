use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error};

use crate::backend::Backend;
use crate::conversation::{Conversation, ResultSnapshot, SubmitOutcome};
use crate::plot::{PlotImage, PlotView, fetch_plot};
use crate::transcript::TranscriptEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    Submit(String),
    RefreshPlot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// A backend call started; the text says which.
    Busy(String),
    Idle,
    Transcript(Vec<TranscriptEntry>),
    Results(ResultSnapshot),
    Plot(PlotView),
    /// The submission failed; carries the text so the UI can offer it again.
    SubmitFailed(String),
}

/// Owns the conversation, the backend and the plot image. Fetches the plot
/// once, then handles commands one at a time until the command channel
/// closes. The plot's temp file is removed when this returns.
pub async fn run_session(
    backend: Arc<dyn Backend>,
    mut conversation: Conversation,
    mut rx: UnboundedReceiver<AppCommand>,
    tx: UnboundedSender<AppEvent>,
) {
    let _ = tx.send(AppEvent::Transcript(conversation.transcript().entries().to_vec()));
    let _ = tx.send(AppEvent::Plot(PlotView::Loading));

    let mut plot: Option<PlotImage> = None;
    refresh_plot(backend.as_ref(), &mut plot, &tx).await;

    while let Some(cmd) = rx.recv().await {
        match cmd {
            AppCommand::Submit(text) => {
                let _ = tx.send(AppEvent::Busy(busy_label(&conversation)));
                let outcome = conversation.submit(backend.as_ref(), &text).await;
                match outcome {
                    SubmitOutcome::Ignored => {}
                    SubmitOutcome::Asked(_) => {
                        let _ = tx.send(AppEvent::Transcript(
                            conversation.transcript().entries().to_vec(),
                        ));
                    }
                    SubmitOutcome::Completed(snapshot) => {
                        let _ = tx.send(AppEvent::Results(snapshot));
                        let _ = tx.send(AppEvent::Transcript(
                            conversation.transcript().entries().to_vec(),
                        ));
                    }
                    SubmitOutcome::Failed => {
                        let _ = tx.send(AppEvent::SubmitFailed(text));
                    }
                }
                let _ = tx.send(AppEvent::Idle);
            }
            AppCommand::RefreshPlot => {
                let _ = tx.send(AppEvent::Busy("Fetching plot".to_string()));
                refresh_plot(backend.as_ref(), &mut plot, &tx).await;
                let _ = tx.send(AppEvent::Idle);
            }
        }
    }

    debug!("command channel closed, session ending");
}

/// Stops a spawned session without waiting for its in-flight backend call.
/// Dropping the aborted task still drops the plot image and its temp file.
pub async fn shutdown(session: JoinHandle<()>) -> Result<(), JoinError> {
    session.abort();
    match session.await {
        Err(err) if err.is_cancelled() => {
            debug!("session aborted on quit");
            Ok(())
        }
        other => other,
    }
}

/// Replaces `current` on success. On failure the previous image stays.
async fn refresh_plot(
    backend: &dyn Backend,
    current: &mut Option<PlotImage>,
    tx: &UnboundedSender<AppEvent>,
) {
    match fetch_plot(backend).await {
        Ok(image) => {
            let _ = tx.send(AppEvent::Plot(image.view()));
            *current = Some(image);
        }
        Err(err) => error!(error = %err, "failed to fetch plot"),
    }
}

fn busy_label(conversation: &Conversation) -> String {
    use crate::conversation::CycleState;
    match conversation.state() {
        CycleState::AwaitingFirstMessage => "Fetching follow-up questions".to_string(),
        CycleState::AwaitingAnswer { questions, index } if index + 1 < questions.len() => {
            "Thinking".to_string()
        }
        _ => "Analysing your answers".to_string(),
    }
}
