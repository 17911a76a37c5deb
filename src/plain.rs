//! Line-oriented session for terminals without a full-screen UI.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::error;

use crate::backend::Backend;
use crate::conversation::{Conversation, ResultSnapshot, SubmitOutcome};
use crate::error::ChatResult;
use crate::plot::fetch_plot;

/// Runs the conversation over `input`/`output` until EOF.
pub async fn run<B, R, W>(
    backend: &B,
    mut conversation: Conversation,
    input: R,
    output: &mut W,
) -> ChatResult<ResultSnapshot>
where
    B: Backend + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    // Held until the session ends so the file stays readable.
    let plot = match fetch_plot(backend).await {
        Ok(image) => {
            output
                .write_all(format!("plot: {}\n", image.path().display()).as_bytes())
                .await?;
            Some(image)
        }
        Err(err) => {
            error!(error = %err, "failed to fetch plot");
            None
        }
    };

    say_bot(output, conversation.transcript().greeting()).await?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match conversation.submit(backend, &line).await {
            SubmitOutcome::Ignored | SubmitOutcome::Failed => {}
            SubmitOutcome::Asked(question) => say_bot(output, &question).await?,
            SubmitOutcome::Completed(snapshot) => {
                write_results(output, &snapshot).await?;
                say_bot(output, conversation.transcript().greeting()).await?;
            }
        }
    }

    drop(plot);
    Ok(conversation.results().clone())
}

async fn say_bot<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> ChatResult<()> {
    output.write_all(format!("bot: {text}\n").as_bytes()).await?;
    output.flush().await?;
    Ok(())
}

async fn write_results<W: AsyncWrite + Unpin>(output: &mut W, r: &ResultSnapshot) -> ChatResult<()> {
    let mut text = format!(
        "Polarity:  {}\nConcern:   {}\nCategory:  {}\nIntensity: {}\n",
        r.polarity, r.concern, r.category, r.intensity
    );
    if let Some(at) = &r.recorded_at {
        text.push_str(&format!("Recorded:  {at}\n"));
    }
    output.write_all(text.as_bytes()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{FakeBackend, reply};
    use crate::transcript::DEFAULT_GREETING;

    #[tokio::test]
    async fn test_scripted_session() {
        let backend = FakeBackend::default();
        backend.push_questions(["How long have you felt this way?", "What triggers it?", ""]);
        backend.push_reply(reply("Negative", "Anxiety", "Stress", "High"));

        let input: &[u8] = b"I feel anxious\n\nA week\nLoud noises\n";
        let mut output = Vec::new();
        let results = run(&backend, Conversation::new(DEFAULT_GREETING), input, &mut output)
            .await
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_eq!(
            output,
            "bot: How have you been feeling lately?\n\
             bot: How long have you felt this way?\n\
             bot: What triggers it?\n\
             Polarity:  Negative\n\
             Concern:   Anxiety\n\
             Category:  Stress\n\
             Intensity: High\n\
             bot: How have you been feeling lately?\n"
        );
        assert_eq!(results.category, "Stress");
    }

    #[tokio::test]
    async fn test_plot_path_is_printed() {
        let backend = FakeBackend::default();
        backend.push_plot(b"\x89PNG", "image/png");

        let input: &[u8] = b"";
        let mut output = Vec::new();
        run(&backend, Conversation::new("Hi?"), input, &mut output)
            .await
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("plot: "));
        assert!(output.ends_with("bot: Hi?\n"));
    }
}
