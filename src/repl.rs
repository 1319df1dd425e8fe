//! Interactive terminal loop: URL prompt, extraction, then questions about
//! the same page until the user types `done`.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::tools::session::Scout;

const EXIT_COMMAND: &str = "exit";
const DONE_COMMAND: &str = "done";

/// Run until `exit` or end of input.
pub async fn run<R, W>(scout: &Scout, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    output
        .write_all(b"--- page-scout: fetch a page, extract it, ask about it ---\n")
        .await?;

    loop {
        write_prompt(&mut output, "\nEnter a URL (or 'exit' to quit): ").await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let raw_url = line.trim();
        if raw_url.eq_ignore_ascii_case(EXIT_COMMAND) {
            break;
        }

        writeln(&mut output, &format!("Fetching {} ...", raw_url)).await?;
        let session = match scout.open(raw_url).await {
            Ok(session) => session,
            Err(e) => {
                writeln(&mut output, &format!("Could not fetch page: {}", e)).await?;
                continue;
            }
        };
        debug!("fetched {} bytes from {}", session.page().byte_len(), session.url());

        match session.extract().await {
            Ok(extraction) => {
                let pretty = serde_json::to_string_pretty(&extraction)
                    .unwrap_or_else(|_| format!("{:?}", extraction.as_map()));
                writeln(&mut output, &format!("\nExtracted info:\n{}", pretty)).await?;
            }
            Err(e) => writeln(&mut output, &format!("\nExtraction failed: {}", e)).await?,
        }

        if session.text().is_empty() {
            writeln(&mut output, "The page had no text to ask questions about.").await?;
            continue;
        }

        writeln(
            &mut output,
            "\n--- Ask anything about this page (type 'done' to pick another URL) ---",
        )
        .await?;
        loop {
            write_prompt(&mut output, "Your question: ").await?;
            let Some(line) = lines.next_line().await? else {
                output.flush().await?;
                return Ok(());
            };
            let question = line.trim();
            if question.eq_ignore_ascii_case(DONE_COMMAND) {
                break;
            }
            if question.is_empty() {
                continue;
            }
            match session.answer(question).await {
                Ok(answer) => writeln(&mut output, &format!("Answer: {}\n", answer)).await?,
                Err(e) => writeln(&mut output, &format!("Could not answer: {}\n", e)).await?,
            }
        }
    }

    writeln(&mut output, "\n--- bye ---").await?;
    output.flush().await
}

async fn write_prompt<W: AsyncWrite + Unpin>(output: &mut W, prompt: &str) -> std::io::Result<()> {
    output.write_all(prompt.as_bytes()).await?;
    output.flush().await
}

async fn writeln<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> std::io::Result<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await
}
