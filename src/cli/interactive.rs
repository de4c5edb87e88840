use futures::Stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::runtime::Runtime;
use tracing::debug;

/// The interactive views run on one thread; blocking HTTP calls go to the blocking pool.
pub(super) fn runtime() -> anyhow::Result<Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?)
}

/// Trimmed, non-blank stdin lines. Must be called from inside the runtime.
pub(super) fn stdin_lines() -> impl Stream<Item = String> {
    lines_from(BufReader::new(tokio::io::stdin()))
}

/// Every non-blank line of `reader`, trimmed and in order. Lines are read only as the consumer
/// polls, so a slow consumer backs up the reader instead of losing input. The stream ends at
/// EOF or on the first read error.
fn lines_from<R>(reader: R) -> impl Stream<Item = String>
where
    R: AsyncBufRead + Unpin,
{
    futures::stream::unfold(reader.lines(), |mut lines| async move {
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        return Some((line.to_string(), lines));
                    }
                }
                Ok(None) => {
                    debug!("stdin closed");
                    return None;
                }
                Err(err) => {
                    eprintln!("error: reading stdin: {err}");
                    return None;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn burst_of_lines_arrives_complete_and_in_order() {
        let input: String = (0..5000).map(|i| format!("line {i}\n")).collect();
        let mut lines = Box::pin(lines_from(input.as_bytes()));

        let mut seen = 0;
        while let Some(line) = lines.next().await {
            assert_eq!(line, format!("line {seen}"));
            seen += 1;
            if seen % 1000 == 0 {
                // A consumer stalled on other work must not lose anything.
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }
        assert_eq!(seen, 5000);
    }

    #[tokio::test]
    async fn blank_lines_are_skipped_and_text_trimmed() {
        let lines: Vec<String> = lines_from(&b"  min 10 \n\n   \nclear min\n"[..])
            .collect()
            .await;
        assert_eq!(lines, ["min 10", "clear min"]);
    }
}
