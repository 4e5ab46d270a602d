use super::command::CommandResponse;
use anyhow::Result;
use log::{error, info};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Writes each response as one JSON line until every sender is dropped.
pub fn spawn_response_writer<W>(
    mut responses: mpsc::Receiver<CommandResponse>,
    mut out: W,
) -> JoinHandle<Result<u64>>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut written = 0u64;
        while let Some(response) = responses.recv().await {
            let mut line = match serde_json::to_vec(&response) {
                Ok(line) => line,
                Err(e) => {
                    error!("Dropping unencodable response {}: {}", response.request_id, e);
                    continue;
                }
            };
            line.push(b'\n');
            out.write_all(&line).await?;
            out.flush().await?;
            written += 1;
        }
        info!("Response writer done after {} responses", written);
        Ok(written)
    })
}
