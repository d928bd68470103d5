use crate::{api::CheckRequest, engine::Engine};
use anyhow::Result;
use futures::{prelude::*, stream};
use std::fmt;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// The maximum number of requests evaluated concurrently.
const MAX_IN_FLIGHT: usize = 64;

/// Reads JSON-encoded `CheckRequest`s, one per line, and writes a JSON
/// response line for each, in input order. Blank lines are skipped.
///
/// A line that cannot be decoded is answered with an `error` object. Only a
/// failure to read the input or write the output ends the loop.
pub async fn serve<R, W>(engine: Engine, input: R, mut output: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let lines = stream::unfold(BufReader::new(input), |mut reader| async move {
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => None,
            Ok(_) => Some((Ok(line), reader)),
            Err(error) => Some((Err(error), reader)),
        }
    });
    let mut responses = std::pin::pin!(lines
        .map(|line| {
            let engine = engine.clone();
            async move {
                match line {
                    Ok(line) => evaluate(&engine, &line).await,
                    Err(error) => Err(error.into()),
                }
            }
        })
        .buffered(MAX_IN_FLIGHT));

    while let Some(rsp) = responses.next().await {
        let Some(rsp) = rsp? else {
            continue;
        };
        output.write_all(rsp.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }
    Ok(())
}

async fn evaluate(engine: &Engine, line: &[u8]) -> Result<Option<String>> {
    let line = match std::str::from_utf8(line) {
        Ok(line) => line.trim(),
        Err(error) => {
            tracing::warn!(%error, "Invalid request encoding");
            return error_response(error).map(Some);
        }
    };
    if line.is_empty() {
        return Ok(None);
    }

    let rsp = match serde_json::from_str::<CheckRequest>(line) {
        Ok(req) => serde_json::to_string(&engine.check(req).await)?,
        Err(error) => {
            tracing::warn!(%error, "Invalid request");
            error_response(error)?
        }
    };
    Ok(Some(rsp))
}

fn error_response(error: impl fmt::Display) -> Result<String> {
    Ok(serde_json::to_string(
        &serde_json::json!({ "error": error.to_string() }),
    )?)
}
