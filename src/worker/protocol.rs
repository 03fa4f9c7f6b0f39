//! Line-delimited JSON protocol spoken with worker processes.
//!
//! Each request is one JSON object terminated by `\n`; each reply is one
//! line holding either a JSON object or the bare sentinel `error`.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::payload::{RequestPayload, ResponsePayload};

/// Line a worker prints when it could not process a request.
pub const ERROR_SENTINEL: &str = "error";

/// Why an exchange produced no usable reply.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeFailure {
    #[error("worker input already closed")]
    Closed,

    #[error("request encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("write to worker failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("read from worker failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("worker closed its output")]
    Eof,

    #[error("worker could not process the request")]
    WorkerError,

    #[error("malformed reply {line:?}: {source}")]
    Malformed {
        line: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Serialize a request as one newline-terminated JSON record.
pub fn encode_request(request: &RequestPayload) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = serde_json::to_vec(request)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Parse one reply line (without its terminator).
pub fn decode_reply(line: &str) -> Result<ResponsePayload, ExchangeFailure> {
    if line == ERROR_SENTINEL {
        return Err(ExchangeFailure::WorkerError);
    }
    serde_json::from_str(line).map_err(|source| ExchangeFailure::Malformed {
        line: truncate(line, 120),
        source,
    })
}

/// Write `request`, then read exactly one reply line into `line`.
pub async fn round_trip<W, R>(
    writer: &mut W,
    reader: &mut R,
    line: &mut String,
    request: &RequestPayload,
) -> Result<ResponsePayload, ExchangeFailure>
where
    W: AsyncWrite + Unpin,
    R: AsyncBufRead + Unpin,
{
    let record = encode_request(request).map_err(ExchangeFailure::Encode)?;
    writer
        .write_all(&record)
        .await
        .map_err(ExchangeFailure::Write)?;
    writer.flush().await.map_err(ExchangeFailure::Write)?;

    line.clear();
    let n = reader
        .read_line(line)
        .await
        .map_err(ExchangeFailure::Read)?;
    if n == 0 {
        return Err(ExchangeFailure::Eof);
    }

    decode_reply(line.trim_end_matches(['\n', '\r']))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
