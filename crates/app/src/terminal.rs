use snafu::ResultExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};

use crate::error::{AppResult, ReadInputSnafu, WriteOutputSnafu};

/// Line-oriented input plus an output sink.
///
/// The halves are separate fields so a pending read can coexist with writes.
pub struct Terminal<R, W> {
    pub(crate) input: Lines<R>,
    pub(crate) output: Output<W>,
}

impl Terminal<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> Terminal<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            input: reader.lines(),
            output: Output { writer },
        }
    }

    /// `None` once input is closed.
    pub async fn read_line(&mut self) -> AppResult<Option<String>> {
        self.input.next_line().await.context(ReadInputSnafu {
            stage: "read-terminal-line",
        })
    }

    pub fn output(&mut self) -> &mut Output<W> {
        &mut self.output
    }

    pub fn into_writer(self) -> W {
        self.output.writer
    }
}

pub struct Output<W> {
    writer: W,
}

impl<W> Output<W>
where
    W: AsyncWrite + Unpin,
{
    pub async fn write(&mut self, text: &str) -> AppResult<()> {
        self.writer
            .write_all(text.as_bytes())
            .await
            .context(WriteOutputSnafu {
                stage: "write-terminal-text",
            })?;
        self.writer.flush().await.context(WriteOutputSnafu {
            stage: "flush-terminal",
        })
    }

    pub async fn line(&mut self, text: &str) -> AppResult<()> {
        self.write(&format!("{text}\n")).await
    }
}
