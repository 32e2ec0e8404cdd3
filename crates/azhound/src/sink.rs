//! Consumers of the output stream.
//!
//! A [`Sink`] receives envelopes one at a time; [`drain`] pulls a stream into
//! a sink until the stream closes. The pipeline makes no assumption about the
//! output format. [`JsonLinesSink`] writes one JSON document per line, which
//! is what the `azhound` binary uses.

use azhound_core::{Error, Result};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::io::{BufWriter, Write};

/// Destination for collected items.
pub trait Sink<T> {
    /// Writes one item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Output`] if the item cannot be written.
    fn write(&mut self, item: T) -> Result<()>;

    /// Flushes buffered output. Called once the stream has closed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Output`] if buffered output cannot be written.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T> Sink<T> for Vec<T> {
    fn write(&mut self, item: T) -> Result<()> {
        self.push(item);
        Ok(())
    }
}

/// Drains `stream` into `sink` until the stream closes.
///
/// Returns the number of items written. On a write error the stream is
/// dropped, which tells the producer to stop.
///
/// # Errors
///
/// Returns the first error reported by the sink.
pub async fn drain<S, T, K>(stream: S, sink: &mut K) -> Result<u64>
where
    S: Stream<Item = T>,
    K: Sink<T> + ?Sized,
{
    let mut stream = core::pin::pin!(stream);
    let mut written = 0;

    while let Some(item) = stream.next().await {
        sink.write(item)?;
        written += 1;
    }

    sink.flush()?;
    Ok(written)
}

/// Writes each item as one line of JSON.
pub struct JsonLinesSink<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Output`] if buffered output cannot be written.
    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner().map_err(|e| Error::Output {
            context: e.error().to_string(),
        })
    }
}

impl<W: Write, T: Serialize> Sink<T> for JsonLinesSink<W> {
    fn write(&mut self, item: T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &item).map_err(|e| Error::Output {
            context: format!("unable to serialize item: {e}"),
        })?;
        self.writer.write_all(b"\n").map_err(output_error)
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(output_error)
    }
}

fn output_error(e: std::io::Error) -> Error {
    Error::Output {
        context: e.to_string(),
    }
}
