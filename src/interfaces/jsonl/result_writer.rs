use serde::Serialize;
use serde_json::Value;
use std::io::{self, Write};

#[derive(Serialize)]
struct Line<'a> {
    op: &'a str,
    result: &'a Value,
}

/// Writes one `{"op": ..., "result": ...}` JSON line per executed command.
pub struct ResultWriter<W: Write> {
    sink: W,
}

impl<W: Write> ResultWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn write_result(&mut self, op: &str, result: &Value) -> io::Result<()> {
        serde_json::to_writer(&mut self.sink, &Line { op, result })?;
        self.sink.write_all(b"\n")?;
        self.sink.flush()
    }
}
