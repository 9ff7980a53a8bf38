//! Browser console sink for `tracing` events.

use std::io;

use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ConsoleLevel {
    Log,
    Warn,
    Error,
}

pub(crate) fn console_level(level: &Level) -> ConsoleLevel {
    if *level == Level::ERROR {
        ConsoleLevel::Error
    } else if *level == Level::WARN {
        ConsoleLevel::Warn
    } else {
        ConsoleLevel::Log
    }
}

/// Buffers one formatted event and emits it as a single console line on drop.
pub(crate) struct ConsoleWriter {
    level: ConsoleLevel,
    buf: Vec<u8>,
}

impl ConsoleWriter {
    fn new(level: ConsoleLevel) -> Self {
        Self {
            level,
            buf: Vec::new(),
        }
    }
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let line = String::from_utf8_lossy(&self.buf);
        let line = line.trim_end();
        if !line.is_empty() {
            emit(self.level, line);
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn emit(level: ConsoleLevel, line: &str) {
    let value = wasm_bindgen::JsValue::from_str(line);
    match level {
        ConsoleLevel::Log => web_sys::console::log_1(&value),
        ConsoleLevel::Warn => web_sys::console::warn_1(&value),
        ConsoleLevel::Error => web_sys::console::error_1(&value),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn emit(_level: ConsoleLevel, line: &str) {
    eprintln!("{line}");
}

#[derive(Clone, Copy, Default)]
pub(crate) struct ConsoleMakeWriter;

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter::new(ConsoleLevel::Log)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        ConsoleWriter::new(console_level(meta.level()))
    }
}

/// Install the console subscriber. A second call is a no-op.
pub(crate) fn init() {
    let _ = tracing_subscriber::fmt()
        .with_writer(ConsoleMakeWriter)
        .without_time()
        .with_ansi(false)
        .with_target(false)
        .with_max_level(Level::INFO)
        .try_init();
}
