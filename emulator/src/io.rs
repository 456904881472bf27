//! Input and output collaborators.
//!
//! The machine only ever asks for "the next data card" and hands records of
//! symbol cells to the output device; everything else about the deck is the
//! driver's business.

use std::io::{self, Write};

/// Supplies one data card per call, `None` once the job's data section is
/// exhausted. The read blocks until a card is available.
pub trait DataReader {
    fn read_data(&mut self) -> Option<String>;
}

/// Receives one record of symbol cells per call and emits exactly one
/// terminated line.
pub trait RecordWriter {
    /// # Errors
    ///
    /// Fails when the underlying device does.
    fn write_record(&mut self, cells: &[u8]) -> io::Result<()>;
}

/// A cursor over one job's data cards.
///
/// The position lives here, not in any shared state: a new job gets a new
/// stream.
#[derive(Debug, Default, Clone)]
pub struct DataStream {
    cards: Vec<String>,
    cursor: usize,
}

impl DataStream {
    #[must_use]
    pub fn new(cards: Vec<String>) -> Self {
        Self { cards, cursor: 0 }
    }

    /// Cards not yet consumed
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cards.len().saturating_sub(self.cursor)
    }
}

impl DataReader for DataStream {
    fn read_data(&mut self) -> Option<String> {
        let card = self.cards.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(card)
    }
}

/// Line printer over any [`io::Write`] sink. NUL cells print as `*`.
pub struct LinePrinter<W> {
    sink: W,
}

impl<W: Write> LinePrinter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

impl<W: Write> RecordWriter for LinePrinter<W> {
    fn write_record(&mut self, cells: &[u8]) -> io::Result<()> {
        let mut line = Vec::with_capacity(cells.len() + 1);
        for &cell in cells {
            line.push(if cell == 0 { b'*' } else { cell });
        }
        line.push(b'\n');
        self.sink.write_all(&line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_yields_cards_in_order_then_runs_dry() {
        let mut stream = DataStream::new(vec!["FIRST".to_string(), "SECOND".to_string()]);
        assert_eq!(stream.remaining(), 2);
        assert_eq!(stream.read_data(), Some("FIRST".to_string()));
        assert_eq!(stream.read_data(), Some("SECOND".to_string()));
        assert_eq!(stream.read_data(), None);
        assert_eq!(stream.read_data(), None);
        assert_eq!(stream.remaining(), 0);
    }

    #[test]
    fn printer_renders_nul_cells_as_placeholders() {
        let mut printer = LinePrinter::new(Vec::new());
        printer.write_record(b"AB\0D\0\0\0\0").unwrap();
        printer.write_record(b"").unwrap();
        assert_eq!(printer.into_inner(), b"AB*D****\n\n");
    }
}
