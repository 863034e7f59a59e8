// SPDX-License-Identifier: GPL-3.0-or-later

//! A writer that reads along.
//!
//! The [`OutputSniffer`] sits between a process output pipe and its usual
//! destination. Every byte is passed through unchanged, and every complete
//! line is also handed to a [`LineProcessor`]. The chunking of the writes
//! does not matter: the lines are reassembled in an internal buffer.

use crate::builtins::LineProcessor;
use std::borrow::Cow;
use std::io::{self, Write};

pub struct OutputSniffer<W: Write, P: LineProcessor> {
    downstream: W,
    processor: P,
    buffer: Vec<u8>,
    closed: bool,
}

impl<W: Write, P: LineProcessor> OutputSniffer<W, P> {
    pub fn new(downstream: W, processor: P) -> Self {
        Self { downstream, processor, buffer: Vec::new(), closed: false }
    }

    pub fn get_ref(&self) -> &W {
        &self.downstream
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Delivers the last line, even without a terminator, and shuts down the
    /// processor. Closing a closed sniffer does nothing.
    pub fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if !self.buffer.is_empty() {
            self.deliver();
        }
        self.processor.shutdown();
        self.downstream.flush()
    }

    fn split_lines(&mut self, mut bytes: &[u8]) {
        while let Some(position) = bytes.iter().position(|byte| *byte == b'\n') {
            self.buffer.extend_from_slice(&bytes[..position]);
            self.deliver();
            bytes = &bytes[position + 1..];
        }
        self.buffer.extend_from_slice(bytes);
    }

    fn deliver(&mut self) {
        let line = self.buffer.strip_suffix(b"\r").unwrap_or(self.buffer.as_slice());
        let text = String::from_utf8_lossy(line);
        if let Cow::Owned(_) = text {
            log::warn!("Output line is not valid UTF-8, decoded lossy: {text}");
        }
        self.processor.process_line(&text);
        self.buffer.clear();
    }
}

impl<W: Write, P: LineProcessor> Write for OutputSniffer<W, P> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::other("output sniffer is closed"));
        }
        let written = self.downstream.write(buf)?;
        self.split_lines(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.downstream.flush()
    }
}

impl<W: Write, P: LineProcessor> Drop for OutputSniffer<W, P> {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            log::debug!("Closing output sniffer failed: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::GccOutputProcessor;
    use crate::settings::{Origin, SettingEntry, SharedEntries};
    use proptest::prelude::*;

    #[derive(Debug, Default)]
    struct Recorder {
        lines: Vec<String>,
        shutdowns: usize,
    }

    impl LineProcessor for Recorder {
        fn process_line(&mut self, line: &str) {
            self.lines.push(line.to_string());
        }

        fn shutdown(&mut self) {
            self.shutdowns += 1;
        }
    }

    fn feed(input: &[u8], chunk: usize) -> (Vec<u8>, Vec<String>) {
        let mut sut = OutputSniffer::new(Vec::new(), Recorder::default());
        for piece in input.chunks(chunk) {
            sut.write_all(piece).unwrap();
        }
        sut.close().unwrap();
        (sut.get_ref().clone(), sut.processor().lines.clone())
    }

    #[test]
    fn test_lines_and_bytes() {
        let input = b"first line\nsecond\r\n\nlast without terminator";

        let (bytes, lines) = feed(input, input.len());

        assert_eq!(bytes, input.to_vec());
        assert_eq!(lines, vec!["first line", "second", "", "last without terminator"]);
    }

    #[test]
    fn test_byte_at_a_time() {
        let input = b"#define A 1\n#define B 2\n";

        assert_eq!(feed(input, 1), feed(input, input.len()));
    }

    #[test]
    fn test_zero_length_writes() {
        let mut sut = OutputSniffer::new(Vec::new(), Recorder::default());

        assert_eq!(sut.write(b"").unwrap(), 0);
        sut.write_all(b"a").unwrap();
        assert_eq!(sut.write(b"").unwrap(), 0);
        sut.write_all(b"\n").unwrap();
        sut.close().unwrap();

        assert_eq!(sut.processor().lines, vec!["a"]);
        assert_eq!(sut.get_ref(), b"a\n");
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut sut = OutputSniffer::new(Vec::new(), Recorder::default());
        sut.write_all(b"tail").unwrap();

        sut.close().unwrap();
        sut.close().unwrap();

        assert_eq!(sut.processor().lines, vec!["tail"]);
        assert_eq!(sut.processor().shutdowns, 1);
        assert!(sut.write(b"more").is_err());
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossy() {
        let (bytes, lines) = feed(b"ok\n\xff\xfe bad\n", 3);

        assert_eq!(bytes, b"ok\n\xff\xfe bad\n".to_vec());
        assert_eq!(lines, vec!["ok".to_string(), "\u{fffd}\u{fffd} bad".to_string()]);
    }

    #[test]
    fn test_drop_flushes_into_processor() {
        let entries = SharedEntries::new();
        {
            let mut sut = OutputSniffer::new(io::sink(), GccOutputProcessor::new(entries.clone()));
            sut.write_all(b"#define A 1\n#define B").unwrap();
        }

        assert_eq!(
            entries.snapshot(),
            vec![
                SettingEntry::macro_define("A", "1", Origin::Builtin),
                SettingEntry::macro_define("B", "", Origin::Builtin)
            ]
        );
    }

    #[test]
    fn test_reader_thread_sees_entries() {
        let entries = SharedEntries::new();
        let writer = {
            let entries = entries.clone();
            std::thread::spawn(move || {
                let mut sut = OutputSniffer::new(io::sink(), GccOutputProcessor::new(entries));
                for index in 0..100 {
                    writeln!(sut, "#define M{index} {index}").unwrap();
                }
            })
        };
        writer.join().unwrap();

        assert_eq!(entries.len(), 100);
        assert_eq!(entries.snapshot()[99], SettingEntry::macro_define("M99", "99", Origin::Builtin));
    }

    proptest! {
        #[test]
        fn chunking_does_not_change_the_result(text in "[a-z #=\r\n]{0,200}", chunk in 1usize..32) {
            let input = text.as_bytes();

            let (whole_bytes, whole_lines) = feed(input, input.len().max(1));
            let (chunked_bytes, chunked_lines) = feed(input, chunk);
            let (single_bytes, single_lines) = feed(input, 1);

            prop_assert_eq!(&whole_bytes, &input.to_vec());
            prop_assert_eq!(&chunked_bytes, &whole_bytes);
            prop_assert_eq!(&single_bytes, &whole_bytes);
            prop_assert_eq!(&chunked_lines, &whole_lines);
            prop_assert_eq!(&single_lines, &whole_lines);
        }
    }
}
