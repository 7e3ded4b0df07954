mod nested_state;
mod solidity_docs;

use super::*;
use super::types::{Address, Hash};

use core::fmt;

/// 32 byte word printed as hex in assertion failures.
#[derive(PartialEq)]
struct Word<'a>(&'a [u8]);

impl fmt::Debug for Word<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Checks every written word against the next line of an annotated dump.
///
/// Each non-empty line starts with 64 hex characters (one word, no `0x`), and
/// anything after that is a free-form annotation.
struct ExpectWords<'a> {
    lines: Vec<&'a str>,
    next: usize,
}

impl<'a> ExpectWords<'a> {
    fn new(dump: &'a str) -> Self {
        let lines: Vec<_> = dump.lines().filter(|l| !l.trim().is_empty()).collect();
        for line in &lines {
            assert!(
                line.trim().len() >= 64,
                "line {:?} does not start with a 32 byte word",
                line
            );
        }
        Self { lines, next: 0 }
    }

    fn finish(self) {
        assert_eq!(
            self.next,
            self.lines.len(),
            "encoding stopped before {:?}",
            self.lines.get(self.next)
        );
    }
}

impl Writer for ExpectWords<'_> {
    fn write(&mut self, slot: &[u8]) {
        assert_eq!(slot.len(), 32, "writers only ever see whole words");
        let line = match self.lines.get(self.next) {
            Some(line) => line.trim(),
            None => panic!("unexpected extra word {:?}", Word(slot)),
        };
        self.next += 1;

        let mut expected = [0u8; 32];
        hex::decode_to_slice(&line[..64], &mut expected).unwrap();
        assert_eq!(Word(slot), Word(&expected), "mismatch at {}", line);
    }
}

/// Encode `tokens` as `abi.encode(tokens...)` would and compare word by word.
pub fn encode_and_compare(tokens: &[Token], expected: &str) {
    let mut writer = ExpectWords::new(expected);
    to_writer(tokens, &mut writer).unwrap();
    writer.finish();
}

pub fn uints(values: &[u64]) -> Vec<Token> {
    values.iter().map(|v| Token::uint(*v)).collect()
}
