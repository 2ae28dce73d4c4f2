//! Decoder for settings written in the legacy serialized-scalar format.
//!
//! Older rows store arrays and scalars as `a:2:{i:0;s:2:"en";i:1;s:2:"fr";}`
//! style strings instead of JSON. Only decoding is supported; new writes
//! always use JSON.

use serde_json::{Map, Number, Value};

/// Deepest array nesting accepted before the input is treated as malformed.
const MAX_DEPTH: usize = 32;

/// Decodes one serialized value. Returns `None` for malformed input,
/// nesting deeper than `MAX_DEPTH` or trailing garbage.
pub fn unserialize(input: &str) -> Option<Value> {
    let mut parser = Parser {
        bytes: input.as_bytes(),
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    if parser.pos == parser.bytes.len() {
        Some(value)
    } else {
        None
    }
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn value(&mut self) -> Option<Value> {
        let tag = self.next()?;
        match tag {
            b'N' => {
                self.expect(b';')?;
                Some(Value::Null)
            }
            b'b' => {
                self.expect(b':')?;
                let raw = self.until(b';')?;
                match raw {
                    "0" => Some(Value::Bool(false)),
                    "1" => Some(Value::Bool(true)),
                    _ => None,
                }
            }
            b'i' => {
                self.expect(b':')?;
                let raw = self.until(b';')?;
                raw.parse::<i64>().ok().map(Value::from)
            }
            b'd' => {
                self.expect(b':')?;
                let raw = self.until(b';')?;
                let float = raw.parse::<f64>().ok()?;
                Number::from_f64(float).map(Value::Number)
            }
            b's' => {
                let text = self.string_body()?;
                self.expect(b';')?;
                Some(Value::String(text))
            }
            b'a' => self.array(),
            _ => None,
        }
    }

    fn array(&mut self) -> Option<Value> {
        if self.depth >= MAX_DEPTH {
            return None;
        }
        self.expect(b':')?;
        let len = self.until(b':')?.parse::<usize>().ok()?;
        self.expect(b'{')?;

        // Every entry takes at least six bytes (`i:0;N;`).
        let remaining = self.bytes.len() - self.pos;
        if len > remaining / 6 {
            return None;
        }

        self.depth += 1;
        let mut entries = Vec::with_capacity(len);
        for _ in 0..len {
            let key = match self.value()? {
                Value::Number(number) => number.to_string(),
                Value::String(text) => text,
                _ => return None,
            };
            let value = self.value()?;
            entries.push((key, value));
        }
        self.depth -= 1;
        self.expect(b'}')?;

        let sequential = entries
            .iter()
            .enumerate()
            .all(|(index, (key, _))| key.parse::<usize>().ok() == Some(index));
        if sequential {
            return Some(Value::Array(
                entries.into_iter().map(|(_, value)| value).collect(),
            ));
        }
        Some(Value::Object(entries.into_iter().collect::<Map<_, _>>()))
    }

    /// Parses `:<len>:"<bytes>"` where `len` counts bytes, not characters.
    fn string_body(&mut self) -> Option<String> {
        self.expect(b':')?;
        let len = self.until(b':')?.parse::<usize>().ok()?;
        self.expect(b'"')?;
        let end = self.pos.checked_add(len)?;
        let slice = self.bytes.get(self.pos..end)?;
        let text = std::str::from_utf8(slice).ok()?.to_string();
        self.pos = end;
        self.expect(b'"')?;
        Some(text)
    }

    fn next(&mut self) -> Option<u8> {
        let byte = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn expect(&mut self, expected: u8) -> Option<()> {
        (self.next()? == expected).then_some(())
    }

    fn until(&mut self, delimiter: u8) -> Option<&'a str> {
        let bytes = self.bytes;
        let start = self.pos;
        let offset = bytes.get(start..)?.iter().position(|byte| *byte == delimiter)?;
        self.pos = start + offset + 1;
        std::str::from_utf8(&bytes[start..start + offset]).ok()
    }
}
