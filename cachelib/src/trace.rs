use std::io::{self, BufRead, Split};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;
use crate::cache::AccessKind;
use crate::error::TraceFormatError;

lazy_static! {
    // Kind and address, anything after them (sizes, PCs, ...) is ignored
    static ref ACCESS_LINE: Regex = Regex::new(r"^(?P<kind>\S+)(?:\s+(?P<address>\S+))?(?:\s+.*)?$").unwrap();
}

/// One memory access from a trace
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub kind: AccessKind,
    pub address: u64,
}

impl TraceRecord {
    pub fn read(address: u64) -> Self {
        Self { kind: AccessKind::Read, address }
    }

    pub fn write(address: u64) -> Self {
        Self { kind: AccessKind::Write, address }
    }
}

/// Parses a hexadecimal address, with or without a `0x` prefix
///
/// # Examples
///
/// ```
/// use cachelib::trace::parse_address;
/// assert_eq!(parse_address("0x1F40"), Some(8000));
/// assert_eq!(parse_address("1f40"), Some(8000));
/// assert_eq!(parse_address("0xZZ"), None);
/// ```
pub fn parse_address(token: &str) -> Option<u64> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

fn strip_comment(line: &str) -> &str {
    let content = match line.find('#') {
        Some(index) => &line[..index],
        None => line,
    };
    content.trim()
}

/// Parses one line of an access trace, `R 0x1000` or `W 1000`
///
/// Blank lines and `#` comments give `Ok(None)`.
pub fn parse_access_line(line_number: usize, line: &str) -> Result<Option<TraceRecord>, TraceFormatError> {
    let line = strip_comment(line);
    if line.is_empty() {
        return Ok(None);
    }
    let captures = ACCESS_LINE
        .captures(line)
        .ok_or(TraceFormatError::MissingField { line: line_number })?;
    let kind_token = &captures["kind"];
    let address_token = captures
        .name("address")
        .ok_or(TraceFormatError::MissingField { line: line_number })?
        .as_str();
    let kind = match kind_token {
        "R" | "r" => AccessKind::Read,
        "W" | "w" => AccessKind::Write,
        _ => {
            return Err(TraceFormatError::UnknownAccessKind {
                line: line_number,
                token: kind_token.to_string(),
            })
        }
    };
    let address = parse_address(address_token).ok_or_else(|| TraceFormatError::BadAddress {
        line: line_number,
        token: address_token.to_string(),
    })?;
    Ok(Some(TraceRecord { kind, address }))
}

fn decode_line(line_number: usize, bytes: &[u8]) -> Result<&str, TraceFormatError> {
    std::str::from_utf8(bytes).map_err(|_| TraceFormatError::InvalidEncoding { line: line_number })
}

/// Streams [`TraceRecord`]s out of a reader
///
/// Lines which can't be parsed, including ones that aren't UTF-8, are logged, counted and
/// skipped. Only I/O errors end the stream.
pub struct AccessTrace<R> {
    lines: Split<R>,
    line_number: usize,
    skipped: usize,
}

impl<R: BufRead> AccessTrace<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.split(b'\n'),
            line_number: 0,
            skipped: 0,
        }
    }

    /// Number of malformed lines skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<R: BufRead> Iterator for AccessTrace<R> {
    type Item = io::Result<TraceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            self.line_number += 1;
            let parsed = decode_line(self.line_number, &line).and_then(|text| parse_access_line(self.line_number, text));
            match parsed {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => {}
                Err(e) => {
                    warn!("skipping trace entry: {e}");
                    self.skipped += 1;
                }
            }
        }
    }
}

/// A trace of raw way indices, for driving replacement policies directly
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WayTrace {
    pub ways: Vec<usize>,
    pub skipped: usize,
}

/// Reads whitespace separated way indices, skipping (with a warning) anything which isn't a
/// number in `[0, ways)`
pub fn read_way_trace<R: BufRead>(reader: R, ways: usize) -> io::Result<WayTrace> {
    let mut trace = WayTrace::default();
    for (index, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        let text = match decode_line(index + 1, &line) {
            Ok(text) => text,
            Err(e) => {
                warn!("skipping trace entry: {e}");
                trace.skipped += 1;
                continue;
            }
        };
        for token in strip_comment(text).split_whitespace() {
            match parse_way(index + 1, token, ways) {
                Ok(way) => trace.ways.push(way),
                Err(e) => {
                    warn!("skipping trace entry: {e}");
                    trace.skipped += 1;
                }
            }
        }
    }
    Ok(trace)
}

fn parse_way(line: usize, token: &str, ways: usize) -> Result<usize, TraceFormatError> {
    let way = token.parse::<usize>().map_err(|_| TraceFormatError::BadWay {
        line,
        token: token.to_string(),
    })?;
    if way >= ways {
        return Err(TraceFormatError::WayOutOfRange { line, way, ways });
    }
    Ok(way)
}
