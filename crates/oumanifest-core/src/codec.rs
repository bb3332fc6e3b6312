//! Manifest text format.
//!
//! A manifest is a header followed by blank-line terminated records:
//!
//! ```text
//! OUmanifest 1
//!
//! file regular
//! data 5 path
//! a.txt
//! size 12
//! mtime 1700000000 0
//!
//! ```
//!
//! The path is length-prefixed, so it may contain any byte except NUL,
//! including newlines.

use std::io::{BufRead, Read, Write};
use std::path::Path;

use crate::config::ManifestConfig;
use crate::error::ManifestError;
use crate::record::{FileKind, FileRecord, Metadata, Mtime};

/// Magic token on the first header line.
pub const MAGIC: &str = "OUmanifest";

/// The only manifest version this crate reads and writes.
pub const VERSION: i64 = 1;

/// Largest buffer reserved up front for a `data` field.
const DATA_PREALLOC_LIMIT: usize = 64 * 1024;

/// Write the manifest header.
pub fn write_header<W: Write>(out: &mut W) -> Result<(), ManifestError> {
    write!(out, "{MAGIC} {VERSION}\n\n").map_err(|e| ManifestError::io("write manifest header", e))
}

/// Write a single record.
pub fn encode_record<W: Write>(out: &mut W, record: &FileRecord) -> Result<(), ManifestError> {
    if record.path.contains(&0) {
        return Err(ManifestError::InvalidPath {
            path: record.display_path(),
        });
    }

    writeln!(out, "file {}", record.kind.tag())
        .map_err(|e| ManifestError::io("write file record header", e))?;

    writeln!(out, "data {} path", record.path.len())
        .and_then(|()| out.write_all(&record.path))
        .and_then(|()| out.write_all(b"\n"))
        .map_err(|e| ManifestError::io("write path field", e))?;

    if let Some(size) = record.size {
        writeln!(out, "size {size}").map_err(|e| ManifestError::io("write size field", e))?;
    }

    if let Some(mtime) = record.mtime {
        writeln!(out, "mtime {} {}", mtime.seconds, mtime.nanoseconds)
            .map_err(|e| ManifestError::io("write mtime field", e))?;
    }

    out.write_all(b"\n")
        .map_err(|e| ManifestError::io("terminate file record", e))
}

/// Encode a record into a byte vector.
pub fn encode(record: &FileRecord) -> Result<Vec<u8>, ManifestError> {
    let mut buf = Vec::with_capacity(record.path.len() + 48);
    encode_record(&mut buf, record)?;
    Ok(buf)
}

/// Read and validate the manifest header.
///
/// Returns the number of lines consumed. Extra header lines up to the first
/// blank line are skipped.
pub fn read_header<R: BufRead>(input: &mut R) -> Result<usize, ManifestError> {
    let mut line = Vec::new();
    let n = input
        .read_until(b'\n', &mut line)
        .map_err(|e| ManifestError::io("read manifest header", e))?;
    if n == 0 {
        return Err(ManifestError::malformed(1, "empty input, expected manifest header"));
    }

    let text = String::from_utf8_lossy(&line);
    let mut tokens = text.split_whitespace();

    if tokens.next() != Some(MAGIC) {
        return Err(ManifestError::malformed(1, "input is not an OUmanifest file"));
    }

    let version: i64 = tokens
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| ManifestError::malformed(1, "invalid manifest version number"))?;

    if version != VERSION {
        return Err(ManifestError::UnsupportedVersion { version });
    }

    let mut consumed = 1;
    loop {
        line.clear();
        let n = input
            .read_until(b'\n', &mut line)
            .map_err(|e| ManifestError::io("read manifest header", e))?;
        if n == 0 {
            break;
        }
        consumed += 1;
        if line == b"\n" {
            break;
        }
    }

    Ok(consumed)
}

/// Streaming manifest writer.
///
/// The header is written when the writer is created.
pub struct ManifestWriter<W: Write> {
    out: W,
    records: u64,
    recorded_size: u64,
}

impl<W: Write> ManifestWriter<W> {
    /// Write the header and return a writer positioned for records.
    pub fn begin(mut out: W) -> Result<Self, ManifestError> {
        write_header(&mut out)?;
        Ok(Self {
            out,
            records: 0,
            recorded_size: 0,
        })
    }

    /// Write a record as-is.
    pub fn write_record(&mut self, record: &FileRecord) -> Result<(), ManifestError> {
        encode_record(&mut self.out, record)?;
        self.records += 1;
        self.recorded_size += record.size.unwrap_or(0);
        Ok(())
    }

    /// Write a record for probed metadata if its kind is selected.
    ///
    /// Returns `true` if a record was written.
    pub fn write_entry(
        &mut self,
        path: &Path,
        metadata: &Metadata,
        config: &ManifestConfig,
    ) -> Result<bool, ManifestError> {
        let selected = metadata.kind.is_some_and(|kind| config.kinds.contains(kind));
        if !selected {
            return Ok(false);
        }

        match FileRecord::from_metadata(path, metadata, &config.fields) {
            Some(record) => {
                self.write_record(&record)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Number of records written so far.
    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Sum of the `size` fields written so far.
    pub fn recorded_size(&self) -> u64 {
        self.recorded_size
    }

    /// Flush and return the underlying sink.
    pub fn finish(mut self) -> Result<W, ManifestError> {
        self.out
            .flush()
            .map_err(|e| ManifestError::io("flush manifest output", e))?;
        Ok(self.out)
    }
}

/// Streaming manifest reader.
///
/// The header is validated when the reader is opened, before any record is
/// read.
pub struct ManifestReader<R: BufRead> {
    input: R,
    line: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> ManifestReader<R> {
    /// Validate the header and return a reader positioned at the first record.
    pub fn open(mut input: R) -> Result<Self, ManifestError> {
        let line = read_header(&mut input)?;
        Ok(Self {
            input,
            line,
            buf: Vec::new(),
        })
    }

    /// Current line number, for diagnostics.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Read the next record, or `None` at a clean end of input.
    pub fn next_record(&mut self) -> Result<Option<FileRecord>, ManifestError> {
        let start = match self.read_line()? {
            Some(line) => line,
            None => return Ok(None),
        };

        let kind = match start.strip_prefix("file ") {
            Some(tag) => tag.parse::<FileKind>().map_err(|_| {
                ManifestError::malformed(self.line, format!("unknown file type \"{tag}\""))
            })?,
            None => {
                return Err(ManifestError::malformed(
                    self.line,
                    format!("expected record start, found \"{start}\""),
                ));
            }
        };

        let mut path: Option<Vec<u8>> = None;
        let mut size: Option<u64> = None;
        let mut mtime: Option<Mtime> = None;

        loop {
            let line = self
                .read_line()?
                .ok_or_else(|| ManifestError::malformed(self.line, "unexpected end of manifest"))?;

            if line.is_empty() {
                break;
            }

            let mut tokens = line.split(' ');
            match tokens.next() {
                Some("data") => {
                    let len: usize = tokens
                        .next()
                        .and_then(|t| t.parse().ok())
                        .ok_or_else(|| ManifestError::malformed(self.line, "invalid data length"))?;
                    if tokens.next() != Some("path") || tokens.next().is_some() {
                        return Err(ManifestError::malformed(self.line, "unknown data field"));
                    }
                    if path.is_some() {
                        return Err(ManifestError::malformed(self.line, "duplicate path field"));
                    }
                    path = Some(self.read_data(len)?);
                }
                Some("size") => {
                    let value = tokens
                        .next()
                        .and_then(|t| t.parse().ok())
                        .filter(|_| tokens.next().is_none())
                        .ok_or_else(|| ManifestError::malformed(self.line, "invalid size field"))?;
                    if size.replace(value).is_some() {
                        return Err(ManifestError::malformed(self.line, "duplicate size field"));
                    }
                }
                Some("mtime") => {
                    let seconds = tokens.next().and_then(|t| t.parse::<u64>().ok());
                    let nanoseconds = tokens.next().and_then(|t| t.parse::<i64>().ok());
                    let value = match (seconds, nanoseconds, tokens.next()) {
                        (Some(s), Some(ns), None) => Mtime::new(s, ns),
                        _ => {
                            return Err(ManifestError::malformed(self.line, "invalid mtime field"));
                        }
                    };
                    if mtime.replace(value).is_some() {
                        return Err(ManifestError::malformed(self.line, "duplicate mtime field"));
                    }
                }
                _ => {
                    return Err(ManifestError::malformed(
                        self.line,
                        format!("unknown field \"{line}\""),
                    ));
                }
            }
        }

        let path =
            path.ok_or_else(|| ManifestError::malformed(self.line, "record has no path field"))?;

        Ok(Some(FileRecord {
            path,
            kind,
            size,
            mtime,
        }))
    }

    /// Read one newline-terminated text line, without the newline.
    fn read_line(&mut self) -> Result<Option<String>, ManifestError> {
        self.buf.clear();
        let n = self
            .input
            .read_until(b'\n', &mut self.buf)
            .map_err(|e| ManifestError::io("read manifest record", e))?;
        if n == 0 {
            return Ok(None);
        }
        self.line += 1;

        if self.buf.pop() != Some(b'\n') {
            return Err(ManifestError::malformed(self.line, "unterminated line"));
        }

        String::from_utf8(std::mem::take(&mut self.buf))
            .map(Some)
            .map_err(|_| ManifestError::malformed(self.line, "field line is not valid UTF-8"))
    }

    /// Read exactly `len` raw bytes followed by a newline.
    fn read_data(&mut self, len: usize) -> Result<Vec<u8>, ManifestError> {
        let total = len
            .checked_add(1)
            .ok_or_else(|| ManifestError::malformed(self.line, "invalid data length"))?;

        // Grow only with bytes that arrive; the length is untrusted
        let mut data = Vec::with_capacity(total.min(DATA_PREALLOC_LIMIT));
        (&mut self.input)
            .take(total as u64)
            .read_to_end(&mut data)
            .map_err(|e| ManifestError::io("read manifest record", e))?;
        if data.len() < total {
            return Err(ManifestError::malformed(self.line, "path data is truncated"));
        }

        self.line += 1 + data[..len].iter().filter(|&&b| b == b'\n').count();

        if data.pop() != Some(b'\n') {
            return Err(ManifestError::malformed(self.line, "path data is not newline terminated"));
        }
        if data.contains(&0) {
            return Err(ManifestError::malformed(self.line, "path contains a NUL byte"));
        }

        Ok(data)
    }
}

impl<R: BufRead> Iterator for ManifestReader<R> {
    type Item = Result<FileRecord, ManifestError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
