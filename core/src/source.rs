/*
 * source.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Busta, a MIME message codec library.
 *
 * Busta is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Busta is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Busta.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Backing stores for part content: a uniform lazy byte-range reader
//! over buffers, files, and caller-supplied sources.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use bytes::Bytes;

/// A named, typed, re-openable byte source supplied by the caller.
pub trait DataSource {
    fn name(&self) -> Option<&str> {
        None
    }

    fn content_type(&self) -> Option<&str> {
        None
    }

    /// Open a fresh stream over the full content.  Each call may open a
    /// new handle; the caller drops it when done.
    fn open(&self) -> io::Result<Box<dyn Read>>;
}

/// A range-addressable stream factory supplied by the caller.  `end` of
/// -1 means to the end of the source, and `size` may return -1 when the
/// length is only discoverable by reading.
pub trait StreamSource {
    fn new_stream(&self, start: i64, end: i64) -> io::Result<Box<dyn Read>>;

    fn size(&self) -> i64;
}

#[derive(Clone)]
enum SourceKind {
    Memory(Bytes),
    File(PathBuf),
    Data(Rc<dyn DataSource>),
    Stream(Rc<dyn StreamSource>),
}

/// Where a part's raw bytes actually live.  Cloning is cheap; the
/// underlying store is shared, not copied.
#[derive(Clone)]
pub struct PartSource {
    kind: SourceKind,
    length: i64,
}

impl PartSource {
    pub fn memory(content: impl Into<Bytes>) -> PartSource {
        let content = content.into();
        let length = content.len() as i64;
        PartSource { kind: SourceKind::Memory(content), length }
    }

    /// A file-backed source.  The length is snapshotted now; a missing
    /// file reads as empty.
    pub fn file(path: impl AsRef<Path>) -> PartSource {
        let path = path.as_ref().to_path_buf();
        let length = std::fs::metadata(&path).map(|m| m.len() as i64).unwrap_or(0);
        PartSource { kind: SourceKind::File(path), length }
    }

    pub fn data(source: Rc<dyn DataSource>) -> PartSource {
        PartSource { kind: SourceKind::Data(source), length: -1 }
    }

    pub fn stream(source: Rc<dyn StreamSource>) -> PartSource {
        let length = source.size();
        PartSource { kind: SourceKind::Stream(source), length }
    }

    /// Total length in bytes, or -1 when only discoverable by reading.
    pub fn length(&self) -> i64 {
        self.length
    }

    /// A reader over `[start, end)`, clamped to the source bounds; `end`
    /// of -1 means to the end of the source.
    pub fn content_stream(&self, start: i64, end: i64) -> io::Result<Box<dyn Read>> {
        let sbound = if self.length == -1 { i64::MAX } else { self.length };
        let sstart = start.clamp(0, sbound);
        let send = if end < 0 { self.length } else { end.clamp(sstart, sbound) };

        if sstart == send {
            return Ok(Box::new(io::empty()));
        }
        match &self.kind {
            SourceKind::Memory(content) => {
                let slice = content.slice(sstart as usize..send as usize);
                Ok(Box::new(io::Cursor::new(slice)))
            }
            SourceKind::File(path) => {
                let mut file = File::open(path)?;
                file.seek(SeekFrom::Start(sstart as u64))?;
                Ok(Box::new(file.take((send - sstart) as u64)))
            }
            SourceKind::Data(source) => {
                let mut stream = source.open()?;
                io::copy(&mut stream.by_ref().take(sstart as u64), &mut io::sink())?;
                if send == -1 {
                    Ok(stream)
                } else {
                    Ok(Box::new(stream.take((send - sstart) as u64)))
                }
            }
            SourceKind::Stream(source) => source.new_stream(sstart, send),
        }
    }

    /// The bytes of `[start, end)`, clamped the same way as
    /// `content_stream`.
    pub fn content(&self, start: i64, end: i64) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.content_stream(start, end)?.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Write;

    #[test]
    fn memory_range() {
        let source = PartSource::memory(&b"Hambone"[..]);
        assert_eq!(source.length(), 7);
        assert_eq!(source.content(0, -1).unwrap(), b"Hambone");
        assert_eq!(source.content(3, 7).unwrap(), b"bone");
        assert_eq!(source.content(3, 3).unwrap(), b"");
    }

    #[test]
    fn range_clamping() {
        let source = PartSource::memory(&b"Hambone"[..]);
        assert_eq!(source.content(-5, 2).unwrap(), b"Ha");
        assert_eq!(source.content(3, 100).unwrap(), b"bone");
        assert_eq!(source.content(100, 200).unwrap(), b"");
        assert_eq!(source.content(5, 2).unwrap(), b"");
    }

    #[test]
    fn file_range() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Hambone says hello").unwrap();
        file.flush().unwrap();

        let source = PartSource::file(file.path());
        assert_eq!(source.length(), 18);
        assert_eq!(source.content(8, 12).unwrap(), b"says");
        assert_eq!(source.content(13, -1).unwrap(), b"hello");
    }

    #[test]
    fn missing_file_reads_empty() {
        let source = PartSource::file("/no/such/busta/file");
        assert_eq!(source.length(), 0);
        assert_eq!(source.content(0, -1).unwrap(), b"");
    }

    struct CountingData {
        opens: Cell<u32>,
    }

    impl DataSource for CountingData {
        fn open(&self) -> io::Result<Box<dyn Read>> {
            self.opens.set(self.opens.get() + 1);
            Ok(Box::new(io::Cursor::new(b"0123456789".to_vec())))
        }
    }

    #[test]
    fn data_source_opens_fresh_stream_per_range() {
        let data = Rc::new(CountingData { opens: Cell::new(0) });
        let source = PartSource::data(data.clone());
        assert_eq!(source.length(), -1);
        assert_eq!(source.content(2, 6).unwrap(), b"2345");
        assert_eq!(source.content(0, -1).unwrap(), b"0123456789");
        assert_eq!(data.opens.get(), 2);
    }

    struct RangeRecorder {
        last: Cell<(i64, i64)>,
    }

    impl StreamSource for RangeRecorder {
        fn new_stream(&self, start: i64, end: i64) -> io::Result<Box<dyn Read>> {
            self.last.set((start, end));
            Ok(Box::new(io::Cursor::new(b"abcdef"[start as usize..end as usize].to_vec())))
        }

        fn size(&self) -> i64 {
            6
        }
    }

    #[test]
    fn stream_source_receives_clamped_range() {
        let recorder = Rc::new(RangeRecorder { last: Cell::new((0, 0)) });
        let source = PartSource::stream(recorder.clone());
        assert_eq!(source.content(-3, 100).unwrap(), b"abcdef");
        assert_eq!(recorder.last.get(), (0, 6));
        assert_eq!(source.content(2, 4).unwrap(), b"cd");
        assert_eq!(recorder.last.get(), (2, 4));
    }
}
