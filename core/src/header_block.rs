/*
 * header_block.rs
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

//! An ordered block of header fields.  Reads return the last matching
//! field; writes place fields according to their protocol position and
//! notify the owning part so it can track dirtiness.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::header::{HeaderInfo, MimeHeader};
use crate::part::{MimePart, PartInner};

struct BlockInner {
    headers: Vec<MimeHeader>,
    part: Weak<RefCell<PartInner>>,
}

/// Handle to a header block.  Clones share the same block.
#[derive(Clone)]
pub struct MimeHeaderBlock {
    inner: Rc<RefCell<BlockInner>>,
}

impl MimeHeaderBlock {
    pub fn new() -> MimeHeaderBlock {
        MimeHeaderBlock {
            inner: Rc::new(RefCell::new(BlockInner { headers: Vec::new(), part: Weak::new() })),
        }
    }

    pub(crate) fn attach_part(&self, part: Weak<RefCell<PartInner>>) {
        self.inner.borrow_mut().part = part;
    }

    /// Append a field captured off the wire, preserving wire order and
    /// without notifying the part.
    pub(crate) fn append_parsed(&self, header: MimeHeader) {
        self.inner.borrow_mut().headers.push(header);
    }

    fn announce(&self, name: &str) {
        let part = self.inner.borrow().part.upgrade();
        if let Some(inner) = part {
            MimePart::from_inner(inner).header_changed(name);
        }
    }

    /// Decoded value of the last field named `name`.
    pub fn value(&self, name: &str, charset: Option<&str>) -> Option<String> {
        let mut inner = self.inner.borrow_mut();
        inner
            .headers
            .iter_mut()
            .rev()
            .find(|h| h.name().eq_ignore_ascii_case(name))
            .map(|h| h.value(charset))
    }

    /// Value of the last field named `name` with only the trailing CRLF
    /// removed.
    pub fn encoded_value(&self, name: &str, charset: Option<&str>) -> Option<String> {
        let mut inner = self.inner.borrow_mut();
        inner
            .headers
            .iter_mut()
            .rev()
            .find(|h| h.name().eq_ignore_ascii_case(name))
            .map(|h| h.encoded_value(charset))
    }

    /// The complete raw line of the last field named `name`.
    pub fn raw_header(&self, name: &str) -> Option<Vec<u8>> {
        let mut inner = self.inner.borrow_mut();
        inner
            .headers
            .iter_mut()
            .rev()
            .find(|h| h.name().eq_ignore_ascii_case(name))
            .map(|h| h.raw_header().to_vec())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.borrow().headers.iter().any(|h| h.name().eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().headers.is_empty()
    }

    /// Snapshot of the fields, in block order.
    pub fn headers(&self) -> Vec<MimeHeader> {
        self.inner.borrow().headers.clone()
    }

    /// Add a field at the position its name calls for.  Unique fields
    /// replace any existing occurrence instead of stacking.
    pub fn add(&self, header: MimeHeader) {
        if header.info().unique {
            self.set(header);
            return;
        }
        let name = header.name().to_string();
        {
            let mut inner = self.inner.borrow_mut();
            let at = insertion_index(&inner.headers, header.info());
            inner.headers.insert(at, header);
        }
        self.announce(&name);
    }

    /// Replace the first field named like `header` in place and drop any
    /// other occurrences; absent that, insert at the placement position.
    pub fn set(&self, header: MimeHeader) {
        let name = header.name().to_string();
        {
            let mut inner = self.inner.borrow_mut();
            let first = inner.headers.iter().position(|h| h.name().eq_ignore_ascii_case(&name));
            match first {
                Some(at) => {
                    inner.headers[at] = header;
                    let mut index = at + 1;
                    while index < inner.headers.len() {
                        if inner.headers[index].name().eq_ignore_ascii_case(&name) {
                            inner.headers.remove(index);
                        } else {
                            index += 1;
                        }
                    }
                }
                None => {
                    let at = insertion_index(&inner.headers, header.info());
                    inner.headers.insert(at, header);
                }
            }
        }
        self.announce(&name);
    }

    /// Set or, when `header` is absent, remove every field named `name`.
    pub fn set_named(&self, name: &str, header: Option<MimeHeader>) {
        match header {
            Some(header) => self.set(header),
            None => self.remove(name),
        }
    }

    pub fn remove(&self, name: &str) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.headers.retain(|h| !h.name().eq_ignore_ascii_case(name));
        }
        self.announce(name);
    }

    /// The serialized block: every header line followed by the blank
    /// separator line.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut inner = self.inner.borrow_mut();
        let mut buf = Vec::new();
        for header in inner.headers.iter_mut() {
            buf.extend_from_slice(header.raw_header());
        }
        buf.extend_from_slice(b"\r\n");
        buf
    }
}

impl Default for MimeHeaderBlock {
    fn default() -> MimeHeaderBlock {
        MimeHeaderBlock::new()
    }
}

/// Where a new field belongs: prepending fields go in front of their
/// position run, everything else after the last field that sorts at or
/// before it.
fn insertion_index(headers: &[MimeHeader], info: &HeaderInfo) -> usize {
    if info.prepend || info.first {
        headers
            .iter()
            .position(|h| h.info().position >= info.position)
            .unwrap_or(headers.len())
    } else {
        headers
            .iter()
            .rposition(|h| h.info().position <= info.position)
            .map(|i| i + 1)
            .unwrap_or(0)
    }
}
