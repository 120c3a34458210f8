/*
 * part.rs
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

//! The part tree.  Every node carries its own header block, a content
//! locator into a backing source, and a dirty level that says which of
//! the cached offsets can still be trusted.

use std::cell::RefCell;
use std::io::{self, Read};
use std::process;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::base64::{Base64Decoder, Base64Encoder};
use crate::content_disposition::ContentDisposition;
use crate::content_type::ContentType;
use crate::cte::TransferEncoding;
use crate::header::MimeHeader;
use crate::header_block::MimeHeaderBlock;
use crate::parameters::is_valid_boundary;
use crate::quoted_printable::{QuotedPrintableDecoder, QuotedPrintableEncoder};
use crate::source::PartSource;
use crate::streams::{ChainItem, ChainReader};

/// How stale a node's cached offsets are.  Levels only ever escalate:
/// HEADERS means the header block must be reserialized but the body
/// bytes are still where they were; CTE additionally means the body
/// must be re-encoded; CONTENT means even the body offsets are gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Dirty {
    None,
    Headers,
    Cte,
    Content,
}

impl Dirty {
    pub(crate) fn combine(self, other: Dirty) -> Dirty {
        self.max(other)
    }
}

/// Leaf transfer-encoding state: `encoding` is how the backing bytes
/// are actually encoded, `target_encoding` is how the part will be
/// encoded when serialized.  They diverge when the header is changed
/// out from under the content.
pub(crate) struct BodyState {
    pub(crate) encoding: TransferEncoding,
    pub(crate) target_encoding: TransferEncoding,
}

pub(crate) struct MultipartState {
    pub(crate) children: Vec<MimePart>,
    /// Effective boundary, which may have been adopted from the body
    /// when the header omitted it.
    pub(crate) boundary: Option<String>,
}

pub(crate) struct MessageState {
    pub(crate) body: Option<MimePart>,
}

pub(crate) enum PartKind {
    Body(BodyState),
    Multipart(MultipartState),
    Message(MessageState),
}

pub(crate) struct PartInner {
    pub(crate) kind: PartKind,
    pub(crate) parent: Weak<RefCell<PartInner>>,
    pub(crate) headers: Option<MimeHeaderBlock>,
    pub(crate) content_type: ContentType,
    // byte offsets into the resolved source, -1 when unknown
    pub(crate) start_offset: i64,
    pub(crate) body_offset: i64,
    pub(crate) end_offset: i64,
    pub(crate) size: i64,
    pub(crate) line_count: i64,
    pub(crate) dirty: Dirty,
    pub(crate) source: Option<PartSource>,
    pub(crate) default_charset: Option<String>,
}

/// Shared handle to a node in a part tree.  Clones refer to the same
/// node.  Trees are single-threaded; callers serialize access.
#[derive(Clone)]
pub struct MimePart {
    pub(crate) inner: Rc<RefCell<PartInner>>,
}

impl MimePart {
    pub(crate) fn from_inner(inner: Rc<RefCell<PartInner>>) -> MimePart {
        MimePart { inner }
    }

    /// A fresh programmatic node with no recorded offsets.
    pub(crate) fn new_node(kind: PartKind) -> MimePart {
        MimePart {
            inner: Rc::new(RefCell::new(PartInner {
                kind,
                parent: Weak::new(),
                headers: None,
                content_type: ContentType::default(),
                start_offset: -1,
                body_offset: -1,
                end_offset: -1,
                size: -1,
                line_count: -1,
                dirty: Dirty::Content,
                source: None,
                default_charset: None,
            })),
        }
    }

    /// A node materialized by the parser once its header block is
    /// complete.  Offsets stay provisional until `record_endpoint`.
    pub(crate) fn parsed(
        kind: PartKind,
        ctype: ContentType,
        block: MimeHeaderBlock,
        start_offset: i64,
        body_offset: i64,
    ) -> MimePart {
        let part = MimePart {
            inner: Rc::new(RefCell::new(PartInner {
                kind,
                parent: Weak::new(),
                headers: Some(block.clone()),
                content_type: ctype,
                start_offset,
                body_offset,
                end_offset: -1,
                size: -1,
                line_count: -1,
                dirty: Dirty::Content,
                source: None,
                default_charset: None,
            })),
        };
        block.attach_part(Rc::downgrade(&part.inner));
        part
    }

    pub fn parent(&self) -> Option<MimePart> {
        self.inner.borrow().parent.upgrade().map(MimePart::from_inner)
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self.inner.borrow().kind, PartKind::Multipart(_))
    }

    pub fn is_message(&self) -> bool {
        matches!(self.inner.borrow().kind, PartKind::Message(_))
    }

    /// Unlink from the parent.  The node first resolves and pins its
    /// backing source so range reads keep working after the parent is
    /// discarded.
    pub fn detach(&self) {
        let source = self.resolved_source();
        self.inner.borrow_mut().source = source;
        let parent = self.parent();
        self.inner.borrow_mut().parent = Weak::new();
        if let Some(parent) = parent {
            parent.remove_child(self);
        }
    }

    pub(crate) fn set_parent(&self, parent: &MimePart) {
        let same = self
            .inner
            .borrow()
            .parent
            .upgrade()
            .is_some_and(|p| Rc::ptr_eq(&p, &parent.inner));
        if !same {
            self.detach();
            self.inner.borrow_mut().parent = Rc::downgrade(&parent.inner);
        }
    }

    pub(crate) fn remove_child(&self, child: &MimePart) {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            match &mut inner.kind {
                PartKind::Multipart(state) => {
                    let before = state.children.len();
                    state.children.retain(|c| !Rc::ptr_eq(&c.inner, &child.inner));
                    state.children.len() != before
                }
                PartKind::Message(state) => {
                    let matched = state
                        .body
                        .as_ref()
                        .is_some_and(|b| Rc::ptr_eq(&b.inner, &child.inner));
                    if matched {
                        state.body = None;
                    }
                    matched
                }
                PartKind::Body(_) => false,
            }
        };
        if removed {
            self.mark_dirty(Dirty::Content);
        }
    }

    /// Wire a child in during parsing, without disturbing dirty state.
    pub(crate) fn adopt_child(&self, child: &MimePart) {
        child.inner.borrow_mut().parent = Rc::downgrade(&self.inner);
        let mut inner = self.inner.borrow_mut();
        match &mut inner.kind {
            PartKind::Multipart(state) => state.children.push(child.clone()),
            PartKind::Message(state) => state.body = Some(child.clone()),
            PartKind::Body(_) => {}
        }
    }

    /// The nearest backing source, own or inherited from an ancestor.
    pub(crate) fn resolved_source(&self) -> Option<PartSource> {
        let mut current = Some(self.clone());
        while let Some(part) = current {
            let source = part.inner.borrow().source.clone();
            if source.is_some() {
                return source;
            }
            current = part.parent();
        }
        None
    }

    // ------------------------------------------------------------------
    // headers

    /// The node's header block, created on first use.
    pub fn header_block(&self) -> MimeHeaderBlock {
        let existing = self.inner.borrow().headers.clone();
        match existing {
            Some(block) => block,
            None => {
                let block = MimeHeaderBlock::new();
                block.attach_part(Rc::downgrade(&self.inner));
                self.inner.borrow_mut().headers = Some(block.clone());
                block
            }
        }
    }

    /// Decoded value of the named header, using the tree's default
    /// charset for any raw 8-bit bytes.
    pub fn header(&self, name: &str) -> Option<String> {
        let block = self.inner.borrow().headers.clone()?;
        let charset = self.default_charset();
        block.value(name, charset.as_deref())
    }

    /// Header value with encoded words left intact.
    pub fn encoded_header(&self, name: &str) -> Option<String> {
        let block = self.inner.borrow().headers.clone()?;
        let charset = self.default_charset();
        block.encoded_value(name, charset.as_deref())
    }

    pub fn raw_header(&self, name: &str) -> Option<Vec<u8>> {
        let block = self.inner.borrow().headers.clone()?;
        block.raw_header(name)
    }

    /// Set or, with an absent value, remove the named header.
    pub fn set_header(&self, name: &str, value: Option<&str>) {
        self.header_block().set_named(name, value.map(|v| MimeHeader::new(name, v)));
    }

    pub fn add_header(&self, name: &str, value: &str) {
        self.header_block().add(MimeHeader::new(name, value));
    }

    /// Callback from the header block after a mutation has landed.
    pub(crate) fn header_changed(&self, name: &str) {
        if name.eq_ignore_ascii_case("Content-Type") {
            let block = self.inner.borrow().headers.clone();
            let value = block.and_then(|b| b.encoded_value("Content-Type", None));
            self.update_content_type(ContentType::with_default(value.as_deref(), "text/plain"));
        }
        self.mark_dirty(Dirty::Headers);
    }

    pub fn content_type(&self) -> ContentType {
        self.inner.borrow().content_type.clone()
    }

    pub fn set_content_type(&self, ctype: ContentType) {
        self.header_block().set(MimeHeader::for_content_type(ctype));
    }

    /// Adopt a new content type.  A node's category is fixed at
    /// construction, so retyping a leaf as a container (or vice versa)
    /// is a programming error and fails fatally.
    fn update_content_type(&self, ctype: ContentType) {
        let mut inner = self.inner.borrow_mut();
        match &mut inner.kind {
            PartKind::Body(_) => {
                if ctype.is_multipart() || ctype.is_message_rfc822() {
                    panic!("cannot change a leaf part into a {}", ctype.content_type());
                }
            }
            PartKind::Multipart(state) => {
                if !ctype.is_multipart() {
                    panic!("cannot change a multipart into a {}", ctype.content_type());
                }
                if let Some(boundary) = ctype.parameter("boundary") {
                    if is_valid_boundary(boundary) {
                        state.boundary = Some(boundary.to_string());
                    }
                }
            }
            PartKind::Message(_) => {
                if !ctype.is_message_rfc822() {
                    panic!("cannot change a message into a {}", ctype.content_type());
                }
            }
        }
        inner.content_type = ctype;
    }

    pub fn content_disposition(&self) -> ContentDisposition {
        match self.encoded_header("Content-Disposition") {
            Some(value) => ContentDisposition::new(&value),
            None => ContentDisposition::default(),
        }
    }

    pub fn set_content_disposition(&self, disposition: ContentDisposition) {
        self.header_block().set(MimeHeader::for_disposition(disposition));
    }

    /// Attachment filename, from the disposition or, failing that, the
    /// legacy content-type "name" parameter.
    pub fn filename(&self) -> Option<String> {
        let disposition = self.content_disposition();
        if let Some(name) = disposition.parameter("filename") {
            return Some(name.to_string());
        }
        self.content_type().parameter("name").map(str::to_string)
    }

    pub fn set_filename(&self, filename: &str) {
        let mut disposition = self.content_disposition();
        disposition.set_parameter("filename", Some(filename));
        self.set_content_disposition(disposition);
        let mut ctype = self.content_type();
        if ctype.parameter("name").is_some() {
            ctype.set_parameter("name", Some(filename));
            self.set_content_type(ctype);
        }
    }

    /// Charset assumed for raw 8-bit header bytes, inherited down the
    /// tree.
    pub fn default_charset(&self) -> Option<String> {
        let mut current = Some(self.clone());
        while let Some(part) = current {
            let charset = part.inner.borrow().default_charset.clone();
            if charset.is_some() {
                return charset;
            }
            current = part.parent();
        }
        None
    }

    pub fn set_default_charset(&self, charset: Option<&str>) {
        self.inner.borrow_mut().default_charset = charset.map(str::to_string);
    }

    // ------------------------------------------------------------------
    // structure

    /// Resolve a dotted 1-based part path: "" is the node itself, "2.1"
    /// the first subpart of the second child, and so on.  Message parts
    /// are transparent: the path applies to the enclosed message.
    pub fn subpart(&self, name: &str) -> Option<MimePart> {
        if name.is_empty() {
            return Some(self.clone());
        }
        let next = {
            let inner = self.inner.borrow();
            match &inner.kind {
                PartKind::Body(_) => return None,
                PartKind::Multipart(state) => {
                    let (index, rest) = match name.split_once('.') {
                        Some((index, rest)) => (index, rest),
                        None => (name, ""),
                    };
                    let index: usize = index.parse().ok()?;
                    if index == 0 {
                        return None;
                    }
                    Some((state.children.get(index - 1)?.clone(), rest.to_string()))
                }
                PartKind::Message(state) => {
                    Some((state.body.clone()?, name.to_string()))
                }
            }
        };
        let (child, rest) = next?;
        child.subpart(&rest)
    }

    // ------------------------------------------------------------------
    // offsets and dirty state

    /// Offset of the first header byte, or -1 unless the node is fully
    /// clean.
    pub fn start_offset(&self) -> i64 {
        let inner = self.inner.borrow();
        if inner.dirty == Dirty::None {
            inner.start_offset
        } else {
            -1
        }
    }

    /// Offset of the first body byte, or -1 when the content offsets
    /// are stale.
    pub fn body_offset(&self) -> i64 {
        let inner = self.inner.borrow();
        if inner.dirty != Dirty::Content {
            inner.body_offset
        } else {
            -1
        }
    }

    pub fn end_offset(&self) -> i64 {
        let inner = self.inner.borrow();
        if inner.dirty != Dirty::Content {
            inner.end_offset
        } else {
            -1
        }
    }

    /// Size in bytes of the serialized body.  For leaves with no cached
    /// value this drains the raw content stream to count it.
    pub fn size(&self) -> io::Result<i64> {
        let (is_leaf, cached) = {
            let inner = self.inner.borrow();
            (matches!(inner.kind, PartKind::Body(_)), inner.size)
        };
        if !is_leaf || cached != -1 {
            return Ok(cached);
        }
        let mut stream = self.raw_content_stream()?;
        let mut total: i64 = 0;
        let mut buf = [0u8; 8192];
        loop {
            let num = stream.read(&mut buf)?;
            if num == 0 {
                break;
            }
            total += num as i64;
        }
        self.inner.borrow_mut().size = total;
        Ok(total)
    }

    pub fn line_count(&self) -> i64 {
        self.inner.borrow().line_count
    }

    /// True when the cached serialized form can no longer be trusted,
    /// either because the node was mutated or because no backing source
    /// is reachable.
    pub fn is_dirty(&self) -> bool {
        self.inner.borrow().dirty != Dirty::None || self.resolved_source().is_none()
    }

    /// Raise the node's dirty level and propagate content staleness to
    /// every ancestor.  Any change to a child invalidates the parent's
    /// cached body, even when the child's own level is lower.
    pub(crate) fn mark_dirty(&self, level: Dirty) {
        let level = self.cte_adjusted_level(level);
        {
            let mut inner = self.inner.borrow_mut();
            if level != Dirty::None {
                inner.dirty = inner.dirty.combine(level);
            }
            if level == Dirty::Content || level == Dirty::Cte {
                inner.size = -1;
                inner.line_count = -1;
            }
        }
        let mut next = self.parent();
        while let Some(part) = next {
            {
                let mut inner = part.inner.borrow_mut();
                inner.dirty = inner.dirty.combine(Dirty::Content);
                inner.size = -1;
                inner.line_count = -1;
            }
            next = part.parent();
        }
    }

    /// Leaves retune their serialization encoding from the header on
    /// every dirtying mutation; a change of encoding escalates the
    /// level to CTE.
    fn cte_adjusted_level(&self, level: Dirty) -> Dirty {
        if !matches!(self.inner.borrow().kind, PartKind::Body(_)) {
            return level;
        }
        let header = self.header("Content-Transfer-Encoding");
        let cte = TransferEncoding::for_string(header.as_deref());
        let mut inner = self.inner.borrow_mut();
        if let PartKind::Body(state) = &mut inner.kind {
            let level = if cte.normalized() != state.target_encoding.normalized() {
                level.combine(Dirty::Cte)
            } else {
                level
            };
            state.target_encoding = cte;
            level
        } else {
            level
        }
    }

    /// Close out a parsed node: its end offset and line count are now
    /// known and every cached offset is valid.
    pub(crate) fn record_endpoint(&self, position: i64, line_count: i64) {
        let mut inner = self.inner.borrow_mut();
        inner.end_offset = position;
        inner.size = position - inner.body_offset;
        inner.line_count = line_count;
        inner.dirty = Dirty::None;
    }

    /// Hand a finished parse its backing source.  Skipped when the node
    /// never saw a body.
    pub(crate) fn attach_source(&self, source: PartSource) {
        let mut inner = self.inner.borrow_mut();
        if inner.body_offset != -1 {
            inner.source = Some(source);
        }
    }

    /// Replace the node's content wholesale.  The new bytes are
    /// internally consistent, so the node is only headers-dirty; the
    /// parent still loses its cached body.
    pub(crate) fn set_content(&self, source: Option<PartSource>) {
        self.inner.borrow_mut().dirty = Dirty::None;
        self.mark_dirty(Dirty::Headers);
        let mut inner = self.inner.borrow_mut();
        inner.start_offset = -1;
        match &source {
            Some(source) => {
                inner.body_offset = 0;
                inner.end_offset = source.length();
            }
            None => {
                inner.body_offset = -1;
                inner.end_offset = -1;
            }
        }
        inner.size = inner.end_offset;
        inner.source = source;
    }

    // ------------------------------------------------------------------
    // serialization

    /// The complete wire form, headers and body.  A clean node streams
    /// straight from its source; otherwise the header block is
    /// reserialized and chained with the raw content stream.
    pub fn input_stream(&self) -> io::Result<Box<dyn Read>> {
        if !self.is_dirty() && self.start_offset() != -1 {
            return self.range_stream(self.start_offset(), self.end_offset());
        }
        let header = match self.inner.borrow().headers.clone() {
            Some(block) => block.to_bytes(),
            None => b"\r\n".to_vec(),
        };
        let content = self.raw_content_stream()?;
        Ok(Box::new(ChainReader::new([
            Some(ChainItem::Buffer(header)),
            Some(ChainItem::Stream(content)),
        ])))
    }

    /// The body as it will appear on the wire, re-encoding or
    /// reassembling as the dirty state demands.
    pub fn raw_content_stream(&self) -> io::Result<Box<dyn Read>> {
        enum Plan {
            Range,
            Transcode { encoding: TransferEncoding, target: TransferEncoding, text: bool },
            Assemble,
            Delegate(Option<MimePart>),
        }
        let plan = {
            let inner = self.inner.borrow();
            match &inner.kind {
                PartKind::Body(state) => {
                    if state.encoding.normalized() == state.target_encoding.normalized() {
                        Plan::Range
                    } else {
                        Plan::Transcode {
                            encoding: state.encoding,
                            target: state.target_encoding,
                            text: inner.content_type.primary_type() == "text",
                        }
                    }
                }
                PartKind::Multipart(_) => Plan::Assemble,
                PartKind::Message(state) => Plan::Delegate(state.body.clone()),
            }
        };
        match plan {
            Plan::Range => self.range_stream(self.body_offset(), self.end_offset()),
            Plan::Transcode { encoding, target, text } => {
                let raw = self.range_stream(self.body_offset(), self.end_offset())?;
                let decoded: Box<dyn Read> = match encoding.normalized() {
                    TransferEncoding::Base64 => Box::new(Base64Decoder::new(raw)),
                    TransferEncoding::QuotedPrintable => Box::new(QuotedPrintableDecoder::new(raw)),
                    _ => raw,
                };
                Ok(match target.normalized() {
                    TransferEncoding::Base64 => Box::new(Base64Encoder::new(decoded)),
                    TransferEncoding::QuotedPrintable => {
                        Box::new(QuotedPrintableEncoder::new(decoded, text))
                    }
                    _ => decoded,
                })
            }
            Plan::Assemble => {
                if self.body_offset() != -1 && self.resolved_source().is_some() {
                    self.range_stream(self.body_offset(), self.end_offset())
                } else {
                    self.assembled_multipart_stream()
                }
            }
            Plan::Delegate(body) => {
                if self.body_offset() != -1 && self.resolved_source().is_some() {
                    self.range_stream(self.body_offset(), self.end_offset())
                } else {
                    match body {
                        Some(body) => body.input_stream(),
                        None => Ok(Box::new(io::empty())),
                    }
                }
            }
        }
    }

    /// The raw body bytes, buffered.
    pub fn raw_content(&self) -> io::Result<Vec<u8>> {
        let transcoding = matches!(
            &self.inner.borrow().kind,
            PartKind::Body(state) if state.encoding.normalized() != state.target_encoding.normalized()
        );
        if !transcoding && !self.is_dirty() {
            if let Some(source) = self.resolved_source() {
                return source.content(self.body_offset(), self.end_offset());
            }
        }
        let mut buf = Vec::new();
        self.raw_content_stream()?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// The logical body: for leaves, the wire encoding is undone; for
    /// containers this is the raw body.
    pub fn content_stream(&self) -> io::Result<Box<dyn Read>> {
        let encoding = match &self.inner.borrow().kind {
            PartKind::Body(state) => Some(state.encoding),
            _ => None,
        };
        match encoding {
            Some(encoding) => {
                let raw = self.range_stream(self.body_offset(), self.end_offset())?;
                Ok(match encoding.normalized() {
                    TransferEncoding::Base64 => Box::new(Base64Decoder::new(raw)),
                    TransferEncoding::QuotedPrintable => Box::new(QuotedPrintableDecoder::new(raw)),
                    _ => raw,
                })
            }
            None => self.raw_content_stream(),
        }
    }

    pub fn content(&self) -> io::Result<Vec<u8>> {
        let binary_leaf = matches!(
            &self.inner.borrow().kind,
            PartKind::Body(state) if state.encoding.normalized() == TransferEncoding::Binary
        );
        if binary_leaf {
            if !self.is_dirty() {
                if let Some(source) = self.resolved_source() {
                    return source.content(self.body_offset(), self.end_offset());
                }
            }
            let mut buf = Vec::new();
            self.range_stream(self.body_offset(), self.end_offset())?.read_to_end(&mut buf)?;
            return Ok(buf);
        }
        let mut buf = Vec::new();
        self.content_stream()?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn range_stream(&self, start: i64, end: i64) -> io::Result<Box<dyn Read>> {
        match self.resolved_source() {
            Some(source) => source.content_stream(start, end),
            None => Ok(Box::new(io::empty())),
        }
    }

    /// The boundary the node will serialize with, generating one and
    /// pushing it into the Content-Type header if it is missing there.
    pub(crate) fn ensure_boundary(&self) -> String {
        let current = match &self.inner.borrow().kind {
            PartKind::Multipart(state) => state.boundary.clone(),
            _ => None,
        };
        let boundary = current.unwrap_or_else(generate_boundary);
        let mut ctype = self.content_type();
        if ctype.parameter("boundary") != Some(boundary.as_str()) {
            ctype.set_parameter("boundary", Some(&boundary));
            self.set_content_type(ctype);
        }
        boundary
    }

    /// Rebuild a multipart body from its children, delimiter lines
    /// between each.  Children serialize lazily, as the chain reaches
    /// them.
    fn assembled_multipart_stream(&self) -> io::Result<Box<dyn Read>> {
        let boundary = self.ensure_boundary();
        let children = match &self.inner.borrow().kind {
            PartKind::Multipart(state) => state.children.clone(),
            _ => Vec::new(),
        };
        if children.is_empty() {
            let close = format!("--{}--\r\n", boundary);
            return Ok(Box::new(ChainReader::new([Some(ChainItem::Text(close))])));
        }
        let mut items: Vec<Option<ChainItem>> = Vec::new();
        for (index, child) in children.iter().enumerate() {
            let delimiter = if index == 0 {
                format!("--{}\r\n", boundary)
            } else {
                format!("\r\n--{}\r\n", boundary)
            };
            items.push(Some(ChainItem::Text(delimiter)));
            items.push(Some(ChainItem::Part(child.clone())));
        }
        items.push(Some(ChainItem::Text(format!("\r\n--{}--\r\n", boundary))));
        Ok(Box::new(ChainReader::new(items)))
    }
}

static BOUNDARY_COUNTER: AtomicU64 = AtomicU64::new(0);

fn generate_boundary() -> String {
    let count = BOUNDARY_COUNTER.fetch_add(1, Ordering::Relaxed);
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    format!("_bound_{}_{}_{}", process::id(), seconds, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_body() -> PartKind {
        PartKind::Body(BodyState {
            encoding: TransferEncoding::Binary,
            target_encoding: TransferEncoding::Binary,
        })
    }

    fn clean_leaf(content: &str) -> MimePart {
        let part = MimePart::new_node(binary_body());
        {
            let mut inner = part.inner.borrow_mut();
            inner.source = Some(PartSource::memory(content.as_bytes().to_vec()));
            inner.start_offset = 0;
            inner.body_offset = 0;
        }
        part.record_endpoint(content.len() as i64, 1);
        part
    }

    fn clean_multipart(children: Vec<MimePart>, body: &str) -> MimePart {
        let root = MimePart::new_node(PartKind::Multipart(MultipartState {
            children: Vec::new(),
            boundary: Some("bb".to_string()),
        }));
        for child in &children {
            root.adopt_child(child);
        }
        {
            let mut inner = root.inner.borrow_mut();
            inner.source = Some(PartSource::memory(body.as_bytes().to_vec()));
            inner.content_type = ContentType::new("multipart/mixed; boundary=bb");
            inner.start_offset = 0;
            inner.body_offset = 0;
        }
        root.record_endpoint(body.len() as i64, 1);
        root
    }

    #[test]
    fn content_mutation_dirties_every_ancestor() {
        let first = clean_leaf("first");
        let second = clean_leaf("second");
        let root = clean_multipart(vec![first.clone(), second.clone()], "irrelevant");
        assert_eq!(root.start_offset(), 0);

        first.set_content(Some(PartSource::memory(b"changed".to_vec())));

        assert_eq!(root.start_offset(), -1);
        assert_eq!(root.body_offset(), -1);
        assert!(root.is_dirty());
        // the sibling's cached offsets survive
        assert_eq!(second.start_offset(), 0);
        assert_eq!(second.end_offset(), 6);
    }

    #[test]
    fn cte_change_keeps_body_offsets() {
        let leaf = clean_leaf("hello there");
        let root = clean_multipart(vec![leaf.clone()], "irrelevant");

        leaf.set_header("Content-Transfer-Encoding", Some("base64"));

        // headers are stale but the body bytes are still addressable
        assert_eq!(leaf.start_offset(), -1);
        assert_eq!(leaf.body_offset(), 0);
        assert_eq!(leaf.end_offset(), 11);
        // the size is not: the re-encoded body has a different length
        assert_eq!(leaf.inner.borrow().size, -1);
        assert_eq!(root.body_offset(), -1);
    }

    #[test]
    fn set_content_resets_offsets() {
        let part = MimePart::new_node(binary_body());
        part.set_content(Some(PartSource::memory(b"payload".to_vec())));
        {
            let inner = part.inner.borrow();
            assert_eq!(inner.start_offset, -1);
            assert_eq!(inner.body_offset, 0);
            assert_eq!(inner.end_offset, 7);
            assert_eq!(inner.size, 7);
            assert_eq!(inner.dirty, Dirty::Headers);
        }
        part.set_content(None);
        {
            let inner = part.inner.borrow();
            assert_eq!(inner.body_offset, -1);
            assert_eq!(inner.end_offset, -1);
        }
    }

    #[test]
    fn dirty_multipart_reassembles_with_boundary() {
        let root = MimePart::new_node(PartKind::Multipart(MultipartState {
            children: Vec::new(),
            boundary: None,
        }));
        root.set_content_type(ContentType::new("multipart/mixed; boundary=zz"));
        let first = MimePart::new_node(binary_body());
        first.set_content(Some(PartSource::memory(b"first".to_vec())));
        let second = MimePart::new_node(binary_body());
        second.set_content(Some(PartSource::memory(b"second".to_vec())));
        root.adopt_child(&first);
        root.adopt_child(&second);

        let mut out = Vec::new();
        root.raw_content_stream().unwrap().read_to_end(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "--zz\r\n\r\nfirst\r\n--zz\r\n\r\nsecond\r\n--zz--\r\n"
        );
    }

    #[test]
    fn assembly_generates_missing_boundary() {
        let root = MimePart::new_node(PartKind::Multipart(MultipartState {
            children: Vec::new(),
            boundary: None,
        }));
        root.set_content_type(ContentType::new("multipart/mixed"));
        let leaf = MimePart::new_node(binary_body());
        leaf.set_content(Some(PartSource::memory(b"x".to_vec())));
        root.adopt_child(&leaf);

        let mut out = Vec::new();
        root.raw_content_stream().unwrap().read_to_end(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("--_bound_"));
        // the generated boundary lands in the header too
        let boundary = root.content_type().parameter("boundary").unwrap().to_string();
        assert!(text.contains(&format!("--{}--\r\n", boundary)));
    }

    #[test]
    fn message_part_delegates_to_enclosed_message() {
        let body = MimePart::new_node(binary_body());
        body.set_header("Subject", Some("inner"));
        body.set_content(Some(PartSource::memory(b"hello".to_vec())));
        let message = MimePart::new_node(PartKind::Message(MessageState { body: None }));
        message.adopt_child(&body);

        let mut out = Vec::new();
        message.raw_content_stream().unwrap().read_to_end(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Subject: inner\r\n"));
        assert!(text.ends_with("\r\n\r\nhello"));
    }

    #[test]
    fn subpart_resolves_dotted_paths() {
        let first = clean_leaf("first");
        let second = clean_leaf("second");
        let root = clean_multipart(vec![first.clone(), second.clone()], "irrelevant");

        assert!(Rc::ptr_eq(&root.subpart("").unwrap().inner, &root.inner));
        assert!(Rc::ptr_eq(&root.subpart("1").unwrap().inner, &first.inner));
        assert!(Rc::ptr_eq(&root.subpart("2").unwrap().inner, &second.inner));
        assert!(root.subpart("3").is_none());
        assert!(root.subpart("0").is_none());
        assert!(root.subpart("1.1").is_none());

        let message = MimePart::new_node(PartKind::Message(MessageState { body: None }));
        message.adopt_child(&root);
        assert!(Rc::ptr_eq(&message.subpart("2").unwrap().inner, &second.inner));
    }

    #[test]
    fn detach_pins_the_inherited_source() {
        let raw = "firstsecond";
        let first = MimePart::new_node(binary_body());
        {
            let mut inner = first.inner.borrow_mut();
            inner.start_offset = 0;
            inner.body_offset = 0;
        }
        first.record_endpoint(5, 1);
        let second = MimePart::new_node(binary_body());
        {
            let mut inner = second.inner.borrow_mut();
            inner.start_offset = 5;
            inner.body_offset = 5;
        }
        second.record_endpoint(11, 1);
        let root = clean_multipart(vec![first.clone(), second.clone()], raw);

        assert_eq!(first.raw_content().unwrap(), b"first");
        first.detach();
        assert!(first.parent().is_none());
        assert_eq!(first.raw_content().unwrap(), b"first");
        match &root.inner.borrow().kind {
            PartKind::Multipart(state) => assert_eq!(state.children.len(), 1),
            _ => unreachable!(),
        }
        assert!(root.is_dirty());
    }

    #[test]
    #[should_panic(expected = "cannot change a leaf part")]
    fn retyping_a_leaf_as_multipart_fails() {
        let leaf = MimePart::new_node(binary_body());
        leaf.set_header("Content-Type", Some("multipart/mixed; boundary=q"));
    }
}
