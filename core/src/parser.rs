/*
 * parser.rs
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

//! Streaming message parser.
//!
//! [`MimeParser`] is a push-based state machine: callers feed it bytes in
//! whatever increments suit them and collect the finished part tree at the
//! end.  It never buffers body content; parts carry offsets into the byte
//! stream, resolved later against whatever source backs it.  The
//! [`ParseReader`] and [`ParseWriter`] decorators attach the parser to a
//! pass-through stream so a message can be parsed while it is being read
//! or written for some other purpose.

use std::io::{self, Read, Write};
use std::mem;

use bytes::Bytes;
use tracing::warn;

use crate::content_type::{ContentType, MESSAGE_RFC822, TEXT_PLAIN};
use crate::cte::TransferEncoding;
use crate::header::MimeHeader;
use crate::header_block::MimeHeaderBlock;
use crate::parameters::is_valid_boundary;
use crate::part::{BodyState, MessageState, MimePart, MultipartState, PartKind};
use crate::source::PartSource;

/// Line accumulation cap.  Boundary and header decisions only ever need a
/// prefix; body lines can be arbitrarily long and are never stored.
const MAX_LINE: usize = 4096;

/// Containers deeper than this parse as opaque leaves-with-a-type, so a
/// maliciously nested message cannot run the stack away.
const MAX_DEPTH: usize = 20;

/// Incremental wire-format parser.  Feed it bytes, then call
/// [`MimeParser::finish`] or [`MimeParser::finish_with_source`] to collect
/// the part tree with start/body/end offsets recorded against the byte
/// stream's position counter.
pub struct MimeParser {
    position: i64,
    line_start: i64,
    line: Vec<u8>,
    overflow: bool,
    pending_cr: bool,
    newlines: i64,
    last_break: i64,
    state: State,
    opens: Vec<Open>,
    root: Option<MimePart>,
}

enum State {
    Headers(HeaderAccum),
    Body,
    Prologue,
    Epilogue,
}

/// An unfinished part.  The innermost open is last; closing records the
/// endpoint and clears the dirty flag so offsets become trustworthy.
struct Open {
    part: MimePart,
    role: Role,
    boundary: Option<String>,
    body_line: i64,
}

#[derive(Clone, Copy, PartialEq)]
enum Role {
    Multipart,
    Message,
    Leaf,
    Opaque,
}

/// Headers of the part currently being read, in wire order.
struct HeaderAccum {
    start: i64,
    headers: Vec<MimeHeader>,
    current: Option<CurrentHeader>,
}

struct CurrentHeader {
    name: String,
    raw: Vec<u8>,
    value_start: usize,
}

impl HeaderAccum {
    fn new(start: i64) -> HeaderAccum {
        HeaderAccum {
            start,
            headers: Vec::new(),
            current: None,
        }
    }

    fn flush(&mut self) {
        if let Some(current) = self.current.take() {
            self.headers
                .push(MimeHeader::parsed(&current.name, current.raw, current.value_start));
        }
    }

    /// The first Content-Type wins; later duplicates are kept as ordinary
    /// headers but do not retype the part.
    fn first_content_type(&mut self) -> Option<String> {
        self.headers
            .iter_mut()
            .find(|header| header.name().eq_ignore_ascii_case("Content-Type"))
            .map(|header| header.encoded_value(None))
    }
}

impl MimeParser {
    pub fn new() -> MimeParser {
        MimeParser {
            position: 0,
            line_start: 0,
            line: Vec::new(),
            overflow: false,
            pending_cr: false,
            newlines: 0,
            last_break: 0,
            state: State::Headers(HeaderAccum::new(0)),
            opens: Vec::new(),
            root: None,
        }
    }

    /// Advance the state machine over the next run of bytes.  Never fails;
    /// malformed input degrades into plain content.
    pub fn feed(&mut self, data: &[u8]) {
        for &byte in data {
            if byte == b'\n' {
                let width = if self.pending_cr { 2 } else { 1 };
                self.pending_cr = false;
                self.handle_line(width, self.position + 1);
                self.newlines += 1;
                self.last_break = width;
                self.line.clear();
                self.overflow = false;
                self.line_start = self.position + 1;
            } else {
                if self.pending_cr {
                    self.pending_cr = false;
                    self.push_byte(b'\r');
                }
                if byte == b'\r' {
                    self.pending_cr = true;
                } else {
                    self.push_byte(byte);
                }
            }
            self.position += 1;
        }
    }

    /// Close every open part at end of input and return the tree.  Offsets
    /// are valid but have nothing to read against until a source is
    /// attached.
    pub fn finish(self) -> MimePart {
        self.complete(None)
    }

    /// Like [`MimeParser::finish`], backing the tree with the source the
    /// observed bytes came from.
    pub fn finish_with_source(self, source: PartSource) -> MimePart {
        self.complete(Some(source))
    }

    fn push_byte(&mut self, byte: u8) {
        if self.line.len() < MAX_LINE {
            self.line.push(byte);
        } else {
            self.overflow = true;
        }
    }

    /// `width` is the terminator width of this line, 0 at end of input;
    /// `next` is the offset of the first byte after the line.
    fn handle_line(&mut self, width: i64, next: i64) {
        let state = mem::replace(&mut self.state, State::Body);
        match state {
            State::Headers(accum) => self.header_line(accum, width, next),
            other => {
                self.state = other;
                self.content_line(next);
            }
        }
    }

    fn header_line(&mut self, mut accum: HeaderAccum, width: i64, next: i64) {
        if self.line.is_empty() {
            accum.flush();
            self.materialize(accum, next, self.newlines + 1, false);
            return;
        }
        // a boundary line may cut a header block short
        if !self.overflow && self.line.starts_with(b"--") && self.boundary_in_headers(&mut accum) {
            accum.flush();
            self.materialize(accum, self.line_start, self.newlines, false);
            self.content_line(next);
            return;
        }
        let terminator: &[u8] = match width {
            2 => b"\r\n",
            1 => b"\n",
            _ => b"",
        };
        if self.line[0] == b' ' || self.line[0] == b'\t' {
            if let Some(current) = accum.current.as_mut() {
                current.raw.extend_from_slice(&self.line);
                current.raw.extend_from_slice(terminator);
            }
            self.state = State::Headers(accum);
            return;
        }
        accum.flush();
        let (name, value_start) = split_header_line(&self.line);
        let mut raw = self.line.clone();
        raw.extend_from_slice(terminator);
        accum.current = Some(CurrentHeader {
            name,
            raw,
            value_start,
        });
        self.state = State::Headers(accum);
    }

    /// True when the current line is a delimiter for either an enclosing
    /// open part or the boundary this block's own Content-Type declares.
    fn boundary_in_headers(&mut self, accum: &mut HeaderAccum) -> bool {
        let line = trim_wsp(&self.line);
        let rest = &line[2..];
        accum.flush();
        if let Some(value) = accum.first_content_type() {
            let declared = ContentType::with_default(Some(&value), TEXT_PLAIN);
            if declared.is_multipart() {
                if let Some(bound) = declared.parameter("boundary") {
                    if is_valid_boundary(bound) && matches_boundary(rest, bound.as_bytes()) {
                        return true;
                    }
                }
            }
        }
        self.opens.iter().any(|open| {
            open.boundary
                .as_ref()
                .is_some_and(|bound| matches_boundary(rest, bound.as_bytes()))
        })
    }

    fn content_line(&mut self, next: i64) {
        if self.overflow || !self.line.starts_with(b"--") {
            return;
        }
        let line = trim_wsp(&self.line);
        let rest = &line[2..];

        // innermost match wins; a close-delimited multipart no longer
        // responds to its own boundary
        let top = self.opens.len().wrapping_sub(1);
        let skip_top = matches!(self.state, State::Epilogue);
        let mut matched: Option<(usize, bool)> = None;
        for (index, open) in self.opens.iter().enumerate().rev() {
            if skip_top && index == top {
                continue;
            }
            if let Some(bound) = &open.boundary {
                if let Some(tail) = rest.strip_prefix(bound.as_bytes()) {
                    if tail.is_empty() {
                        matched = Some((index, false));
                        break;
                    }
                    if tail == b"--" {
                        matched = Some((index, true));
                        break;
                    }
                }
            }
        }

        // a multipart with no declared boundary adopts the first
        // delimiter-shaped line of its prologue
        if matched.is_none() && matches!(self.state, State::Prologue) && !rest.is_empty() {
            let index = self.opens.len().wrapping_sub(1);
            if let Some(open) = self.opens.last_mut() {
                if open.boundary.is_none() {
                    let adopted = String::from_utf8_lossy(rest).into_owned();
                    if is_valid_boundary(&adopted) {
                        open.boundary = Some(adopted.clone());
                        if let PartKind::Multipart(state) = &mut open.part.inner.borrow_mut().kind {
                            state.boundary = Some(adopted);
                        }
                        matched = Some((index, false));
                    }
                }
            }
        }

        let Some((index, closing)) = matched else {
            return;
        };
        self.close_above(index);
        if closing {
            self.state = State::Epilogue;
        } else {
            self.state = State::Headers(HeaderAccum::new(next));
        }
    }

    /// Close every open part nested inside `index`.  They all end where
    /// the current boundary line begins, less the break that introduced it.
    fn close_above(&mut self, index: usize) {
        let end = self.line_start - self.last_break;
        while self.opens.len() > index + 1 {
            if let Some(open) = self.opens.pop() {
                let body_offset = open.part.inner.borrow().body_offset;
                let lines = (self.newlines - open.body_line).max(0);
                open.part.record_endpoint(end.max(body_offset), lines);
            }
        }
    }

    /// Turn a finished header block into a part, adopt it into the tree
    /// and decide what its body parses as.
    fn materialize(&mut self, mut accum: HeaderAccum, body_offset: i64, body_line: i64, at_eof: bool) {
        let default_type = match self.opens.last() {
            Some(open)
                if open.role == Role::Multipart
                    && open.part.content_type().sub_type() == "digest" =>
            {
                MESSAGE_RFC822
            }
            _ => TEXT_PLAIN,
        };
        let declared_type = accum.first_content_type();
        let ctype = ContentType::with_default(declared_type.as_deref(), default_type);

        let block = MimeHeaderBlock::new();
        for header in accum.headers.drain(..) {
            block.append_parsed(header);
        }

        let containers = self
            .opens
            .iter()
            .filter(|open| matches!(open.role, Role::Multipart | Role::Message))
            .count();
        let capped = containers >= MAX_DEPTH;

        let (kind, role, tracked) = if ctype.is_multipart() {
            let declared = ctype
                .parameter("boundary")
                .filter(|value| is_valid_boundary(value))
                .map(str::to_string);
            let role = if capped { Role::Opaque } else { Role::Multipart };
            let tracked = if capped { None } else { declared.clone() };
            (
                PartKind::Multipart(MultipartState {
                    children: Vec::new(),
                    boundary: declared,
                }),
                role,
                tracked,
            )
        } else if ctype.is_message_rfc822() {
            let role = if capped { Role::Opaque } else { Role::Message };
            (PartKind::Message(MessageState { body: None }), role, None)
        } else {
            let cte = TransferEncoding::for_string(
                block
                    .encoded_value("Content-Transfer-Encoding", None)
                    .as_deref(),
            );
            (
                PartKind::Body(BodyState {
                    encoding: cte,
                    target_encoding: cte,
                }),
                Role::Leaf,
                None,
            )
        };

        let part = MimePart::parsed(kind, ctype, block, accum.start, body_offset);
        match self.opens.last() {
            Some(open) => open.part.adopt_child(&part),
            None => self.root = Some(part.clone()),
        }
        self.state = match role {
            Role::Multipart => State::Prologue,
            // a message/rfc822 body is itself a message; parse it in place
            Role::Message if !at_eof => State::Headers(HeaderAccum::new(body_offset)),
            _ => State::Body,
        };
        self.opens.push(Open {
            part,
            role,
            boundary: tracked,
            body_line,
        });
    }

    fn complete(mut self, source: Option<PartSource>) -> MimePart {
        if self.pending_cr {
            self.pending_cr = false;
            self.push_byte(b'\r');
        }
        let partial = !self.line.is_empty() || self.overflow;
        if partial {
            self.handle_line(0, self.position);
        }
        if let State::Headers(mut accum) = mem::replace(&mut self.state, State::Body) {
            accum.flush();
            self.materialize(accum, self.position, self.newlines, true);
        }
        let trailing = if partial { 1 } else { 0 };
        while let Some(open) = self.opens.pop() {
            let body_offset = open.part.inner.borrow().body_offset;
            let lines = (self.newlines + trailing - open.body_line).max(0);
            open.part.record_endpoint(self.position.max(body_offset), lines);
        }
        let root = match self.root.take() {
            Some(root) => root,
            None => {
                let part = MimePart::parsed(
                    PartKind::Body(BodyState {
                        encoding: TransferEncoding::Binary,
                        target_encoding: TransferEncoding::Binary,
                    }),
                    ContentType::with_default(None, TEXT_PLAIN),
                    MimeHeaderBlock::new(),
                    0,
                    0,
                );
                part.record_endpoint(0, 0);
                part
            }
        };
        if let Some(source) = source {
            root.attach_source(source);
        }
        // a top-level leaf that arrived with no transfer encoding gets one
        // picked from its content
        if let Some(body) = root.as_body() {
            if !root.header_block().contains("Content-Transfer-Encoding") {
                let picked = match body.pick_encoding() {
                    Ok(encoding) => encoding,
                    Err(err) => {
                        warn!("content scan failed, falling back to base64: {}", err);
                        TransferEncoding::Base64
                    }
                };
                body.set_transfer_encoding(Some(picked));
            }
        }
        root
    }
}

impl Default for MimeParser {
    fn default() -> MimeParser {
        MimeParser::new()
    }
}

/// Parse a complete in-memory message, backing the tree with the same
/// bytes.
pub fn parse(bytes: impl Into<Bytes>) -> MimePart {
    let bytes = bytes.into();
    let mut parser = MimeParser::new();
    parser.feed(&bytes);
    parser.finish_with_source(PartSource::memory(bytes))
}

/// Read decorator that parses everything the caller reads through it.
pub struct ParseReader<R: Read> {
    inner: R,
    parser: MimeParser,
}

impl<R: Read> ParseReader<R> {
    pub fn new(inner: R) -> ParseReader<R> {
        ParseReader {
            inner,
            parser: MimeParser::new(),
        }
    }

    pub fn finish(self) -> MimePart {
        self.parser.finish()
    }

    pub fn finish_with_source(self, source: PartSource) -> MimePart {
        self.parser.finish_with_source(source)
    }
}

impl<R: Read> Read for ParseReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.inner.read(buf)?;
        self.parser.feed(&buf[..count]);
        Ok(count)
    }
}

/// Write decorator that parses everything written through it.  Only bytes
/// the underlying sink accepts are fed to the parser.
pub struct ParseWriter<W: Write> {
    inner: W,
    parser: MimeParser,
}

impl<W: Write> ParseWriter<W> {
    pub fn new(inner: W) -> ParseWriter<W> {
        ParseWriter {
            inner,
            parser: MimeParser::new(),
        }
    }

    pub fn finish(self) -> MimePart {
        self.parser.finish()
    }

    pub fn finish_with_source(self, source: PartSource) -> MimePart {
        self.parser.finish_with_source(source)
    }
}

impl<W: Write> Write for ParseWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let count = self.inner.write(buf)?;
        self.parser.feed(&buf[..count]);
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn trim_wsp(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && (line[end - 1] == b' ' || line[end - 1] == b'\t') {
        end -= 1;
    }
    &line[..end]
}

/// `rest` is the line after its leading dashes; a trailing dash pair marks
/// the close delimiter.
fn matches_boundary(rest: &[u8], boundary: &[u8]) -> bool {
    match rest.strip_prefix(boundary) {
        Some(tail) => tail.is_empty() || tail == b"--",
        None => false,
    }
}

fn split_header_line(line: &[u8]) -> (String, usize) {
    match line.iter().position(|&byte| byte == b':') {
        Some(colon) => {
            let name = String::from_utf8_lossy(&line[..colon]).trim_end().to_string();
            let mut value_start = colon + 1;
            while value_start < line.len()
                && (line[value_start] == b' ' || line[value_start] == b'\t')
            {
                value_start += 1;
            }
            (name, value_start)
        }
        None => (
            String::from_utf8_lossy(line).trim_end().to_string(),
            line.len(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn wire(text: &str) -> Vec<u8> {
        text.replace('\n', "\r\n").into_bytes()
    }

    fn find(haystack: &[u8], needle: &[u8]) -> usize {
        haystack
            .windows(needle.len())
            .position(|window| window == needle)
            .unwrap()
    }

    #[test]
    fn adopts_undeclared_boundary_from_first_dashed_line() {
        let bytes = wire(
            "From: <foo@example.com>\nSubject: sample\nContent-Type: multipart/mixed\n\n\
             prologue text goes here\n---=_sample1\nContent-Type: text/plain\n\n\
             foo!  bar!  loud noises\n\n---=_sample1\nContent-Type: application/x-unknown\n\
             Content-Disposition: attachment; filename=x.txt\n\nCONTENTS OF ATTACHMENT\n\n\
             ---=_sample1--\n\n",
        );
        let root = parse(bytes);
        let multi = root.as_multipart().unwrap();
        assert_eq!(multi.boundary().as_deref(), Some("-=_sample1"));
        assert_eq!(multi.count(), 2);
        let first = multi.part_at(0).unwrap();
        assert_eq!(first.content_type().content_type(), "text/plain");
        assert_eq!(first.raw_content().unwrap(), b"foo!  bar!  loud noises\r\n");
        let second = multi.part_at(1).unwrap();
        assert_eq!(second.content_type().content_type(), "application/x-unknown");
    }

    #[test]
    fn nested_containers_adopt_their_own_boundaries() {
        let bytes = wire(
            "From: <foo@example.com>\nContent-Type: multipart/alternative\n\npreamble\n\
             ---=_outer\nContent-Type: multipart/mixed\n\n---=_inner\n\
             Content-Type: text/plain\n\nalpha\n---=_inner\nContent-Type: text/plain\n\n\
             beta\n---=_inner--\n---=_outer--\n",
        );
        let root = parse(bytes);
        let outer = root.as_multipart().unwrap();
        assert_eq!(outer.boundary().as_deref(), Some("-=_outer"));
        assert_eq!(outer.count(), 1);
        let inner = outer.part_at(0).unwrap().as_multipart().unwrap();
        assert_eq!(inner.boundary().as_deref(), Some("-=_inner"));
        assert_eq!(inner.count(), 2);
        assert_eq!(inner.part_at(1).unwrap().raw_content().unwrap(), b"beta");
    }

    #[test]
    fn first_content_type_header_wins() {
        let bytes = wire(
            "Content-Type: text/plain\nFrom: <foo@example.com>\nSubject: sample\n\
             Content-Type: multipart/alternative; boundary=-=_sample1\n\n---=_sample1\n\
             Content-Type: text/plain\n\nfoo!  bar!  loud noises\n\n---=_sample1--\n",
        );
        let root = parse(bytes);
        assert!(root.as_multipart().is_none());
        assert_eq!(root.content_type().content_type(), "text/plain");
        assert!(root.raw_content().unwrap().starts_with(b"---=_sample1\r\n"));
    }

    #[test]
    fn boundary_line_closes_an_open_header_block() {
        let bytes = wire(
            "Subject: sample\nContent-Type: multipart/mixed; boundary=bb\n--bb\n\
             Content-Type: text/plain\n\nfirst\n--bb\nContent-Type: text/plain\n\n\
             second\n--bb--\n",
        );
        let root = parse(bytes);
        let multi = root.as_multipart().unwrap();
        assert_eq!(multi.count(), 2);
        assert_eq!(multi.part_at(0).unwrap().raw_content().unwrap(), b"first");
        assert_eq!(multi.part_at(1).unwrap().raw_content().unwrap(), b"second");
    }

    fn deep_nesting(levels: usize) -> Vec<u8> {
        let mut text = String::from("Subject: deep\n");
        for level in 0..levels {
            text.push_str(&format!(
                "Content-Type: multipart/mixed; boundary=level{}\n",
                level
            ));
            text.push_str(&format!("--level{}\n", level));
            text.push_str("Content-Type: text/plain\n\nleaf\n");
            text.push_str(&format!("--level{}\n", level));
        }
        text.push_str("Content-Type: text/plain\n\nbottom\n");
        for level in (0..levels).rev() {
            text.push_str(&format!("--level{}--\n", level));
        }
        wire(&text)
    }

    #[test]
    fn nesting_beyond_the_depth_cap_parses_opaque() {
        let root = parse(deep_nesting(25));
        let mut node = root.clone();
        for _ in 0..20 {
            let multi = node.as_multipart().unwrap();
            assert_eq!(multi.count(), 2);
            node = multi.part_at(1).unwrap();
        }
        let bottom = node.as_multipart().unwrap();
        assert_eq!(bottom.count(), 0);
        assert!(bottom.raw_content().unwrap().starts_with(b"--level20\r\n"));
    }

    #[test]
    fn rfc822_parts_contain_a_parsed_message() {
        let bytes = wire(
            "Content-Type: multipart/mixed; boundary=mm\n\n--mm\n\
             Content-Type: message/rfc822\n\nSubject: the enclosed\n\
             Content-Type: text/plain\n\ninner body\n--mm--\n",
        );
        let root = parse(bytes);
        let multi = root.as_multipart().unwrap();
        let wrapper = multi.part_at(0).unwrap();
        let message = wrapper.as_message().unwrap();
        let inner = message.body().unwrap();
        assert_eq!(inner.header("Subject").as_deref(), Some("the enclosed"));
        assert_eq!(inner.raw_content().unwrap(), b"inner body");
    }

    #[test]
    fn digest_children_default_to_rfc822() {
        let bytes = wire(
            "Content-Type: multipart/digest; boundary=dd\n\n--dd\n\n\
             Subject: first enclosed\n\nbody one\n--dd--\n",
        );
        let root = parse(bytes);
        let multi = root.as_multipart().unwrap();
        let child = multi.part_at(0).unwrap();
        assert!(child.is_message());
        assert_eq!(child.content_type().content_type(), "message/rfc822");
        let inner = child.as_message().unwrap().body().unwrap();
        assert_eq!(inner.header("Subject").as_deref(), Some("first enclosed"));
    }

    #[test]
    fn clean_parse_serializes_the_original_bytes() {
        let bytes = wire(
            "Subject: sample\nContent-Type: multipart/mixed; boundary=bb\n\npreamble\n\
             --bb\nContent-Type: text/plain\nContent-Transfer-Encoding: 7bit\n\nfirst\n\
             --bb--\nepilogue\n",
        );
        let root = parse(bytes.clone());
        let mut out = Vec::new();
        root.input_stream().unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn leaf_with_declared_encoding_stays_pristine() {
        let bytes = wire(
            "Subject: plain\nContent-Type: text/plain\n\
             Content-Transfer-Encoding: 7bit\n\nhello there\n",
        );
        let root = parse(bytes.clone());
        assert!(!root.is_dirty());
        let mut out = Vec::new();
        root.input_stream().unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn root_leaf_without_encoding_gets_one_picked() {
        let root = parse(wire("Subject: plain\n\njust some text\n"));
        assert_eq!(root.header("Content-Transfer-Encoding").as_deref(), Some("7bit"));

        let mut accented = wire("Subject: dense\n\n");
        accented.extend(vec![0xA9u8; 120]);
        let root = parse(accented);
        assert_eq!(root.header("Content-Transfer-Encoding").as_deref(), Some("base64"));
    }

    #[test]
    fn encoded_word_subject_decodes() {
        let root = parse(wire(
            "Subject: =?utf-8?Q?Hello=2C_W=C3=B6rld!?=\nContent-Type: text/plain\n\
             Content-Transfer-Encoding: 7bit\n\nx\n",
        ));
        assert_eq!(root.header("Subject").as_deref(), Some("Hello, W\u{f6}rld!"));
    }

    #[test]
    fn parsed_offsets_index_the_original_bytes() {
        let bytes = wire(
            "Content-Type: multipart/mixed; boundary=bb\n\n--bb\n\
             Content-Type: text/plain\n\nalpha beta\n--bb--\n",
        );
        let root = parse(bytes.clone());
        let child = root.as_multipart().unwrap().part_at(0).unwrap();
        assert_eq!(
            child.start_offset(),
            find(&bytes, b"Content-Type: text/plain") as i64
        );
        let body = find(&bytes, b"alpha beta");
        assert_eq!(child.body_offset(), body as i64);
        assert_eq!(child.end_offset(), (body + b"alpha beta".len()) as i64);
        assert_eq!(child.size().unwrap(), b"alpha beta".len() as i64);
        assert_eq!(child.line_count(), 1);
    }

    #[test]
    fn bare_lf_messages_parse() {
        let bytes = b"Content-Type: multipart/mixed; boundary=bb\n\n--bb\n\nalpha\n--bb--\n".to_vec();
        let root = parse(bytes);
        let multi = root.as_multipart().unwrap();
        assert_eq!(multi.count(), 1);
        assert_eq!(multi.part_at(0).unwrap().raw_content().unwrap(), b"alpha");
    }

    #[test]
    fn empty_input_yields_an_empty_leaf() {
        let root = MimeParser::new().finish();
        assert!(root.as_body().is_some());
        assert_eq!(root.raw_content().unwrap(), b"");
    }

    #[test]
    fn feeding_byte_at_a_time_matches_whole_buffer() {
        let bytes = wire(
            "Content-Type: multipart/mixed; boundary=bb\n\n--bb\n\nalpha\n--bb\n\n\
             beta\n--bb--\n",
        );
        let mut parser = MimeParser::new();
        for &byte in &bytes {
            parser.feed(&[byte]);
        }
        let root = parser.finish_with_source(PartSource::memory(bytes));
        assert_eq!(root.as_multipart().unwrap().count(), 2);
    }

    #[test]
    fn parse_reader_observes_the_stream() {
        let bytes = wire(
            "Content-Type: multipart/mixed; boundary=bb\n\n--bb\n\nalpha\n--bb\n\n\
             beta\n--bb--\n",
        );
        let mut reader = ParseReader::new(Cursor::new(bytes.clone()));
        let mut drained = Vec::new();
        reader.read_to_end(&mut drained).unwrap();
        assert_eq!(drained, bytes);
        let root = reader.finish_with_source(PartSource::memory(bytes));
        assert_eq!(root.as_multipart().unwrap().count(), 2);
    }

    #[test]
    fn parse_writer_observes_the_sink() {
        let bytes = wire("Subject: via writer\nContent-Transfer-Encoding: 7bit\n\npayload\n");
        let mut sink = Vec::new();
        let mut writer = ParseWriter::new(&mut sink);
        writer.write_all(&bytes).unwrap();
        writer.flush().unwrap();
        let root = writer.finish_with_source(PartSource::memory(bytes.clone()));
        assert_eq!(sink, bytes);
        assert_eq!(root.raw_content().unwrap(), b"payload\r\n");
    }
}
