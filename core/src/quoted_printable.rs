/*
 * quoted_printable.rs
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

//! Incremental quoted-printable transcoding (RFC 2045 6.7).

use std::io::{self, Read};

pub(crate) const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Longest output line, counting a soft break's own '='.
const LINE_WIDTH: usize = 76;

pub(crate) fn hex_value(b: u8) -> i8 {
    match b {
        b'0'..=b'9' => (b - b'0') as i8,
        b'A'..=b'F' => (b - b'A' + 10) as i8,
        b'a'..=b'f' => (b - b'a' + 10) as i8,
        _ => -1,
    }
}

/// Decode quoted-printable from `src` starting at `src_pos` into `dst`
/// starting at `dst_pos`, writing at most `max_decode` bytes.  An '='
/// whose escape sequence is split across the end of `src` is left
/// unconsumed unless `end_of_stream` is set, in which case it is emitted
/// literally.  Malformed escapes pass through untouched.  Returns the
/// number of bytes written.
pub fn decode(
    src: &[u8],
    src_pos: &mut usize,
    dst: &mut [u8],
    dst_pos: &mut usize,
    max_decode: usize,
    end_of_stream: bool,
) -> usize {
    let start_dst = *dst_pos;
    while *src_pos < src.len() {
        if *dst_pos + 3 > dst.len() || (*dst_pos - start_dst) + 3 > max_decode {
            break;
        }
        let b = src[*src_pos];
        if b != b'=' {
            dst[*dst_pos] = b;
            *dst_pos += 1;
            *src_pos += 1;
            continue;
        }
        let rest = &src[*src_pos + 1..];
        match rest {
            [b'\r', b'\n', ..] => {
                // soft line break
                *src_pos += 3;
            }
            [b'\n', ..] => {
                *src_pos += 2;
            }
            [h, l, ..] if hex_value(*h) >= 0 && hex_value(*l) >= 0 => {
                dst[*dst_pos] = ((hex_value(*h) as u8) << 4) | hex_value(*l) as u8;
                *dst_pos += 1;
                *src_pos += 3;
            }
            [b'\r'] | [] if !end_of_stream => {
                // escape may continue in the next chunk
                break;
            }
            [h] if !end_of_stream && hex_value(*h) >= 0 => {
                break;
            }
            _ => {
                dst[*dst_pos] = b'=';
                *dst_pos += 1;
                *src_pos += 1;
            }
        }
    }
    *dst_pos - start_dst
}

/// Streaming quoted-printable decoder over any reader.
pub struct QuotedPrintableDecoder<R: Read> {
    inner: R,
    carry: Vec<u8>,
    out: Vec<u8>,
    out_pos: usize,
    eof: bool,
}

impl<R: Read> QuotedPrintableDecoder<R> {
    pub fn new(inner: R) -> QuotedPrintableDecoder<R> {
        QuotedPrintableDecoder { inner, carry: Vec::new(), out: Vec::new(), out_pos: 0, eof: false }
    }
}

impl<R: Read> Read for QuotedPrintableDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.out_pos < self.out.len() {
                let n = (self.out.len() - self.out_pos).min(buf.len());
                buf[..n].copy_from_slice(&self.out[self.out_pos..self.out_pos + n]);
                self.out_pos += n;
                return Ok(n);
            }
            if self.eof && self.carry.is_empty() {
                return Ok(0);
            }
            if !self.eof {
                let mut chunk = [0u8; 4096];
                let n = self.inner.read(&mut chunk)?;
                if n == 0 {
                    self.eof = true;
                } else {
                    self.carry.extend_from_slice(&chunk[..n]);
                }
            }
            let mut src_pos = 0;
            self.out.resize(self.carry.len() + 3, 0);
            self.out_pos = 0;
            let mut dst_pos = 0;
            let max = self.out.len();
            decode(&self.carry, &mut src_pos, &mut self.out, &mut dst_pos, max, self.eof);
            self.out.truncate(dst_pos);
            self.carry.drain(..src_pos);
            if self.eof && dst_pos == 0 {
                self.carry.clear();
                return Ok(0);
            }
        }
    }
}

/// Streaming quoted-printable encoder over any reader.
///
/// In text mode CRLF passes through as a hard break and a bare LF is
/// canonicalized to one; in binary mode line ends are escaped like any
/// other control byte.  Output lines stay within 76 columns via soft
/// breaks.
pub struct QuotedPrintableEncoder<R: Read> {
    inner: R,
    text: bool,
    carry: Vec<u8>,
    column: usize,
    out: Vec<u8>,
    out_pos: usize,
    eof: bool,
}

impl<R: Read> QuotedPrintableEncoder<R> {
    pub fn new(inner: R, text: bool) -> QuotedPrintableEncoder<R> {
        QuotedPrintableEncoder {
            inner,
            text,
            carry: Vec::new(),
            column: 0,
            out: Vec::new(),
            out_pos: 0,
            eof: false,
        }
    }

    fn push_literal(&mut self, b: u8) {
        if self.column + 1 > LINE_WIDTH - 1 {
            self.out.extend_from_slice(b"=\r\n");
            self.column = 0;
        }
        self.out.push(b);
        self.column += 1;
    }

    fn push_escaped(&mut self, b: u8) {
        if self.column + 3 > LINE_WIDTH - 1 {
            self.out.extend_from_slice(b"=\r\n");
            self.column = 0;
        }
        self.out.push(b'=');
        self.out.push(HEX_UPPER[(b >> 4) as usize]);
        self.out.push(HEX_UPPER[(b & 0x0F) as usize]);
        self.column += 3;
    }

    fn push_hard_break(&mut self) {
        self.out.extend_from_slice(b"\r\n");
        self.column = 0;
    }

    fn needs_escape(&self, b: u8) -> bool {
        b >= 0x7F || b == b'=' || (b < 0x20 && b != b'\t')
    }
}

impl<R: Read> Read for QuotedPrintableEncoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.out_pos < self.out.len() {
                let n = (self.out.len() - self.out_pos).min(buf.len());
                buf[..n].copy_from_slice(&self.out[self.out_pos..self.out_pos + n]);
                self.out_pos += n;
                return Ok(n);
            }
            if self.eof && self.carry.is_empty() {
                return Ok(0);
            }
            if !self.eof {
                let mut chunk = [0u8; 4096];
                let n = self.inner.read(&mut chunk)?;
                if n == 0 {
                    self.eof = true;
                } else {
                    self.carry.extend_from_slice(&chunk[..n]);
                }
            }
            self.out.clear();
            self.out_pos = 0;
            let mut pos = 0;
            while pos < self.carry.len() {
                let b = self.carry[pos];
                let next = self.carry.get(pos + 1).copied();
                // a trailing space, tab or CR needs the next byte to decide
                if next.is_none() && !self.eof && (b == b' ' || b == b'\t' || b == b'\r') {
                    break;
                }
                match b {
                    b' ' | b'\t' => {
                        let at_line_end = match next {
                            Some(b'\r') | Some(b'\n') => self.text,
                            Some(_) => false,
                            None => true,
                        };
                        if at_line_end {
                            self.push_escaped(b);
                        } else {
                            self.push_literal(b);
                        }
                        pos += 1;
                    }
                    b'\r' if self.text && next == Some(b'\n') => {
                        self.push_hard_break();
                        pos += 2;
                    }
                    b'\n' if self.text => {
                        self.push_hard_break();
                        pos += 1;
                    }
                    _ => {
                        if self.needs_escape(b) {
                            self.push_escaped(b);
                        } else {
                            self.push_literal(b);
                        }
                        pos += 1;
                    }
                }
            }
            self.carry.drain(..pos);
            if self.out.is_empty() && self.eof && self.carry.is_empty() {
                return Ok(0);
            }
        }
    }
}
