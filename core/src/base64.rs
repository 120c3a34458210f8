/*
 * base64.rs
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

//! Incremental base64 transcoding for transfer-encoded bodies (RFC 2045 6.8).
//!
//! The decoder is deliberately lenient: whitespace and bytes outside the
//! alphabet are skipped, and padding closes the pending quantum without
//! ending the stream, so concatenated encoder output still decodes.

use std::io::{self, Read};
use std::sync::OnceLock;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Encoded line width for bodies.
const LINE_WIDTH: usize = 76;

fn decode_table() -> &'static [i8; 256] {
    static TABLE: OnceLock<[i8; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [-1i8; 256];
        for (i, &c) in ALPHABET.iter().enumerate() {
            table[c as usize] = i as i8;
        }
        table
    })
}

/// Decode base64 from `src` starting at `src_pos` into `dst` starting at
/// `dst_pos`, writing at most `max_decode` bytes.  Both positions are
/// advanced; `src_pos` is only advanced past input whose output has been
/// written, so a partial quantum at the end of `src` is left for the next
/// call.  When `end_of_stream` is set the final partial quantum is flushed
/// with implied padding.  Returns the number of bytes written.
pub fn decode(
    src: &[u8],
    src_pos: &mut usize,
    dst: &mut [u8],
    dst_pos: &mut usize,
    max_decode: usize,
    end_of_stream: bool,
) -> usize {
    let table = decode_table();
    let start_dst = *dst_pos;
    let mut quantum = [0u8; 4];
    let mut filled = 0usize;
    let mut pos = *src_pos;
    let mut consumed_to = *src_pos;

    while pos < src.len() {
        if *dst_pos + 3 > dst.len() || (*dst_pos - start_dst) + 3 > max_decode {
            break;
        }
        let b = src[pos];
        pos += 1;
        if b == b'=' {
            // padding closes the quantum early; two chars still carry a byte
            if filled == 2 {
                dst[*dst_pos] = (quantum[0] << 2) | (quantum[1] >> 4);
                *dst_pos += 1;
            } else if filled == 3 {
                dst[*dst_pos] = (quantum[0] << 2) | (quantum[1] >> 4);
                dst[*dst_pos + 1] = (quantum[1] << 4) | (quantum[2] >> 2);
                *dst_pos += 2;
            }
            filled = 0;
            consumed_to = pos;
            continue;
        }
        let v = table[b as usize];
        if v < 0 {
            if filled == 0 {
                consumed_to = pos;
            }
            continue;
        }
        quantum[filled] = v as u8;
        filled += 1;
        if filled == 4 {
            dst[*dst_pos] = (quantum[0] << 2) | (quantum[1] >> 4);
            dst[*dst_pos + 1] = (quantum[1] << 4) | (quantum[2] >> 2);
            dst[*dst_pos + 2] = (quantum[2] << 6) | quantum[3];
            *dst_pos += 3;
            filled = 0;
            consumed_to = pos;
        }
    }

    if end_of_stream && pos >= src.len() {
        if filled >= 2 {
            if *dst_pos + (filled - 1) <= dst.len()
                && (*dst_pos - start_dst) + (filled - 1) <= max_decode
            {
                dst[*dst_pos] = (quantum[0] << 2) | (quantum[1] >> 4);
                *dst_pos += 1;
                if filled == 3 {
                    dst[*dst_pos] = (quantum[1] << 4) | (quantum[2] >> 2);
                    *dst_pos += 1;
                }
                *src_pos = pos;
            } else {
                *src_pos = consumed_to;
            }
        } else {
            // a single leftover char carries no whole byte
            *src_pos = pos;
        }
    } else {
        *src_pos = consumed_to;
    }
    *dst_pos - start_dst
}

/// Streaming base64 decoder over any reader.
pub struct Base64Decoder<R: Read> {
    inner: R,
    carry: Vec<u8>,
    out: Vec<u8>,
    out_pos: usize,
    eof: bool,
}

impl<R: Read> Base64Decoder<R> {
    pub fn new(inner: R) -> Base64Decoder<R> {
        Base64Decoder { inner, carry: Vec::new(), out: Vec::new(), out_pos: 0, eof: false }
    }
}

impl<R: Read> Read for Base64Decoder<R> {
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
            self.out.resize(self.carry.len() / 4 * 3 + 3, 0);
            self.out_pos = 0;
            let mut dst_pos = 0;
            let max = self.out.len();
            decode(&self.carry, &mut src_pos, &mut self.out, &mut dst_pos, max, self.eof);
            self.out.truncate(dst_pos);
            self.carry.drain(..src_pos);
            if self.eof && dst_pos == 0 {
                // whatever is left cannot decode further
                self.carry.clear();
                return Ok(0);
            }
        }
    }
}

/// Streaming base64 encoder over any reader, folding output at 76 columns.
pub struct Base64Encoder<R: Read> {
    inner: R,
    carry: [u8; 3],
    carry_len: usize,
    column: usize,
    out: Vec<u8>,
    out_pos: usize,
    eof: bool,
    finished: bool,
}

impl<R: Read> Base64Encoder<R> {
    pub fn new(inner: R) -> Base64Encoder<R> {
        Base64Encoder {
            inner,
            carry: [0; 3],
            carry_len: 0,
            column: 0,
            out: Vec::new(),
            out_pos: 0,
            eof: false,
            finished: false,
        }
    }

    fn push_group(&mut self, group: &[u8]) {
        if self.column >= LINE_WIDTH {
            self.out.extend_from_slice(b"\r\n");
            self.column = 0;
        }
        let b0 = group[0];
        let b1 = if group.len() > 1 { group[1] } else { 0 };
        let b2 = if group.len() > 2 { group[2] } else { 0 };
        self.out.push(ALPHABET[(b0 >> 2) as usize]);
        self.out.push(ALPHABET[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize]);
        self.out.push(if group.len() > 1 { ALPHABET[(((b1 & 0x0F) << 2) | (b2 >> 6)) as usize] } else { b'=' });
        self.out.push(if group.len() > 2 { ALPHABET[(b2 & 0x3F) as usize] } else { b'=' });
        self.column += 4;
    }
}

impl<R: Read> Read for Base64Encoder<R> {
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
            if self.finished {
                return Ok(0);
            }
            self.out.clear();
            self.out_pos = 0;
            let mut chunk = [0u8; 3072];
            let n = if self.eof { 0 } else { self.inner.read(&mut chunk)? };
            if n == 0 {
                self.eof = true;
                if self.carry_len > 0 {
                    let tail = [self.carry[0], self.carry[1], self.carry[2]];
                    let len = self.carry_len;
                    self.push_group(&tail[..len]);
                    self.carry_len = 0;
                }
                self.finished = true;
                continue;
            }
            let mut pos = 0;
            while self.carry_len > 0 && self.carry_len < 3 && pos < n {
                self.carry[self.carry_len] = chunk[pos];
                self.carry_len += 1;
                pos += 1;
            }
            if self.carry_len == 3 {
                let group = [self.carry[0], self.carry[1], self.carry[2]];
                self.push_group(&group);
                self.carry_len = 0;
            }
            while pos + 3 <= n {
                let group = [chunk[pos], chunk[pos + 1], chunk[pos + 2]];
                self.push_group(&group);
                pos += 3;
            }
            while pos < n {
                self.carry[self.carry_len] = chunk[pos];
                self.carry_len += 1;
                pos += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn decode_all(src: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; src.len() * 3 / 4 + 3];
        let mut src_pos = 0;
        let mut dst_pos = 0;
        let max = out.len();
        decode(src, &mut src_pos, &mut out, &mut dst_pos, max, true);
        out.truncate(dst_pos);
        out
    }

    fn encode_all(src: &[u8]) -> Vec<u8> {
        let mut enc = Base64Encoder::new(Cursor::new(src.to_vec()));
        let mut out = Vec::new();
        enc.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn decode_simple() {
        assert_eq!(decode_all(b"SGFtYm9uZQ=="), b"Hambone");
        assert_eq!(decode_all(b"SGFtYm9uZXM="), b"Hambones");
        assert_eq!(decode_all(b"SGFtYm9uZXM"), b"Hambones");
    }

    #[test]
    fn decode_skips_whitespace_and_garbage() {
        assert_eq!(decode_all(b"SGFt\r\nYm9u\r\nZQ=="), b"Hambone");
        assert_eq!(decode_all(b"S G F t Y m 9 u Z Q = ="), b"Hambone");
        assert_eq!(decode_all(b"SGF*tYm9uZQ"), b"Hambone");
    }

    #[test]
    fn decode_leaves_partial_quantum_unconsumed() {
        let mut out = [0u8; 16];
        let mut src_pos = 0;
        let mut dst_pos = 0;
        let n = decode(b"SGFtYm9", &mut src_pos, &mut out, &mut dst_pos, 16, false);
        assert_eq!(n, 3);
        assert_eq!(&out[..3], b"Ham");
        // "Ym9" is an incomplete quantum, held back for the next call
        assert_eq!(src_pos, 4);
    }

    #[test]
    fn decode_respects_output_budget() {
        let mut out = [0u8; 3];
        let mut src_pos = 0;
        let mut dst_pos = 0;
        let n = decode(b"SGFtYm9uZQ==", &mut src_pos, &mut out, &mut dst_pos, 3, true);
        assert_eq!(n, 3);
        assert_eq!(&out[..3], b"Ham");
        assert_eq!(src_pos, 4);
        let mut rest = [0u8; 8];
        let mut dst_pos = 0;
        let n = decode(b"SGFtYm9uZQ==", &mut src_pos, &mut rest, &mut dst_pos, 8, true);
        assert_eq!(n, 4);
        assert_eq!(&rest[..4], b"bone");
    }

    #[test]
    fn decode_concatenated_streams() {
        assert_eq!(decode_all(b"SGFt"), b"Ham");
        assert_eq!(decode_all(b"Ym8=bmU="), b"bone");
    }

    #[test]
    fn encode_pads_and_holds_column() {
        assert_eq!(encode_all(b"Hambone"), b"SGFtYm9uZQ==");
        assert_eq!(encode_all(b"Hambones"), b"SGFtYm9uZXM=");
        assert_eq!(encode_all(b"Ham"), b"SGFt");
        assert_eq!(encode_all(b""), b"");
    }

    #[test]
    fn encode_folds_at_76() {
        let out = encode_all(&[b'x'; 100]);
        let text = std::str::from_utf8(&out).unwrap();
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 76);
        assert!(lines[1].len() <= 76);
        assert_eq!(decode_all(&out), vec![b'x'; 100]);
    }

    #[test]
    fn round_trip_through_readers() {
        let data: Vec<u8> = (0..=255u8).cycle().take(10000).collect();
        let encoded = encode_all(&data);
        let mut dec = Base64Decoder::new(Cursor::new(encoded));
        let mut out = Vec::new();
        dec.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn decoder_survives_tiny_reads() {
        struct OneByte<R: Read>(R);
        impl<R: Read> Read for OneByte<R> {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if buf.is_empty() {
                    return Ok(0);
                }
                self.0.read(&mut buf[..1])
            }
        }
        let mut dec = Base64Decoder::new(OneByte(Cursor::new(b"SGFtYm9uZQ==".to_vec())));
        let mut out = Vec::new();
        dec.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"Hambone");
    }
}
