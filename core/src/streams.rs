/*
 * streams.rs
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

//! A reader formed by concatenating heterogeneous sources, used to
//! reassemble a part's wire form without buffering all of it.

use std::collections::VecDeque;
use std::io::{self, Read};

use crate::part::MimePart;

/// One link in a [`ChainReader`].  A `Part` link is not opened until the
/// chain reaches it, so parts serialized late in the chain see any
/// mutations made while earlier links were being read.
pub enum ChainItem {
    Buffer(Vec<u8>),
    Text(String),
    Stream(Box<dyn Read>),
    Part(MimePart),
}

impl From<Vec<u8>> for ChainItem {
    fn from(buf: Vec<u8>) -> ChainItem {
        ChainItem::Buffer(buf)
    }
}

impl From<String> for ChainItem {
    fn from(text: String) -> ChainItem {
        ChainItem::Text(text)
    }
}

impl From<Box<dyn Read>> for ChainItem {
    fn from(stream: Box<dyn Read>) -> ChainItem {
        ChainItem::Stream(stream)
    }
}

impl From<MimePart> for ChainItem {
    fn from(part: MimePart) -> ChainItem {
        ChainItem::Part(part)
    }
}

/// Reads each item in turn, advancing transparently on exhaustion.
/// Absent items are dropped at construction.
pub struct ChainReader {
    items: VecDeque<ChainItem>,
    current: Option<Box<dyn Read>>,
}

impl ChainReader {
    pub fn new(items: impl IntoIterator<Item = Option<ChainItem>>) -> ChainReader {
        ChainReader { items: items.into_iter().flatten().collect(), current: None }
    }
}

fn open(item: ChainItem) -> io::Result<Box<dyn Read>> {
    match item {
        ChainItem::Buffer(buf) => Ok(Box::new(io::Cursor::new(buf))),
        ChainItem::Text(text) => Ok(Box::new(io::Cursor::new(text.into_bytes()))),
        ChainItem::Stream(stream) => Ok(stream),
        ChainItem::Part(part) => part.input_stream(),
    }
}

impl Read for ChainReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.current.is_none() {
                match self.items.pop_front() {
                    Some(item) => self.current = Some(open(item)?),
                    None => return Ok(0),
                }
            }
            match self.current.as_mut() {
                Some(stream) => {
                    let num = stream.read(buf)?;
                    if num > 0 {
                        return Ok(num);
                    }
                    self.current = None;
                }
                None => return Ok(0),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenates_items_in_order() {
        let chain = ChainReader::new([
            Some(ChainItem::Buffer(b"Ham".to_vec())),
            Some(ChainItem::Text("bone".to_string())),
            Some(ChainItem::Stream(Box::new(io::Cursor::new(b" says hello".to_vec())))),
        ]);
        let mut out = Vec::new();
        let mut chain = chain;
        chain.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"Hambone says hello");
    }

    #[test]
    fn absent_items_skipped() {
        let mut chain = ChainReader::new([
            None,
            Some(ChainItem::Buffer(b"a".to_vec())),
            None,
            Some(ChainItem::Buffer(b"b".to_vec())),
            None,
        ]);
        let mut out = Vec::new();
        chain.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"ab");
    }

    #[test]
    fn empty_chain_is_empty() {
        let mut chain = ChainReader::new([]);
        let mut out = Vec::new();
        chain.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"");
    }

    #[test]
    fn small_reads_cross_item_edges() {
        let mut chain = ChainReader::new([
            Some(ChainItem::Buffer(b"ab".to_vec())),
            Some(ChainItem::Buffer(b"cd".to_vec())),
        ]);
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match chain.read(&mut byte).unwrap() {
                0 => break,
                _ => out.push(byte[0]),
            }
        }
        assert_eq!(out, b"abcd");
    }

    #[test]
    fn empty_items_do_not_end_the_chain() {
        let mut chain = ChainReader::new([
            Some(ChainItem::Buffer(Vec::new())),
            Some(ChainItem::Buffer(b"tail".to_vec())),
        ]);
        let mut out = Vec::new();
        chain.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"tail");
    }
}
