/*
 * content_disposition.rs
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

//! Content-Disposition values (RFC 2183).

use crate::parameters::{is_token_char, ParameterList};

pub const ATTACHMENT: &str = "attachment";
pub const INLINE: &str = "inline";

/// A parsed Content-Disposition header value.  Anything that is not a
/// token normalizes to "attachment".
#[derive(Debug, Clone, PartialEq)]
pub struct ContentDisposition {
    disposition: String,
    params: ParameterList,
}

impl Default for ContentDisposition {
    fn default() -> ContentDisposition {
        ContentDisposition::new(ATTACHMENT)
    }
}

fn normalize(token: &str) -> String {
    let token = token.trim();
    let mut end = token.len();
    for (i, c) in token.char_indices() {
        if !is_token_char(c) {
            end = i;
            break;
        }
    }
    let token = &token[..end];
    if token.is_empty() {
        String::from(ATTACHMENT)
    } else {
        token.to_ascii_lowercase()
    }
}

impl ContentDisposition {
    pub fn new(value: &str) -> ContentDisposition {
        let (head, rest) = match value.find(';') {
            Some(i) => (&value[..i], &value[i..]),
            None => (value, ""),
        };
        ContentDisposition { disposition: normalize(head), params: ParameterList::parse(rest) }
    }

    pub fn disposition(&self) -> &str {
        &self.disposition
    }

    pub fn is_inline(&self) -> bool {
        self.disposition == INLINE
    }

    pub fn set_disposition(&mut self, value: &str) -> &mut ContentDisposition {
        self.disposition = normalize(value);
        self
    }

    pub fn filename(&self) -> Option<&str> {
        self.params.get("filename")
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn set_parameter(&mut self, name: &str, value: Option<&str>) -> &mut ContentDisposition {
        self.params.set(name, value);
        self
    }

    pub fn parameters(&self) -> &ParameterList {
        &self.params
    }

    pub(crate) fn append_value(&self, out: &mut String, column: &mut usize) {
        out.push_str(&self.disposition);
        *column += self.disposition.len();
        self.params.append_to(out, column);
    }

    /// The full header value, folded as it would appear after
    /// "Content-Disposition: ".
    pub fn to_header_value(&self) -> String {
        let mut out = String::new();
        let mut column = "Content-Disposition: ".len();
        self.append_value(&mut out, &mut column);
        out
    }
}
