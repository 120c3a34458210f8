/*
 * parameters.rs
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

//! MIME parameter lists with RFC 2231 extended values and continuations.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::charset;

/// RFC 2231 attribute-char: everything else gets percent-encoded in
/// extended parameter values.
const ATTR_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

const FOLD_WIDTH: usize = 76;
const SEGMENT_WIDTH: usize = 60;
const LONG_VALUE: usize = 72;

/// RFC 2045 token character: printable ASCII less tspecials.
pub(crate) fn is_token_char(c: char) -> bool {
    match c {
        '(' | ')' | '<' | '>' | '@' | ',' | ';' | ':' | '\\' | '"' | '/' | '[' | ']' | '?'
        | '=' => false,
        _ => ('\u{21}'..='\u{7e}').contains(&c),
    }
}

pub(crate) fn is_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_token_char)
}

/// RFC 2046 bchars.
pub(crate) fn is_boundary_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "'()+_,-./:=? ".contains(c)
}

/// A usable multipart boundary: 1-70 bchars, not ending in a space.
pub(crate) fn is_valid_boundary(s: &str) -> bool {
    !s.is_empty() && s.len() <= 70 && !s.ends_with(' ') && s.chars().all(is_boundary_char)
}

#[derive(Debug, Clone, PartialEq)]
struct Parameter {
    name: String,
    value: String,
}

/// An ordered, case-insensitive list of header parameters.  Parsing folds
/// RFC 2231 continuations and extended values back into plain strings;
/// serializing picks the token, quoted-string or extended form each value
/// needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterList {
    params: Vec<Parameter>,
}

enum Piece {
    Plain(String),
    ExtendedSingle(String),
    Segment(u32, bool, String),
}

#[derive(Default)]
struct Assembly {
    whole: Option<(bool, String)>,
    segments: Vec<(u32, bool, String)>,
}

fn classify(name: &str, value: String) -> (String, Piece) {
    if let Some((base, rest)) = name.split_once('*') {
        if base.is_empty() {
            return (name.to_string(), Piece::Plain(value));
        }
        if rest.is_empty() {
            return (base.to_string(), Piece::ExtendedSingle(value));
        }
        let (digits, extended) = match rest.strip_suffix('*') {
            Some(d) => (d, true),
            None => (rest, false),
        };
        if let Ok(index) = digits.parse::<u32>() {
            return (base.to_string(), Piece::Segment(index, extended, value));
        }
    }
    (name.to_string(), Piece::Plain(value))
}

/// Split "charset'language'data", tolerating values that skip the prefix.
fn split_charset(data: &str) -> (Option<String>, &str) {
    if let Some((cs, rest)) = data.split_once('\'') {
        if let Some((_lang, payload)) = rest.split_once('\'') {
            let charset = if cs.is_empty() { None } else { Some(cs.to_string()) };
            return (charset, payload);
        }
    }
    (None, data)
}

fn quote_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn split_encoded(s: &str, width: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let bytes = s.as_bytes();
    let mut start = 0;
    while bytes.len() - start > width {
        let mut cut = start + width;
        // never split a percent triple
        if bytes[cut - 1] == b'%' {
            cut -= 1;
        } else if cut >= start + 2 && bytes[cut - 2] == b'%' {
            cut -= 2;
        }
        parts.push(&s[start..cut]);
        start = cut;
    }
    parts.push(&s[start..]);
    parts
}

impl ParameterList {
    pub fn new() -> ParameterList {
        ParameterList::default()
    }

    /// Parse the parameter section of a structured header value, i.e.
    /// everything after the primary value.
    pub fn parse(s: &str) -> ParameterList {
        let mut assemblies: Vec<(String, Assembly)> = Vec::new();
        let mut rest = s;
        loop {
            rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ';');
            if rest.is_empty() {
                break;
            }
            let split = match rest.find(|c| c == '=' || c == ';') {
                Some(i) => i,
                None => break,
            };
            if rest.as_bytes()[split] != b'=' {
                // attribute without a value
                rest = &rest[split..];
                continue;
            }
            let name = rest[..split].trim().to_ascii_lowercase();
            rest = rest[split + 1..].trim_start();
            let value;
            if let Some(quoted) = rest.strip_prefix('"') {
                let mut out = String::new();
                let mut consumed = rest.len();
                let mut escaped = false;
                for (i, c) in quoted.char_indices() {
                    if escaped {
                        out.push(c);
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '"' {
                        consumed = 1 + i + 1;
                        break;
                    } else {
                        out.push(c);
                    }
                }
                value = out;
                rest = &rest[consumed.min(rest.len())..];
            } else {
                let end = rest.find(';').unwrap_or(rest.len());
                value = rest[..end].trim_end().to_string();
                rest = &rest[end..];
            }
            if name.is_empty() {
                continue;
            }
            let (base, piece) = classify(&name, value);
            let slot = match assemblies.iter().position(|(n, _)| *n == base) {
                Some(i) => i,
                None => {
                    assemblies.push((base, Assembly::default()));
                    assemblies.len() - 1
                }
            };
            let assembly = &mut assemblies[slot].1;
            match piece {
                Piece::Plain(v) => assembly.whole = Some((false, v)),
                Piece::ExtendedSingle(v) => assembly.whole = Some((true, v)),
                Piece::Segment(index, extended, v) => assembly.segments.push((index, extended, v)),
            }
        }

        let mut list = ParameterList::new();
        for (name, mut assembly) in assemblies {
            let value = if !assembly.segments.is_empty() {
                assembly.segments.sort_by_key(|s| s.0);
                let mut bytes = Vec::new();
                let mut cs: Option<String> = None;
                for (i, (_, extended, data)) in assembly.segments.iter().enumerate() {
                    if *extended {
                        let mut payload = data.as_str();
                        if i == 0 {
                            let (found, rest) = split_charset(payload);
                            cs = found;
                            payload = rest;
                        }
                        bytes.extend(percent_decode_str(payload));
                    } else {
                        bytes.extend_from_slice(data.as_bytes());
                    }
                }
                charset::decode(&bytes, Some(cs.as_deref().unwrap_or("utf-8")))
            } else {
                match assembly.whole {
                    Some((true, data)) => {
                        let (cs, payload) = split_charset(&data);
                        let bytes: Vec<u8> = percent_decode_str(payload).collect();
                        charset::decode(&bytes, Some(cs.as_deref().unwrap_or("utf-8")))
                    }
                    Some((false, value)) => value,
                    None => continue,
                }
            };
            list.params.push(Parameter { name, value });
        }
        list
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_str())
    }

    /// Set or remove a parameter.  Setting replaces the existing value in
    /// place; removing drops every occurrence.
    pub fn set(&mut self, name: &str, value: Option<&str>) {
        match value {
            Some(value) => {
                match self.params.iter_mut().find(|p| p.name.eq_ignore_ascii_case(name)) {
                    Some(p) => p.value = value.to_string(),
                    None => self
                        .params
                        .push(Parameter { name: name.to_ascii_lowercase(), value: value.to_string() }),
                }
            }
            None => self.params.retain(|p| !p.name.eq_ignore_ascii_case(name)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|p| (p.name.as_str(), p.value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Append "; name=value" pieces to a header value under construction,
    /// folding onto a new line when a piece would push past the fold width.
    pub(crate) fn append_to(&self, out: &mut String, column: &mut usize) {
        for (name, value) in self.iter() {
            for piece in pieces_for(name, value) {
                out.push(';');
                *column += 1;
                if *column + 1 + piece.len() > FOLD_WIDTH && *column > 8 {
                    out.push_str("\r\n\t");
                    *column = 1;
                } else {
                    out.push(' ');
                    *column += 1;
                }
                out.push_str(&piece);
                *column += piece.len();
            }
        }
    }
}

fn pieces_for(name: &str, value: &str) -> Vec<String> {
    let plain = value.is_ascii() && !value.chars().any(|c| (c as u32) < 0x20 && c != '\t');
    if plain {
        if is_token(value) && value.len() <= LONG_VALUE {
            return vec![format!("{}={}", name, value)];
        }
        if value.len() <= LONG_VALUE {
            return vec![format!("{}=\"{}\"", name, quote_escape(value))];
        }
        return value
            .as_bytes()
            .chunks(SEGMENT_WIDTH)
            .enumerate()
            .map(|(i, chunk)| {
                let chunk = std::str::from_utf8(chunk).unwrap_or_default();
                format!("{}*{}=\"{}\"", name, i, quote_escape(chunk))
            })
            .collect();
    }
    let encoded = utf8_percent_encode(value, ATTR_ENCODE).to_string();
    if encoded.len() <= LONG_VALUE {
        return vec![format!("{}*=utf-8''{}", name, encoded)];
    }
    split_encoded(&encoded, SEGMENT_WIDTH)
        .into_iter()
        .enumerate()
        .map(|(i, seg)| {
            if i == 0 {
                format!("{}*0*=utf-8''{}", name, seg)
            } else {
                format!("{}*{}*={}", name, i, seg)
            }
        })
        .collect()
}
