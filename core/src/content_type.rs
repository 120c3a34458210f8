/*
 * content_type.rs
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

//! Content-Type values (RFC 2045 5).

use crate::parameters::{is_token_char, ParameterList};

pub const TEXT_PLAIN: &str = "text/plain";
pub const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";
pub const MESSAGE_RFC822: &str = "message/rfc822";
pub const MULTIPART_PREFIX: &str = "multipart/";

/// A parsed Content-Type header value.  Parsing never fails; malformed
/// values normalize to a sensible default, so the primary and sub-type are
/// always present and lowercase.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentType {
    primary: String,
    sub: String,
    params: ParameterList,
}

impl Default for ContentType {
    fn default() -> ContentType {
        ContentType::new(TEXT_PLAIN)
    }
}

fn normalize(token: &str, default_type: &str) -> (String, String) {
    let token = token.trim();
    let mut end = token.len();
    for (i, c) in token.char_indices() {
        if !is_token_char(c) && c != '/' {
            end = i;
            break;
        }
    }
    let token = &token[..end];
    if token.is_empty() {
        return match default_type.split_once('/') {
            Some((p, s)) => (p.to_ascii_lowercase(), s.to_ascii_lowercase()),
            None => (String::from("application"), String::from("octet-stream")),
        };
    }
    match token.split_once('/') {
        Some((p, s)) if !p.is_empty() && !s.is_empty() && !s.contains('/') => {
            (p.to_ascii_lowercase(), s.to_ascii_lowercase())
        }
        _ => {
            // a bare or broken token degrades by its head
            let head = token.split('/').next().unwrap_or(token);
            if head.eq_ignore_ascii_case("text") {
                (String::from("text"), String::from("plain"))
            } else {
                (String::from("application"), String::from("octet-stream"))
            }
        }
    }
}

impl ContentType {
    pub fn new(value: &str) -> ContentType {
        ContentType::with_default(Some(value), TEXT_PLAIN)
    }

    /// Parse a header value, normalizing anything unusable to
    /// `default_type` (itself expected to be a plain "primary/sub" pair).
    pub fn with_default(value: Option<&str>, default_type: &str) -> ContentType {
        let value = value.unwrap_or("");
        let (head, rest) = match value.find(';') {
            Some(i) => (&value[..i], &value[i..]),
            None => (value, ""),
        };
        let (primary, sub) = normalize(head, default_type);
        ContentType { primary, sub, params: ParameterList::parse(rest) }
    }

    pub fn primary_type(&self) -> &str {
        &self.primary
    }

    pub fn sub_type(&self) -> &str {
        &self.sub
    }

    /// The "primary/sub" pair without parameters.
    pub fn content_type(&self) -> String {
        format!("{}/{}", self.primary, self.sub)
    }

    pub fn is_multipart(&self) -> bool {
        self.primary == "multipart"
    }

    pub fn is_message_rfc822(&self) -> bool {
        self.primary == "message" && self.sub == "rfc822"
    }

    /// Replace the primary and sub-type from a header value.  Parameters
    /// carried by `value` override same-named existing ones; the rest are
    /// kept.
    pub fn set_content_type(&mut self, value: &str) -> &mut ContentType {
        let parsed = ContentType::new(value);
        self.primary = parsed.primary;
        self.sub = parsed.sub;
        for (name, value) in parsed.params.iter() {
            self.params.set(name, Some(value));
        }
        self
    }

    pub fn set_sub_type(&mut self, sub: &str) -> &mut ContentType {
        let value = format!("{}/{}", self.primary, sub);
        let (primary, new_sub) = normalize(&value, TEXT_PLAIN);
        self.primary = primary;
        self.sub = new_sub;
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn set_parameter(&mut self, name: &str, value: Option<&str>) -> &mut ContentType {
        self.params.set(name, value);
        self
    }

    pub fn parameters(&self) -> &ParameterList {
        &self.params
    }

    pub(crate) fn append_value(&self, out: &mut String, column: &mut usize) {
        out.push_str(&self.primary);
        out.push('/');
        out.push_str(&self.sub);
        *column += self.primary.len() + 1 + self.sub.len();
        self.params.append_to(out, column);
    }

    /// The full header value, folded as it would appear after
    /// "Content-Type: ".
    pub fn to_header_value(&self) -> String {
        let mut out = String::new();
        let mut column = "Content-Type: ".len();
        self.append_value(&mut out, &mut column);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple() {
        let ct = ContentType::new("text/html; charset=utf-8");
        assert_eq!(ct.primary_type(), "text");
        assert_eq!(ct.sub_type(), "html");
        assert_eq!(ct.content_type(), "text/html");
        assert_eq!(ct.parameter("charset"), Some("utf-8"));
    }

    #[test]
    fn parse_case_folds() {
        let ct = ContentType::new("TEXT/Plain");
        assert_eq!(ct.content_type(), "text/plain");
    }

    #[test]
    fn missing_sub_type() {
        assert_eq!(ContentType::new("text").content_type(), "text/plain");
        assert_eq!(ContentType::new("text/").content_type(), "text/plain");
        assert_eq!(ContentType::new("TEXT").content_type(), "text/plain");
        assert_eq!(ContentType::new("foo").content_type(), "application/octet-stream");
        assert_eq!(ContentType::new("multipart").content_type(), "application/octet-stream");
        assert_eq!(ContentType::new("/plain").content_type(), "application/octet-stream");
    }

    #[test]
    fn empty_takes_default() {
        assert_eq!(ContentType::new("").content_type(), "text/plain");
        assert_eq!(
            ContentType::with_default(None, "message/rfc822").content_type(),
            "message/rfc822"
        );
        assert_eq!(ContentType::with_default(Some("; x=1"), "text/plain").content_type(), "text/plain");
    }

    #[test]
    fn truncates_trailing_junk() {
        let ct = ContentType::new("text/plain stuff and nonsense; charset=koi8-r");
        assert_eq!(ct.content_type(), "text/plain");
        assert_eq!(ct.parameter("charset"), Some("koi8-r"));
    }

    #[test]
    fn multiple_slashes_degrade() {
        assert_eq!(ContentType::new("a/b/c").content_type(), "application/octet-stream");
        assert_eq!(ContentType::new("text/plain/x").content_type(), "text/plain");
    }

    #[test]
    fn boundary_parameter() {
        let ct = ContentType::new("multipart/mixed; boundary=\"=_sample_1\"");
        assert!(ct.is_multipart());
        assert_eq!(ct.parameter("boundary"), Some("=_sample_1"));
    }

    #[test]
    fn set_content_type_keeps_parameters() {
        let mut ct = ContentType::new("text/plain; charset=utf-8; name=a.txt");
        ct.set_content_type("text/html");
        assert_eq!(ct.content_type(), "text/html");
        assert_eq!(ct.parameter("charset"), Some("utf-8"));
        assert_eq!(ct.parameter("name"), Some("a.txt"));
    }

    #[test]
    fn set_sub_type_renormalizes() {
        let mut ct = ContentType::new("text/plain");
        ct.set_sub_type("html");
        assert_eq!(ct.content_type(), "text/html");
        ct.set_sub_type("");
        assert_eq!(ct.content_type(), "text/plain");
    }

    #[test]
    fn header_value_round_trip() {
        let mut ct = ContentType::new("multipart/mixed");
        ct.set_parameter("boundary", Some("=_b_17_1724"));
        let value = ct.to_header_value();
        assert_eq!(value, "multipart/mixed; boundary=\"=_b_17_1724\"");
        let back = ContentType::new(&value);
        assert_eq!(back.parameter("boundary"), Some("=_b_17_1724"));
    }

    #[test]
    fn rfc2231_filename() {
        let ct = ContentType::new(
            "application/pdf; name*0*=utf-8''rapport%20; name*1*=%E2%82%AC2026.pdf",
        );
        assert_eq!(ct.parameter("name"), Some("rapport \u{20ac}2026.pdf"));
    }
}
