/*
 * cte.rs
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

//! Content-Transfer-Encoding values.

use std::fmt;

/// The five RFC 2045 transfer encodings.  Unrecognized header values are
/// treated as binary, i.e. bytes pass through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    Binary,
    SevenBit,
    EightBit,
    QuotedPrintable,
    Base64,
}

impl TransferEncoding {
    /// Map a header value to an encoding.  Absent or unknown values are
    /// binary.
    pub fn for_string(value: Option<&str>) -> TransferEncoding {
        let value = match value {
            Some(value) => value.trim(),
            None => return TransferEncoding::Binary,
        };
        if value.eq_ignore_ascii_case("7bit") {
            TransferEncoding::SevenBit
        } else if value.eq_ignore_ascii_case("8bit") {
            TransferEncoding::EightBit
        } else if value.eq_ignore_ascii_case("quoted-printable") {
            TransferEncoding::QuotedPrintable
        } else if value.eq_ignore_ascii_case("base64") {
            TransferEncoding::Base64
        } else {
            TransferEncoding::Binary
        }
    }

    /// Collapse the identity encodings: 7bit, 8bit and binary all leave the
    /// bytes alone, so for transcoding decisions they are the same thing.
    pub fn normalized(self) -> TransferEncoding {
        match self {
            TransferEncoding::QuotedPrintable | TransferEncoding::Base64 => self,
            _ => TransferEncoding::Binary,
        }
    }

    pub fn to_str(self) -> &'static str {
        match self {
            TransferEncoding::Binary => "binary",
            TransferEncoding::SevenBit => "7bit",
            TransferEncoding::EightBit => "8bit",
            TransferEncoding::QuotedPrintable => "quoted-printable",
            TransferEncoding::Base64 => "base64",
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.to_str())
    }
}
