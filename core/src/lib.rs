/*
 * lib.rs
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

//! MIME message codec: a part tree with offset-backed lazy content, a
//! streaming incremental parser, and the RFC 2045/2047/2231/5322
//! encode/decode machinery between wire bytes and logical content.
//!
//! Parsed trees keep byte offsets into their backing source and
//! serialize by copying the original bytes wherever nothing changed;
//! only dirty regions are regenerated.  Trees are single-threaded;
//! callers wanting to share one across threads must serialize access
//! themselves.

mod base64;
mod body;
pub mod charset;
mod content_disposition;
mod content_type;
mod cte;
mod header;
mod header_block;
mod message;
mod multipart;
mod parameters;
mod parser;
mod part;
mod quoted_printable;
pub mod rfc2047;
mod source;
mod streams;

pub use body::MimeBodyPart;
pub use content_disposition::{ContentDisposition, ATTACHMENT, INLINE};
pub use content_type::{
    ContentType, APPLICATION_OCTET_STREAM, MESSAGE_RFC822, MULTIPART_PREFIX, TEXT_PLAIN,
};
pub use cte::TransferEncoding;
pub use header::MimeHeader;
pub use header_block::MimeHeaderBlock;
pub use message::MimeMessage;
pub use multipart::MimeMultipart;
pub use parameters::ParameterList;
pub use parser::{parse, MimeParser, ParseReader, ParseWriter};
pub use part::MimePart;
pub use source::{DataSource, PartSource, StreamSource};
pub use streams::{ChainItem, ChainReader};
