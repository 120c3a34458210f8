/*
 * message.rs
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

//! message/rfc822 parts.  The enclosed message is a complete part tree
//! with its own header block.

use std::ops::Deref;
use std::rc::Rc;

use crate::content_type::{ContentType, MESSAGE_RFC822};
use crate::part::{Dirty, MessageState, MimePart, PartKind};

/// A part whose content is itself a message.
#[derive(Clone)]
pub struct MimeMessage {
    part: MimePart,
}

impl Deref for MimeMessage {
    type Target = MimePart;

    fn deref(&self) -> &MimePart {
        &self.part
    }
}

impl MimeMessage {
    pub fn new(body: Option<MimePart>) -> MimeMessage {
        let part = MimePart::new_node(PartKind::Message(MessageState { body: None }));
        part.set_content_type(ContentType::new(MESSAGE_RFC822));
        let message = MimeMessage { part };
        if let Some(body) = body {
            message.set_body(body);
        }
        message
    }

    pub(crate) fn wrap(part: MimePart) -> MimeMessage {
        MimeMessage { part }
    }

    pub fn into_part(self) -> MimePart {
        self.part
    }

    /// The enclosed message, if any.
    pub fn body(&self) -> Option<MimePart> {
        match &self.part.inner.borrow().kind {
            PartKind::Message(state) => state.body.clone(),
            _ => None,
        }
    }

    /// Replace the enclosed message.  The previous one, if different, is
    /// detached.
    pub fn set_body(&self, body: MimePart) {
        let old = match &self.part.inner.borrow().kind {
            PartKind::Message(state) => state.body.clone(),
            _ => None,
        };
        if let Some(old) = old {
            if Rc::ptr_eq(&old.inner, &body.inner) {
                return;
            }
            old.detach();
        }
        body.set_parent(&self.part);
        {
            let mut inner = self.part.inner.borrow_mut();
            if let PartKind::Message(state) = &mut inner.kind {
                state.body = Some(body);
            }
        }
        self.part.mark_dirty(Dirty::Content);
    }
}

impl Default for MimeMessage {
    fn default() -> MimeMessage {
        MimeMessage::new(None)
    }
}

impl MimePart {
    /// View the node as a message/rfc822 part, if it is one.
    pub fn as_message(&self) -> Option<MimeMessage> {
        if self.is_message() {
            Some(MimeMessage::wrap(self.clone()))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::MimeBodyPart;
    use std::io::Read;

    fn inner_message() -> MimePart {
        let body = MimeBodyPart::new(None);
        body.set_header("Subject", Some("enclosed"));
        body.set_text("hello from inside", None, None, None).unwrap();
        body.into_part()
    }

    #[test]
    fn construction_types_the_part() {
        let message = MimeMessage::new(Some(inner_message()));
        assert_eq!(message.content_type().content_type(), "message/rfc822");
        let body = message.body().unwrap();
        assert!(Rc::ptr_eq(&body.parent().unwrap().inner, &message.inner));
    }

    #[test]
    fn serializes_outer_headers_then_enclosed_message() {
        let message = MimeMessage::new(Some(inner_message()));
        let mut out = Vec::new();
        message
            .input_stream()
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        let wire = String::from_utf8(out).unwrap();
        let split = wire.find("\r\n\r\n").unwrap();
        assert!(wire[..split].contains("Content-Type: message/rfc822"));
        assert!(wire[split..].contains("Subject: enclosed"));
        assert!(wire.ends_with("hello from inside"));
    }

    #[test]
    fn set_body_detaches_the_previous_one() {
        let message = MimeMessage::new(Some(inner_message()));
        let first = message.body().unwrap();
        let second = inner_message();
        message.set_body(second.clone());
        assert!(first.parent().is_none());
        assert!(Rc::ptr_eq(&message.body().unwrap().inner, &second.inner));
    }

    #[test]
    fn view_is_gated_by_kind() {
        let leaf = MimeBodyPart::new(None).into_part();
        assert!(leaf.as_message().is_none());
        let message = MimeMessage::new(None).into_part();
        assert!(message.as_message().is_some());
    }
}
