/*
 * multipart.rs
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

//! Multipart container parts.

use std::ops::Deref;
use std::rc::Rc;

use crate::content_type::{ContentType, MULTIPART_PREFIX};
use crate::part::{Dirty, MimePart, MultipartState, PartKind};

/// A multipart container.  Children keep their order; the boundary
/// lives in the Content-Type header.
#[derive(Clone)]
pub struct MimeMultipart {
    part: MimePart,
}

impl Deref for MimeMultipart {
    type Target = MimePart;

    fn deref(&self) -> &MimePart {
        &self.part
    }
}

impl MimeMultipart {
    /// A fresh, empty multipart of the given subtype with a generated
    /// boundary.
    pub fn new(subtype: &str) -> MimeMultipart {
        let part = MimePart::new_node(PartKind::Multipart(MultipartState {
            children: Vec::new(),
            boundary: None,
        }));
        part.set_content_type(ContentType::new(&format!("{}{}", MULTIPART_PREFIX, subtype)));
        part.ensure_boundary();
        MimeMultipart { part }
    }

    pub(crate) fn wrap(part: MimePart) -> MimeMultipart {
        MimeMultipart { part }
    }

    pub fn into_part(self) -> MimePart {
        self.part
    }

    /// The effective boundary: the declared or adopted one for parsed
    /// parts, the generated one for constructed parts.
    pub fn boundary(&self) -> Option<String> {
        match &self.part.inner.borrow().kind {
            PartKind::Multipart(state) => state.boundary.clone(),
            _ => None,
        }
    }

    pub fn count(&self) -> usize {
        match &self.part.inner.borrow().kind {
            PartKind::Multipart(state) => state.children.len(),
            _ => 0,
        }
    }

    /// Snapshot of the children, in order.
    pub fn parts(&self) -> Vec<MimePart> {
        match &self.part.inner.borrow().kind {
            PartKind::Multipart(state) => state.children.clone(),
            _ => Vec::new(),
        }
    }

    pub fn part_at(&self, index: usize) -> Option<MimePart> {
        match &self.part.inner.borrow().kind {
            PartKind::Multipart(state) => state.children.get(index).cloned(),
            _ => None,
        }
    }

    /// Append a child, detaching it from any previous parent.  Adding a
    /// part that is already a child does nothing.
    pub fn add_part(&self, part: MimePart) {
        let already = part
            .parent()
            .is_some_and(|p| Rc::ptr_eq(&p.inner, &self.part.inner));
        if already {
            return;
        }
        part.set_parent(&self.part);
        {
            let mut inner = self.part.inner.borrow_mut();
            if let PartKind::Multipart(state) = &mut inner.kind {
                state.children.push(part);
            }
        }
        self.part.mark_dirty(Dirty::Content);
    }

    pub fn remove_part(&self, part: &MimePart) {
        let is_child = part
            .parent()
            .is_some_and(|p| Rc::ptr_eq(&p.inner, &self.part.inner));
        if is_child {
            part.detach();
        }
    }
}

impl MimePart {
    /// View the node as a multipart, if it is one.
    pub fn as_multipart(&self) -> Option<MimeMultipart> {
        if self.is_multipart() {
            Some(MimeMultipart::wrap(self.clone()))
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

    #[test]
    fn construction_places_boundary_in_header() {
        let multi = MimeMultipart::new("alternative");
        let ctype = multi.content_type();
        assert_eq!(ctype.content_type(), "multipart/alternative");
        let boundary = ctype.parameter("boundary").unwrap().to_string();
        assert!(!boundary.is_empty());
        assert_eq!(multi.boundary().as_deref(), Some(boundary.as_str()));
        assert!(multi
            .header("Content-Type")
            .unwrap()
            .contains(&format!("boundary={}", boundary)));
    }

    #[test]
    fn add_part_reparents_and_serializes() {
        let multi = MimeMultipart::new("mixed");
        let text = MimeBodyPart::new(None);
        text.set_text("first part", None, None, None).unwrap();
        multi.add_part(text.clone().into_part());
        assert_eq!(multi.count(), 1);
        assert!(Rc::ptr_eq(&text.parent().unwrap().inner, &multi.inner));

        let mut out = Vec::new();
        multi.input_stream().unwrap().read_to_end(&mut out).unwrap();
        let wire = String::from_utf8(out).unwrap();
        let boundary = multi.boundary().unwrap();
        assert!(wire.contains(&format!("--{}\r\n", boundary)));
        assert!(wire.contains("first part"));
        assert!(wire.ends_with(&format!("\r\n--{}--\r\n", boundary)));
    }

    #[test]
    fn double_add_is_ignored() {
        let multi = MimeMultipart::new("mixed");
        let leaf = MimeBodyPart::new(None).into_part();
        multi.add_part(leaf.clone());
        multi.add_part(leaf);
        assert_eq!(multi.count(), 1);
    }

    #[test]
    fn remove_part_detaches() {
        let multi = MimeMultipart::new("mixed");
        let first = MimeBodyPart::new(None).into_part();
        let second = MimeBodyPart::new(None).into_part();
        multi.add_part(first.clone());
        multi.add_part(second.clone());
        multi.remove_part(&first);
        assert_eq!(multi.count(), 1);
        assert!(first.parent().is_none());
        assert!(Rc::ptr_eq(&multi.part_at(0).unwrap().inner, &second.inner));
    }

    #[test]
    fn moving_a_part_between_containers() {
        let from = MimeMultipart::new("mixed");
        let to = MimeMultipart::new("mixed");
        let leaf = MimeBodyPart::new(None).into_part();
        from.add_part(leaf.clone());
        to.add_part(leaf.clone());
        assert_eq!(from.count(), 0);
        assert_eq!(to.count(), 1);
        assert!(Rc::ptr_eq(&leaf.parent().unwrap().inner, &to.inner));
    }
}
