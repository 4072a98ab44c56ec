//! Binding views to buffers and addressing their elements.
//!
//! A view records only its buffer handle, byte offset and element count. The
//! address of its data is derived from the buffer's current store each time
//! it is needed: inline stores move when the heap is compacted, and any store
//! can be detached by user code. Callers compute a [`DataAddress`] right
//! before touching memory and drop it before the next call that can allocate
//! or run user code.

use super::super::*;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TypedArrayInfo {
    pub(crate) kind: ElementKind,
    pub(crate) buffer: JsObject,
    pub(crate) byte_offset: usize,
    pub(crate) array_length: usize,
}

impl TypedArrayInfo {
    pub(crate) fn byte_length(&self) -> usize {
        self.array_length * self.kind.element_size()
    }
}

/// A resolved data address. Valid until the next allocation or re-entrant
/// call.
#[derive(Clone, Debug)]
pub(crate) enum DataAddress {
    /// Absolute byte offset into the inline heap.
    Inline(usize),
    External(Rc<RefCell<Vec<u8>>>, usize),
}

impl DataAddress {
    pub(crate) fn offset(&self, delta: usize) -> DataAddress {
        match self {
            DataAddress::Inline(at) => DataAddress::Inline(at + delta),
            DataAddress::External(block, at) => DataAddress::External(block.clone(), at + delta),
        }
    }

    fn same_storage(&self, other: &DataAddress) -> bool {
        match (self, other) {
            (DataAddress::Inline(_), DataAddress::Inline(_)) => true,
            (DataAddress::External(a, _), DataAddress::External(b, _)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Engine {
    /// Creates a view over `buffer`. The range is checked against the
    /// buffer's stored byte length, so a detached buffer still accepts
    /// ranges that fit its former size.
    pub(crate) fn bind_view(
        &mut self,
        kind: ElementKind,
        buffer: JsObject,
        byte_offset: usize,
        length: usize,
        proto: Option<ObjectRef>,
    ) -> JsResult<JsObject> {
        let Some(data) = self.buffer_data(buffer) else {
            return self.fail(ViewError::incompatible("bind"));
        };
        let byte_length = length.checked_mul(kind.element_size());
        let fits = byte_length
            .and_then(|n| n.checked_add(byte_offset))
            .is_some_and(|end| end <= data.byte_length);
        if !fits {
            return self.fail(ViewError::OutOfBuffer {
                byte_offset,
                byte_length: byte_length.unwrap_or(usize::MAX),
            });
        }
        let obj = self.create_object();
        {
            let mut o = obj.borrow_mut();
            o.class_name = kind.name().to_string();
            o.prototype = proto.or_else(|| self.typed_array_prototypes[kind.index()].clone());
            o.typed_array_info = Some(TypedArrayInfo {
                kind,
                buffer,
                byte_offset,
                array_length: length,
            });
        }
        tracing::trace!(kind = kind.name(), buffer = buffer.id, byte_offset, length, "view bound");
        Ok(Self::object_ref(&obj))
    }

    /// Start of the buffer's data, or `None` once detached.
    pub(crate) fn buffer_base(&self, buffer: JsObject) -> Option<DataAddress> {
        match self.buffer_data(buffer)?.store {
            BackingStore::Inline { block } => Some(DataAddress::Inline(block + gc::INLINE_HEADER_SIZE)),
            BackingStore::External(block) => Some(DataAddress::External(block, 0)),
            BackingStore::Detached => None,
        }
    }

    fn view_in_bounds(&self, ta: &TypedArrayInfo) -> bool {
        self.buffer_data(ta.buffer).is_some_and(|d| {
            !d.is_detached() && ta.byte_offset + ta.byte_length() <= d.byte_length
        })
    }

    /// Start of the view's data, or `None` if the view no longer fits its
    /// buffer.
    pub(crate) fn view_base(&self, ta: &TypedArrayInfo) -> Option<DataAddress> {
        if !self.view_in_bounds(ta) {
            return None;
        }
        self.buffer_base(ta.buffer).map(|base| base.offset(ta.byte_offset))
    }

    pub(crate) fn element_address(base: &DataAddress, index: usize, kind: ElementKind) -> DataAddress {
        base.offset(index * kind.element_size())
    }

    pub(crate) fn is_view_detached(&self, ta: &TypedArrayInfo) -> bool {
        self.is_buffer_detached(ta.buffer)
    }

    /// Element count as public operations observe it.
    pub(crate) fn view_length(&self, ta: &TypedArrayInfo) -> usize {
        if self.view_in_bounds(ta) { ta.array_length } else { 0 }
    }

    pub(crate) fn valid_integer_index(&self, ta: &TypedArrayInfo, index: f64) -> Option<usize> {
        if index.fract() != 0.0 || (index == 0.0 && index.is_sign_negative()) || index < 0.0 {
            return None;
        }
        let len = self.view_length(ta);
        if index >= len as f64 {
            return None;
        }
        Some(index as usize)
    }

    pub(crate) fn read_bytes(&self, at: &DataAddress, out: &mut [u8]) {
        match at {
            DataAddress::Inline(start) => {
                if let Some(src) = self.inline_heap.bytes().get(*start..*start + out.len()) {
                    out.copy_from_slice(src);
                }
            }
            DataAddress::External(block, start) => {
                if let Some(src) = block.borrow().get(*start..*start + out.len()) {
                    out.copy_from_slice(src);
                }
            }
        }
    }

    pub(crate) fn write_bytes(&mut self, at: &DataAddress, data: &[u8]) {
        match at {
            DataAddress::Inline(start) => {
                if let Some(dst) = self.inline_heap.bytes_mut().get_mut(*start..*start + data.len()) {
                    dst.copy_from_slice(data);
                }
            }
            DataAddress::External(block, start) => {
                if let Some(dst) = block.borrow_mut().get_mut(*start..*start + data.len()) {
                    dst.copy_from_slice(data);
                }
            }
        }
    }

    /// Copies `len` bytes as if through a temporary: overlapping ranges in
    /// the same storage come out as the source was before the call.
    pub(crate) fn move_bytes(&mut self, from: &DataAddress, to: &DataAddress, len: usize) {
        if len == 0 {
            return;
        }
        match (from, to) {
            (DataAddress::Inline(src), DataAddress::Inline(dst)) => {
                let heap = self.inline_heap.bytes_mut();
                if src + len <= heap.len() && dst + len <= heap.len() {
                    heap.copy_within(*src..*src + len, *dst);
                }
            }
            (DataAddress::External(block, src), DataAddress::External(_, dst))
                if from.same_storage(to) =>
            {
                let mut bytes = block.borrow_mut();
                if src + len <= bytes.len() && dst + len <= bytes.len() {
                    bytes.copy_within(*src..*src + len, *dst);
                }
            }
            _ => {
                let mut tmp = vec![0u8; len];
                self.read_bytes(from, &mut tmp);
                self.write_bytes(to, &tmp);
            }
        }
    }

    pub(crate) fn read_element(&self, ta: &TypedArrayInfo, index: usize) -> Option<Element> {
        if index >= self.view_length(ta) {
            return None;
        }
        let base = self.view_base(ta)?;
        let size = ta.kind.element_size();
        let mut raw = [0u8; 8];
        self.read_bytes(&Self::element_address(&base, index, ta.kind), &mut raw[..size]);
        Some(ta.kind.decode(&raw[..size]))
    }

    /// Stores an already converted element. Out-of-range indices are
    /// ignored; a value of the wrong content class is a TypeError.
    pub(crate) fn write_element(&mut self, ta: &TypedArrayInfo, index: usize, value: Element) -> JsResult<()> {
        let size = ta.kind.element_size();
        let mut raw = [0u8; 8];
        if let Err(e) = ta.kind.encode(value, &mut raw[..size]) {
            return self.fail(e);
        }
        if index >= self.view_length(ta) {
            return Ok(());
        }
        if let Some(base) = self.view_base(ta) {
            self.write_bytes(&Self::element_address(&base, index, ta.kind), &raw[..size]);
        }
        Ok(())
    }

    pub(crate) fn typed_array_info_of(&self, val: &JsValue) -> Option<TypedArrayInfo> {
        let obj = self.get_object(val.as_object()?.id)?;
        let info = obj.borrow().typed_array_info.clone();
        info
    }

    /// The receiver's view record; no detachment check.
    pub(crate) fn require_typed_array(&mut self, val: &JsValue, method: &str) -> JsResult<TypedArrayInfo> {
        match self.typed_array_info_of(val) {
            Some(ta) => Ok(ta),
            None => self.fail(ViewError::incompatible(method)),
        }
    }

    /// ValidateTypedArray: the receiver must be a view over an attached
    /// buffer.
    pub(crate) fn validate_typed_array(&mut self, val: &JsValue, method: &str) -> JsResult<TypedArrayInfo> {
        let ta = self.require_typed_array(val, method)?;
        if self.is_view_detached(&ta) {
            return self.fail(ViewError::detached(method));
        }
        Ok(ta)
    }

    /// GetBuffer: the view's buffer, moved out of the inline heap first.
    pub(crate) fn get_buffer(&mut self, ta: &TypedArrayInfo) -> JsObject {
        self.materialize_buffer(ta.buffer);
        ta.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bound(engine: &mut Engine, kind: ElementKind, buffer: JsObject, offset: usize, len: usize) -> TypedArrayInfo {
        let view = engine.bind_view(kind, buffer, offset, len, None).unwrap();
        engine.typed_array_info_of(&JsValue::Object(view)).unwrap()
    }

    #[test]
    fn element_addresses_follow_offsets() {
        let mut engine = Engine::new();
        let buffer = engine.allocate_buffer(16);
        let ta = bound(&mut engine, ElementKind::Int16, buffer, 4, 4);
        engine.write_element(&ta, 1, Element::Number(-2.0)).unwrap();
        let base = engine.buffer_base(buffer).unwrap();
        let mut raw = [0u8; 2];
        engine.read_bytes(&base.offset(6), &mut raw);
        assert_eq!(i16::from_le_bytes(raw), -2);
        assert_eq!(engine.read_element(&ta, 1), Some(Element::Number(-2.0)));
        assert_eq!(engine.read_element(&ta, 4), None);
    }

    #[test]
    fn detached_views_read_as_empty() {
        let mut engine = Engine::new();
        let buffer = engine.allocate_buffer(8);
        let ta = bound(&mut engine, ElementKind::Uint8, buffer, 0, 8);
        engine.detach_buffer(buffer);
        assert_eq!(engine.view_length(&ta), 0);
        assert!(engine.view_base(&ta).is_none());
        assert_eq!(engine.read_element(&ta, 0), None);
        engine.write_element(&ta, 0, Element::Number(1.0)).unwrap();
        let again = bound(&mut engine, ElementKind::Uint8, buffer, 2, 6);
        assert_eq!(engine.view_length(&again), 0);
    }

    #[test]
    fn overlapping_moves_behave_like_a_temporary() {
        let mut engine = Engine::new();
        let buffer = engine.allocate_buffer(8);
        let base = engine.buffer_base(buffer).unwrap();
        engine.write_bytes(&base, &[1, 2, 3, 4, 5, 6, 7, 8]);
        engine.move_bytes(&base, &base.offset(2), 6);
        let mut out = [0u8; 8];
        engine.read_bytes(&base, &mut out);
        assert_eq!(out, [1, 2, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn addresses_are_recomputed_after_compaction() {
        let mut engine = Engine::new();
        let doomed = engine.allocate_buffer(8);
        let kept = engine.allocate_buffer(8);
        let ta = bound(&mut engine, ElementKind::Uint8, kept, 0, 8);
        engine.write_element(&ta, 3, Element::Number(42.0)).unwrap();
        let before = engine.buffer_base(kept).unwrap();
        engine.detach_buffer(doomed);
        engine.collect_garbage();
        let after = engine.buffer_base(kept).unwrap();
        assert!(matches!((before, after), (DataAddress::Inline(a), DataAddress::Inline(b)) if b < a));
        assert_eq!(engine.read_element(&ta, 3), Some(Element::Number(42.0)));
    }

    proptest! {
        #[test]
        fn binds_iff_range_fits(
            byte_length in 0usize..96,
            offset in 0usize..96,
            length in 0usize..48,
            kind_index in 0usize..ElementKind::COUNT,
        ) {
            let mut engine = Engine::new();
            let kind = ElementKind::ALL[kind_index];
            let buffer = engine.allocate_buffer(byte_length);
            let result = engine.bind_view(kind, buffer, offset, length, None);
            let fits = offset + length * kind.element_size() <= byte_length;
            prop_assert_eq!(result.is_ok(), fits);
            if let Err(err) = result {
                let (name, _) = engine.error_details(&err).unwrap();
                prop_assert_eq!(name, "RangeError");
            }
        }
    }
}
