//! Element-size-aware bulk copies into views.
//!
//! Every entry point validates length and content compatibility before the
//! first byte is written. Raw byte moves are used only between
//! byte-compatible kinds; everything else goes element by element through
//! the target kind's conversion.

use super::super::*;
use crate::types::bigint_ops;

impl Engine {
    /// Converts a value for storage in a `kind` slot. Runs user code.
    pub(crate) fn to_element(&mut self, kind: ElementKind, value: &JsValue) -> JsResult<Element> {
        match kind {
            ElementKind::BigInt64 => {
                let v = self.to_bigint(value)?;
                Ok(Element::BigInt(bigint_ops::to_big_int64(&v) as i128))
            }
            ElementKind::BigUint64 => {
                let v = self.to_bigint(value)?;
                Ok(Element::BigInt(bigint_ops::to_big_uint64(&v) as i128))
            }
            _ => Ok(Element::Number(self.to_number(value)?)),
        }
    }

    /// Converts `value`, then stores it at `index` if the view is still
    /// attached. Detachment caused by the conversion is an error.
    pub(crate) fn store_element_checked(
        &mut self,
        ta: &TypedArrayInfo,
        index: usize,
        value: &JsValue,
        method: &str,
    ) -> JsResult<()> {
        let element = self.to_element(ta.kind, value)?;
        if self.is_view_detached(ta) {
            return self.fail(ViewError::detached(method));
        }
        self.write_element(ta, index, element)
    }

    fn check_fits(&mut self, source_len: usize, offset: usize, target_len: usize) -> JsResult<()> {
        if source_len.checked_add(offset).is_none_or(|end| end > target_len) {
            return self.fail(ViewError::SourceTooLarge);
        }
        Ok(())
    }

    /// `target[offset..] = source`, view to view.
    pub(crate) fn copy_view_to_view(
        &mut self,
        target: &TypedArrayInfo,
        source: &TypedArrayInfo,
        offset: usize,
        method: &str,
    ) -> JsResult<()> {
        if self.is_view_detached(source) {
            return self.fail(ViewError::detached(method));
        }
        let target_len = self.view_length(target);
        let source_len = self.view_length(source);
        self.check_fits(source_len, offset, target_len)?;
        if source.kind.content_type() != target.kind.content_type() {
            return self.fail(ViewError::MixedContent);
        }
        let (Some(src_base), Some(dst_base)) = (self.view_base(source), self.view_base(target)) else {
            return self.fail(ViewError::detached(method));
        };
        let dst_base = Self::element_address(&dst_base, offset, target.kind);

        if source.kind.is_byte_compatible_with(target.kind) {
            tracing::trace!(
                from = source.kind.name(),
                to = target.kind.name(),
                bytes = source.byte_length(),
                "raw view copy"
            );
            self.move_bytes(&src_base, &dst_base, source_len * source.kind.element_size());
            return Ok(());
        }

        // The whole source range is read before the first store, so a
        // target sharing the buffer cannot clobber unread elements.
        let src_size = source.kind.element_size();
        let dst_size = target.kind.element_size();
        let mut snapshot = vec![0u8; source_len * src_size];
        self.read_bytes(&src_base, &mut snapshot);
        tracing::trace!(
            from = source.kind.name(),
            to = target.kind.name(),
            elements = source_len,
            "converting view copy"
        );
        let mut raw = [0u8; 8];
        for (i, chunk) in snapshot.chunks_exact(src_size).enumerate() {
            if let Err(e) = target.kind.encode(source.kind.decode(chunk), &mut raw[..dst_size]) {
                return self.fail(e);
            }
            self.write_bytes(&Self::element_address(&dst_base, i, target.kind), &raw[..dst_size]);
        }
        Ok(())
    }

    /// Numbers straight out of a fast array, without touching user code.
    /// Returns `false` when `source` does not qualify.
    fn copy_fast_array(&mut self, target: &TypedArrayInfo, source: &JsValue, offset: usize) -> JsResult<bool> {
        if target.kind.is_big_integer_kind() {
            return Ok(false);
        }
        let Some(elems) = self.array_elements(source) else {
            return Ok(false);
        };
        let mut numbers = Vec::with_capacity(elems.len());
        for v in &elems {
            match v {
                JsValue::Number(n) => numbers.push(*n),
                _ => return Ok(false),
            }
        }
        let target_len = self.view_length(target);
        self.check_fits(numbers.len(), offset, target_len)?;
        for (i, n) in numbers.into_iter().enumerate() {
            self.write_element(target, offset + i, Element::Number(n))?;
        }
        tracing::trace!(elements = elems.len(), "fast array copy");
        Ok(true)
    }

    /// `target[offset..] = source` for any array-like source.
    pub(crate) fn copy_array_like_to_view(
        &mut self,
        target: &TypedArrayInfo,
        source: &JsValue,
        offset: usize,
        method: &str,
    ) -> JsResult<()> {
        if self.copy_fast_array(target, source, offset)? {
            return Ok(());
        }
        let src = self.to_object(source)?;
        let len_val = self.get(&src, "length")?;
        let source_len = self.to_length(&len_val)?;
        if self.is_view_detached(target) {
            return self.fail(ViewError::detached(method));
        }
        let target_len = self.view_length(target);
        self.check_fits(source_len, offset, target_len)?;
        for i in 0..source_len {
            let value = self.get(&src, &i.to_string())?;
            self.store_element_checked(target, offset + i, &value, method)?;
        }
        Ok(())
    }

    /// Copies `count` elements of `source` starting at `start` into the
    /// front of `target`.
    pub(crate) fn copy_slice(
        &mut self,
        source: &TypedArrayInfo,
        target: &TypedArrayInfo,
        start: usize,
        count: usize,
        method: &str,
    ) -> JsResult<()> {
        let count = count
            .min(self.view_length(source).saturating_sub(start))
            .min(self.view_length(target));
        if source.kind == target.kind && source.buffer != target.buffer {
            let (Some(src_base), Some(dst_base)) = (self.view_base(source), self.view_base(target)) else {
                return self.fail(ViewError::detached(method));
            };
            let size = source.kind.element_size();
            let src = Self::element_address(&src_base, start, source.kind);
            self.move_bytes(&src, &dst_base, count * size);
            return Ok(());
        }
        if source.kind.content_type() != target.kind.content_type() {
            return self.fail(ViewError::MixedContent);
        }
        for n in 0..count {
            let Some(element) = self.read_element(source, start + n) else {
                break;
            };
            self.write_element(target, n, element)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn view(engine: &mut Engine, kind: ElementKind, len: usize) -> TypedArrayInfo {
        let buffer = engine.allocate_buffer(len * kind.element_size());
        let obj = engine.bind_view(kind, buffer, 0, len, None).unwrap();
        engine.typed_array_info_of(&JsValue::Object(obj)).unwrap()
    }

    fn fill(engine: &mut Engine, ta: &TypedArrayInfo, values: &[f64]) {
        for (i, v) in values.iter().enumerate() {
            engine.write_element(ta, i, Element::Number(*v)).unwrap();
        }
    }

    fn numbers(engine: &Engine, ta: &TypedArrayInfo) -> Vec<f64> {
        (0..engine.view_length(ta))
            .map(|i| match engine.read_element(ta, i) {
                Some(Element::Number(n)) => n,
                other => panic!("unexpected element {other:?}"),
            })
            .collect()
    }

    #[test]
    fn converting_copy_between_kinds() {
        let mut engine = Engine::new();
        let source = view(&mut engine, ElementKind::Float64, 3);
        fill(&mut engine, &source, &[1.5, -1.0, 300.0]);
        let target = view(&mut engine, ElementKind::Uint8Clamped, 3);
        engine.copy_view_to_view(&target, &source, 0, "set").unwrap();
        assert_eq!(numbers(&engine, &target), vec![2.0, 0.0, 255.0]);
        let wrapped = view(&mut engine, ElementKind::Uint8, 3);
        engine.copy_view_to_view(&wrapped, &source, 0, "set").unwrap();
        assert_eq!(numbers(&engine, &wrapped), vec![1.0, 255.0, 44.0]);
    }

    #[test]
    fn uint8_kinds_copy_raw() {
        let mut engine = Engine::new();
        let source = view(&mut engine, ElementKind::Uint8, 2);
        fill(&mut engine, &source, &[7.0, 250.0]);
        let target = view(&mut engine, ElementKind::Uint8Clamped, 4);
        engine.copy_view_to_view(&target, &source, 2, "set").unwrap();
        assert_eq!(numbers(&engine, &target), vec![0.0, 0.0, 7.0, 250.0]);
    }

    #[test]
    fn too_large_source_writes_nothing() {
        let mut engine = Engine::new();
        let source = view(&mut engine, ElementKind::Int8, 3);
        fill(&mut engine, &source, &[1.0, 2.0, 3.0]);
        let target = view(&mut engine, ElementKind::Int8, 4);
        let err = engine.copy_view_to_view(&target, &source, 2, "set").unwrap_err();
        assert_eq!(engine.error_details(&err).unwrap().0, "RangeError");
        assert_eq!(numbers(&engine, &target), vec![0.0; 4]);
    }

    #[test]
    fn mixed_content_is_rejected_for_every_pairing() {
        let mut engine = Engine::new();
        for big in [ElementKind::BigInt64, ElementKind::BigUint64] {
            for kind in ElementKind::ALL.into_iter().filter(|k| !k.is_big_integer_kind()) {
                let numeric = view(&mut engine, kind, 2);
                fill(&mut engine, &numeric, &[1.0, 2.0]);
                let bigs = view(&mut engine, big, 2);
                let err = engine.copy_view_to_view(&bigs, &numeric, 0, "set").unwrap_err();
                assert_eq!(engine.error_details(&err).unwrap().0, "TypeError");
                assert_eq!(engine.read_element(&bigs, 0), Some(Element::BigInt(0)));
                let err = engine.copy_view_to_view(&numeric, &bigs, 0, "set").unwrap_err();
                assert_eq!(engine.error_details(&err).unwrap().0, "TypeError");
                assert_eq!(numbers(&engine, &numeric), vec![1.0, 2.0]);
            }
        }
    }

    #[test]
    fn big_integer_kinds_convert_between_each_other() {
        let mut engine = Engine::new();
        let signed = view(&mut engine, ElementKind::BigInt64, 1);
        engine.write_element(&signed, 0, Element::BigInt(-1)).unwrap();
        let unsigned = view(&mut engine, ElementKind::BigUint64, 1);
        engine.copy_view_to_view(&unsigned, &signed, 0, "set").unwrap();
        assert_eq!(engine.read_element(&unsigned, 0), Some(Element::BigInt(u64::MAX as i128)));
    }

    #[test]
    fn fast_array_copy() {
        let mut engine = Engine::new();
        let target = view(&mut engine, ElementKind::Int16, 4);
        let arr = engine.create_array(vec![JsValue::Number(1.0), JsValue::Number(-2.0)]);
        engine.copy_array_like_to_view(&target, &arr, 1, "set").unwrap();
        assert_eq!(numbers(&engine, &target), vec![0.0, 1.0, -2.0, 0.0]);
    }

    #[test]
    fn slow_path_stops_when_a_getter_detaches() {
        let mut engine = Engine::new();
        let target = view(&mut engine, ElementKind::Uint8, 3);
        let buffer = JsValue::Object(target.buffer);
        let source = engine.create_plain_object();
        engine.define_property(&source, "length", JsValue::Number(3.0)).unwrap();
        engine.define_property(&source, "0", JsValue::Number(9.0)).unwrap();
        let detacher = engine.create_native_function("get 1", 0, move |interp, _, _| {
            interp.detach_buffer(buffer.as_object().unwrap());
            Completion::Normal(JsValue::Number(5.0))
        });
        engine.define_accessor(&source, "1", Some(detacher), None).unwrap();
        let err = engine
            .copy_array_like_to_view(&target, &source, 0, "%TypedArray%.prototype.set")
            .unwrap_err();
        assert_eq!(
            engine.error_details(&err),
            Some((
                "TypeError".to_string(),
                "Cannot perform %TypedArray%.prototype.set on a detached ArrayBuffer".to_string()
            ))
        );
    }

    #[test]
    fn slice_copy_between_buffers_and_kinds() {
        let mut engine = Engine::new();
        let source = view(&mut engine, ElementKind::Float32, 4);
        fill(&mut engine, &source, &[0.5, 1.5, 2.5, 3.5]);
        let same = view(&mut engine, ElementKind::Float32, 2);
        engine.copy_slice(&source, &same, 1, 2, "slice").unwrap();
        assert_eq!(numbers(&engine, &same), vec![1.5, 2.5]);
        let other = view(&mut engine, ElementKind::Int32, 2);
        engine.copy_slice(&source, &other, 2, 2, "slice").unwrap();
        assert_eq!(numbers(&engine, &other), vec![2.0, 3.0]);
        let bigs = view(&mut engine, ElementKind::BigInt64, 2);
        let err = engine.copy_slice(&source, &bigs, 0, 2, "slice").unwrap_err();
        assert_eq!(engine.error_details(&err).unwrap().0, "TypeError");
    }

    proptest! {
        #[test]
        fn overlapping_set_matches_a_copy_first(
            values in proptest::collection::vec(-128i32..128, 1..24),
            src_start in 0usize..24,
            src_len in 0usize..24,
            dst_offset in 0usize..24,
            converting in any::<bool>(),
        ) {
            let mut engine = Engine::new();
            let len = values.len();
            let buffer = engine.allocate_buffer(len * 2);
            let whole = engine.bind_view(ElementKind::Int16, buffer, 0, len, None).unwrap();
            let whole = engine.typed_array_info_of(&JsValue::Object(whole)).unwrap();
            let as_f64: Vec<f64> = values.iter().map(|v| *v as f64).collect();
            fill(&mut engine, &whole, &as_f64);

            let src_start = src_start % len;
            let src_len = src_len % (len - src_start + 1);
            // Int8 over the same bytes forces the converting path.
            let (src_kind, src_offset) = if converting {
                (ElementKind::Int8, src_start)
            } else {
                (ElementKind::Int16, src_start * 2)
            };
            let source = engine.bind_view(src_kind, buffer, src_offset, src_len, None).unwrap();
            let source = engine.typed_array_info_of(&JsValue::Object(source)).unwrap();

            let expected_source: Vec<f64> = (0..src_len)
                .map(|i| match engine.read_element(&source, i) {
                    Some(Element::Number(n)) => n,
                    _ => 0.0,
                })
                .collect();
            let mut expected = numbers(&engine, &whole);
            let result = engine.copy_view_to_view(&whole, &source, dst_offset, "set");
            if dst_offset + src_len <= len {
                prop_assert!(result.is_ok());
                for (i, v) in expected_source.iter().enumerate() {
                    expected[dst_offset + i] = *v;
                }
            } else {
                prop_assert!(result.is_err());
            }
            prop_assert_eq!(numbers(&engine, &whole), expected);
        }
    }
}
