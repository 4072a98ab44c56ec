use super::super::*;
use super::species::SpeciesArgs;
use crate::types::number_ops;

fn arg(args: &[JsValue], i: usize) -> JsValue {
    args.get(i).cloned().unwrap_or(JsValue::Undefined)
}

/// Resolves a possibly negative relative index against `len`.
fn relative_index(relative: f64, len: usize) -> usize {
    if relative < 0.0 {
        (len as f64 + relative).max(0.0) as usize
    } else {
        relative.min(len as f64) as usize
    }
}

fn invalid_length(n: f64) -> ViewError {
    ViewError::InvalidLength(number_ops::to_string(n))
}

impl Engine {
    pub(crate) fn setup_typedarray_builtins(&mut self) {
        self.setup_arraybuffer();
        self.setup_typed_array_base();
        for kind in ElementKind::ALL {
            self.setup_typed_array_kind(kind);
        }
    }

    fn insert_getter(
        &mut self,
        target: &ObjectRef,
        key: &str,
        name: &str,
        f: impl Fn(&mut Engine, &JsValue, &[JsValue]) -> Completion + 'static,
    ) {
        let getter = self.create_function(JsFunction::native(name.to_string(), 0, f));
        target
            .borrow_mut()
            .insert_property(key.to_string(), PropertyDescriptor::accessor(Some(getter), None));
    }

    fn setup_typed_array_base(&mut self) {
        let ctor = self.create_function(JsFunction::constructor(
            "TypedArray".to_string(),
            0,
            |interp, _this, _args| Completion::Throw(interp.throw_view_error(ViewError::AbstractConstructor)),
        ));
        let (Some(ctor_obj), Ok(JsValue::Object(p))) = (
            ctor.as_object().and_then(|c| self.get_object(c.id)),
            self.get(&ctor, "prototype"),
        ) else {
            return;
        };
        let Some(proto) = self.get_object(p.id) else {
            return;
        };
        proto.borrow_mut().class_name = "TypedArray".to_string();
        self.typed_array_prototype = Some(proto.clone());
        self.typed_array_constructor = ctor.as_object();

        // Statics.
        let of_fn = self.create_function(JsFunction::native("of".to_string(), 0, |interp, this, args| {
            interp.typed_array_of(this, args).into()
        }));
        let from_fn = self.create_function(JsFunction::native(
            "from".to_string(),
            1,
            |interp, this, args| {
                interp
                    .typed_array_from(this, &arg(args, 0), &arg(args, 1), &arg(args, 2))
                    .into()
            },
        ));
        {
            let mut c = ctor_obj.borrow_mut();
            c.insert_builtin("of".to_string(), of_fn);
            c.insert_builtin("from".to_string(), from_fn);
        }
        self.insert_getter(&ctor_obj, SYMBOL_SPECIES, "get [Symbol.species]", |_, this, _| {
            Completion::Normal(this.clone())
        });

        // Accessors.
        macro_rules! view_getter {
            ($key:literal, |$interp:ident, $ta:ident| $body:expr) => {
                self.insert_getter(&proto, $key, concat!("get ", $key), |$interp, this_val, _args| {
                    $interp
                        .require_typed_array(this_val, concat!("get %TypedArray%.prototype.", $key))
                        .map(|$ta| JsValue::Number($body as f64))
                        .into()
                });
            };
        }
        view_getter!("length", |interp, ta| interp.view_length(&ta));
        view_getter!("byteLength", |interp, ta| interp.view_length(&ta) * ta.kind.element_size());
        view_getter!("byteOffset", |interp, ta| if interp.is_view_detached(&ta) {
            0
        } else {
            ta.byte_offset
        });
        self.insert_getter(&proto, "buffer", "get buffer", |interp, this_val, _args| {
            interp
                .require_typed_array(this_val, "get %TypedArray%.prototype.buffer")
                .map(|ta| JsValue::Object(interp.get_buffer(&ta)))
                .into()
        });
        self.insert_getter(
            &proto,
            SYMBOL_TO_STRING_TAG,
            "get [Symbol.toStringTag]",
            |interp, this_val, _args| {
                let tag = interp
                    .typed_array_info_of(this_val)
                    .map(|ta| JsValue::string(ta.kind.name()))
                    .unwrap_or(JsValue::Undefined);
                Completion::Normal(tag)
            },
        );

        // Methods.
        let set_fn = self.create_function(JsFunction::native("set".to_string(), 1, |interp, this, args| {
            interp
                .typed_array_set(this, &arg(args, 0), &arg(args, 1))
                .map(|()| JsValue::Undefined)
                .into()
        }));
        let slice_fn = self.create_function(JsFunction::native("slice".to_string(), 2, |interp, this, args| {
            interp.typed_array_slice(this, &arg(args, 0), &arg(args, 1)).into()
        }));
        let subarray_fn = self.create_function(JsFunction::native(
            "subarray".to_string(),
            2,
            |interp, this, args| interp.typed_array_subarray(this, &arg(args, 0), &arg(args, 1)).into(),
        ));
        let filter_fn = self.create_function(JsFunction::native(
            "filter".to_string(),
            1,
            |interp, this, args| interp.typed_array_filter(this, &arg(args, 0), &arg(args, 1)).into(),
        ));
        let join_fn = self.create_function(JsFunction::native("join".to_string(), 1, |interp, this, args| {
            if let Err(e) = interp.validate_typed_array(this, "%TypedArray%.prototype.join") {
                return Completion::Throw(e);
            }
            let sep = match args.first() {
                None | Some(JsValue::Undefined) => ",".to_string(),
                Some(v) => match interp.to_string_value(v) {
                    Ok(s) => s,
                    Err(e) => return Completion::Throw(e),
                },
            };
            interp.join_elements(this, &sep).map(|s| JsValue::string(&s)).into()
        }));
        let values_fn = self.view_iterator_function("values", IteratorKind::Value);
        let keys_fn = self.view_iterator_function("keys", IteratorKind::Key);
        let entries_fn = self.view_iterator_function("entries", IteratorKind::KeyValue);
        self.typed_array_values_fn = values_fn.as_object();

        // toString is shared with Array.prototype.
        let array_to_string = self
            .array_prototype
            .as_ref()
            .and_then(|p| p.borrow().get_property_value("toString"));

        let mut p = proto.borrow_mut();
        p.insert_builtin("set".to_string(), set_fn);
        p.insert_builtin("slice".to_string(), slice_fn);
        p.insert_builtin("subarray".to_string(), subarray_fn);
        p.insert_builtin("filter".to_string(), filter_fn);
        p.insert_builtin("join".to_string(), join_fn);
        if let Some(to_string) = array_to_string {
            p.insert_builtin("toString".to_string(), to_string);
        }
        p.insert_builtin("values".to_string(), values_fn.clone());
        p.insert_builtin("keys".to_string(), keys_fn);
        p.insert_builtin("entries".to_string(), entries_fn);
        p.insert_builtin(SYMBOL_ITERATOR.to_string(), values_fn);
    }

    fn view_iterator_function(&mut self, name: &'static str, kind: IteratorKind) -> JsValue {
        self.create_function(JsFunction::native(name.to_string(), 0, move |interp, this, _args| {
            let method = format!("%TypedArray%.prototype.{name}");
            match interp.validate_typed_array(this, &method) {
                Ok(_) => match this.as_object() {
                    Some(target) => Completion::Normal(interp.create_array_iterator(target, kind)),
                    None => Completion::Normal(JsValue::Undefined),
                },
                Err(e) => Completion::Throw(e),
            }
        }))
    }

    fn setup_typed_array_kind(&mut self, kind: ElementKind) {
        let ctor = self.create_function(JsFunction::constructor(
            kind.name().to_string(),
            3,
            move |interp, _this, args| interp.construct_typed_array(kind, args).into(),
        ));
        let (Some(ctor_obj), Ok(JsValue::Object(p))) = (
            ctor.as_object().and_then(|c| self.get_object(c.id)),
            self.get(&ctor, "prototype"),
        ) else {
            return;
        };
        let Some(proto) = self.get_object(p.id) else {
            return;
        };
        let bytes_per_element = || {
            PropertyDescriptor::data(JsValue::Number(kind.element_size() as f64), false, false, false)
        };
        let base_ctor = self.typed_array_constructor.and_then(|c| self.get_object(c.id));
        {
            let mut c = ctor_obj.borrow_mut();
            c.prototype = base_ctor;
            c.insert_property("BYTES_PER_ELEMENT".to_string(), bytes_per_element());
        }
        {
            let mut p = proto.borrow_mut();
            p.class_name = kind.name().to_string();
            p.prototype = self.typed_array_prototype.clone();
            p.insert_property("BYTES_PER_ELEMENT".to_string(), bytes_per_element());
        }
        self.typed_array_prototypes[kind.index()] = Some(proto);
        self.typed_array_constructors[kind.index()] = ctor.as_object();
        self.set_global(kind.name(), ctor);
    }

    /// The `[[Construct]]` behavior shared by every concrete constructor.
    fn construct_typed_array(&mut self, kind: ElementKind, args: &[JsValue]) -> JsResult<JsValue> {
        let Some(new_target) = self.new_target() else {
            return self.fail(ViewError::ConstructorRequiresNew(kind.name().to_string()));
        };
        let fallback = self.typed_array_prototypes[kind.index()].clone();
        let first = arg(args, 0);
        let Some(source) = first.as_object() else {
            let length = self.to_index(&first, invalid_length)?;
            let proto = self.get_prototype_from_constructor(&new_target, fallback)?;
            return self.create_typed_array_object(kind, length, proto);
        };
        let proto = self.get_prototype_from_constructor(&new_target, fallback)?;
        if self.buffer_data(source).is_some() {
            return self.construct_on_buffer(kind, source, &arg(args, 1), &arg(args, 2), proto);
        }
        if let Some(src) = self.typed_array_info_of(&first) {
            return self.construct_from_view(kind, &src, proto);
        }
        if let Some(method) = self.get_method(&first, SYMBOL_ITERATOR)? {
            let values = self.iterable_to_list(&first, &method)?;
            let result = self.create_typed_array_object(kind, values.len(), proto)?;
            let ta = self.require_typed_array(&result, "Construct")?;
            for (i, value) in values.iter().enumerate() {
                self.store_element_checked(&ta, i, value, "Construct")?;
            }
            return Ok(result);
        }
        let len_val = self.get(&first, "length")?;
        let length = self.to_length(&len_val)?;
        let result = self.create_typed_array_object(kind, length, proto)?;
        let ta = self.require_typed_array(&result, "Construct")?;
        for i in 0..length {
            let value = self.get(&first, &i.to_string())?;
            self.store_element_checked(&ta, i, &value, "Construct")?;
        }
        Ok(result)
    }

    fn construct_on_buffer(
        &mut self,
        kind: ElementKind,
        buffer: JsObject,
        byte_offset: &JsValue,
        length: &JsValue,
        proto: Option<ObjectRef>,
    ) -> JsResult<JsValue> {
        let size = kind.element_size();
        let offset = self.to_index(byte_offset, |_| ViewError::OffsetOutOfBounds)?;
        if offset % size != 0 {
            return self.fail(ViewError::UnalignedOffset {
                name: kind.name(),
                size,
            });
        }
        let new_length = if length.is_undefined() {
            None
        } else {
            Some(self.to_index(length, invalid_length)?)
        };
        if self.is_buffer_detached(buffer) {
            return self.fail(ViewError::detached("Construct"));
        }
        let buffer_length = self.buffer_data(buffer).map(|d| d.byte_length).unwrap_or(0);
        let length = match new_length {
            Some(n) => n,
            None => {
                if buffer_length % size != 0 {
                    return self.fail(ViewError::UnalignedLength {
                        name: kind.name(),
                        size,
                    });
                }
                if offset > buffer_length {
                    return self.fail(ViewError::OutOfBuffer {
                        byte_offset: offset,
                        byte_length: 0,
                    });
                }
                (buffer_length - offset) / size
            }
        };
        self.bind_view(kind, buffer, offset, length, proto).map(JsValue::Object)
    }

    fn construct_from_view(
        &mut self,
        kind: ElementKind,
        src: &TypedArrayInfo,
        proto: Option<ObjectRef>,
    ) -> JsResult<JsValue> {
        if self.is_view_detached(src) {
            return self.fail(ViewError::detached("Construct"));
        }
        if src.kind.content_type() != kind.content_type() {
            return self.fail(ViewError::MixedContent);
        }
        let length = self.view_length(src);
        let result = self.create_typed_array_object(kind, length, proto)?;
        let ta = self.require_typed_array(&result, "Construct")?;
        self.copy_view_to_view(&ta, src, 0, "Construct")?;
        Ok(result)
    }

    /// A zero-filled view of `length` elements over a fresh buffer.
    pub(crate) fn create_typed_array_object(
        &mut self,
        kind: ElementKind,
        length: usize,
        proto: Option<ObjectRef>,
    ) -> JsResult<JsValue> {
        let byte_length = length as f64 * kind.element_size() as f64;
        if !self.config.byte_length_is_valid(byte_length) {
            return self.fail(invalid_length(length as f64));
        }
        let buffer = self.allocate_buffer(length * kind.element_size());
        self.bind_view(kind, buffer, 0, length, proto).map(JsValue::Object)
    }

    fn relative_range(&mut self, start: &JsValue, end: &JsValue, len: usize) -> JsResult<(usize, usize)> {
        let relative_start = self.to_integer_or_infinity(start)?;
        let first = relative_index(relative_start, len);
        let last = if end.is_undefined() {
            len
        } else {
            let relative_end = self.to_integer_or_infinity(end)?;
            relative_index(relative_end, len)
        };
        Ok((first, last))
    }

    // ---- public operations ----

    /// `new KIND(length)`.
    pub fn create_typed_array(&mut self, kind: ElementKind, length: usize) -> JsResult<JsValue> {
        self.create_typed_array_object(kind, length, None)
    }

    /// `new KIND(buffer, byte_offset, length)`.
    pub fn create_typed_array_on_buffer(
        &mut self,
        kind: ElementKind,
        buffer: &JsValue,
        byte_offset: usize,
        length: Option<usize>,
    ) -> JsResult<JsValue> {
        let ctor = self.default_constructor(kind);
        let length = length.map_or(JsValue::Undefined, |n| JsValue::Number(n as f64));
        self.construct(&ctor, &[buffer.clone(), JsValue::Number(byte_offset as f64), length], None)
    }

    /// The intrinsic constructor for `kind`, e.g. `%Int8Array%`.
    pub fn typed_array_constructor(&self, kind: ElementKind) -> JsValue {
        self.default_constructor(kind)
    }

    pub fn typed_array_kind(&self, view: &JsValue) -> Option<ElementKind> {
        self.typed_array_info_of(view).map(|ta| ta.kind)
    }

    pub fn typed_array_length(&self, view: &JsValue) -> usize {
        self.typed_array_info_of(view)
            .map(|ta| self.view_length(&ta))
            .unwrap_or(0)
    }

    /// The view's buffer, moved to external storage first.
    pub fn typed_array_buffer(&mut self, view: &JsValue) -> JsResult<JsValue> {
        let ta = self.require_typed_array(view, "get %TypedArray%.prototype.buffer")?;
        Ok(JsValue::Object(self.get_buffer(&ta)))
    }

    /// Current elements in index order; empty for a detached or non-view
    /// value.
    pub fn typed_array_to_vec(&self, view: &JsValue) -> Vec<Element> {
        let Some(ta) = self.typed_array_info_of(view) else {
            return Vec::new();
        };
        (0..self.view_length(&ta))
            .filter_map(|i| self.read_element(&ta, i))
            .collect()
    }

    /// `%TypedArray%.prototype.set(source, offset)`.
    pub fn typed_array_set(&mut self, target: &JsValue, source: &JsValue, offset: &JsValue) -> JsResult<()> {
        const METHOD: &str = "%TypedArray%.prototype.set";
        let ta = self.require_typed_array(target, METHOD)?;
        let offset = self.to_integer_or_infinity(offset)?;
        if offset < 0.0 {
            return self.fail(ViewError::OffsetOutOfBounds);
        }
        if self.is_view_detached(&ta) {
            return self.fail(ViewError::detached(METHOD));
        }
        let offset = if offset.is_finite() { offset as usize } else { usize::MAX };
        match self.typed_array_info_of(source) {
            Some(src) => self.copy_view_to_view(&ta, &src, offset, METHOD),
            None => self.copy_array_like_to_view(&ta, source, offset, METHOD),
        }
    }

    /// `%TypedArray%.prototype.slice(start, end)`.
    pub fn typed_array_slice(&mut self, view: &JsValue, start: &JsValue, end: &JsValue) -> JsResult<JsValue> {
        const METHOD: &str = "%TypedArray%.prototype.slice";
        let ta = self.validate_typed_array(view, METHOD)?;
        let len = self.view_length(&ta);
        let (first, last) = self.relative_range(start, end, len)?;
        let count = last.saturating_sub(first);
        let (result, target) = self.species_create_by_length(view, ta.kind, count, METHOD)?;
        if count == 0 {
            return Ok(result);
        }
        if self.is_view_detached(&ta) {
            return self.fail(ViewError::detached(METHOD));
        }
        self.copy_slice(&ta, &target, first, count, METHOD)?;
        Ok(result)
    }

    /// `%TypedArray%.prototype.subarray(start, end)`. Works on detached
    /// views, yielding an empty view over the same buffer.
    pub fn typed_array_subarray(&mut self, view: &JsValue, start: &JsValue, end: &JsValue) -> JsResult<JsValue> {
        const METHOD: &str = "%TypedArray%.prototype.subarray";
        let ta = self.require_typed_array(view, METHOD)?;
        let len = self.view_length(&ta);
        let (first, last) = self.relative_range(start, end, len)?;
        let length = last.saturating_sub(first);
        let buffer = self.get_buffer(&ta);
        let args = SpeciesArgs::Buffer {
            buffer,
            byte_offset: ta.byte_offset + first * ta.kind.element_size(),
            length,
        };
        let (result, _) = self.typed_array_species_create(view, ta.kind, args, METHOD)?;
        Ok(result)
    }

    /// `%TypedArray%.of(...items)` with `ctor` as the receiver.
    pub fn typed_array_of(&mut self, ctor: &JsValue, items: &[JsValue]) -> JsResult<JsValue> {
        const METHOD: &str = "%TypedArray%.of";
        let (result, ta) = self.typed_array_create_by_length(ctor, items.len(), METHOD)?;
        for (i, item) in items.iter().enumerate() {
            self.store_element_checked(&ta, i, item, METHOD)?;
        }
        Ok(result)
    }

    fn is_builtin_values(&self, method: &JsValue) -> bool {
        method
            .as_object()
            .is_some_and(|m| self.typed_array_values_fn == Some(m))
    }

    /// `%TypedArray%.from(source, map_fn, this_arg)` with `ctor` as the
    /// receiver.
    pub fn typed_array_from(
        &mut self,
        ctor: &JsValue,
        source: &JsValue,
        map_fn: &JsValue,
        this_arg: &JsValue,
    ) -> JsResult<JsValue> {
        const METHOD: &str = "%TypedArray%.from";
        if !self.is_constructor(ctor) {
            let name = self.describe(ctor);
            return self.fail(ViewError::NotConstructor(name));
        }
        let mapping = !map_fn.is_undefined();
        if mapping && !self.is_callable(map_fn) {
            let name = self.describe(map_fn);
            return self.fail(ViewError::NotCallable(name));
        }
        let using_iterator = self.get_method(source, SYMBOL_ITERATOR)?;

        if let Some(src) = self.typed_array_info_of(source)
            && using_iterator.as_ref().is_some_and(|m| self.is_builtin_values(m))
            && self.protectors.array_iterator_intact()
        {
            if self.is_view_detached(&src) {
                return self.fail(ViewError::detached(METHOD));
            }
            let len = self.view_length(&src);
            let (result, target) = self.typed_array_create_by_length(ctor, len, METHOD)?;
            if !mapping {
                self.copy_view_to_view(&target, &src, 0, METHOD)?;
                return Ok(result);
            }
            for i in 0..len {
                // A source detached by an earlier callback reads as undefined.
                let element = self
                    .read_element(&src, i)
                    .map_or(JsValue::Undefined, Element::to_value);
                let mapped = self.call(map_fn, this_arg, &[element, JsValue::Number(i as f64)])?;
                self.store_element_checked(&target, i, &mapped, METHOD)?;
            }
            return Ok(result);
        }

        if let Some(method) = using_iterator {
            let values = self.iterable_to_list(source, &method)?;
            let (result, target) = self.typed_array_create_by_length(ctor, values.len(), METHOD)?;
            for (i, value) in values.into_iter().enumerate() {
                let value = if mapping {
                    self.call(map_fn, this_arg, &[value, JsValue::Number(i as f64)])?
                } else {
                    value
                };
                self.store_element_checked(&target, i, &value, METHOD)?;
            }
            return Ok(result);
        }

        let array_like = self.to_object(source)?;
        let len_val = self.get(&array_like, "length")?;
        let len = self.to_length(&len_val)?;
        let (result, target) = self.typed_array_create_by_length(ctor, len, METHOD)?;
        for i in 0..len {
            let value = self.get(&array_like, &i.to_string())?;
            let value = if mapping {
                self.call(map_fn, this_arg, &[value, JsValue::Number(i as f64)])?
            } else {
                value
            };
            self.store_element_checked(&target, i, &value, METHOD)?;
        }
        Ok(result)
    }

    /// `%TypedArray%.prototype.filter(callback, this_arg)`.
    pub fn typed_array_filter(&mut self, view: &JsValue, callback: &JsValue, this_arg: &JsValue) -> JsResult<JsValue> {
        const METHOD: &str = "%TypedArray%.prototype.filter";
        let ta = self.validate_typed_array(view, METHOD)?;
        if !self.is_callable(callback) {
            let name = self.describe(callback);
            return self.fail(ViewError::NotCallable(name));
        }
        let len = self.view_length(&ta);
        let mut kept = Vec::new();
        for i in 0..len {
            let Some(element) = self.read_element(&ta, i) else {
                return self.fail(ViewError::detached(METHOD));
            };
            let value = element.to_value();
            let selected = self.call(callback, this_arg, &[value.clone(), JsValue::Number(i as f64), view.clone()])?;
            if to_boolean(&selected) {
                kept.push(value);
            }
        }
        let (result, target) = self.species_create_by_length(view, ta.kind, kept.len(), METHOD)?;
        for (i, value) in kept.iter().enumerate() {
            self.store_element_checked(&target, i, value, METHOD)?;
        }
        Ok(result)
    }
}
