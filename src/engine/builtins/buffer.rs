use super::super::*;
use std::cell::RefCell;
use std::rc::Rc;

/// Where a buffer's bytes currently live.
#[derive(Clone, Debug)]
pub(crate) enum BackingStore {
    /// Block offset in the engine's inline heap; moves on compaction.
    Inline { block: usize },
    /// Separately allocated storage that never moves.
    External(Rc<RefCell<Vec<u8>>>),
    Detached,
}

#[derive(Clone, Debug)]
pub(crate) struct ArrayBufferData {
    pub(crate) byte_length: usize,
    pub(crate) is_shared: bool,
    pub(crate) is_detachable: bool,
    pub(crate) store: BackingStore,
}

impl ArrayBufferData {
    pub(crate) fn is_detached(&self) -> bool {
        matches!(self.store, BackingStore::Detached)
    }

    /// Byte length as public operations see it: zero once detached.
    pub(crate) fn observed_byte_length(&self) -> usize {
        if self.is_detached() { 0 } else { self.byte_length }
    }
}

impl Engine {
    fn new_buffer_object(&mut self, data: ArrayBufferData) -> JsObject {
        let obj = self.create_object();
        {
            let mut o = obj.borrow_mut();
            o.class_name = if data.is_shared {
                "SharedArrayBuffer".to_string()
            } else {
                "ArrayBuffer".to_string()
            };
            o.prototype = self.arraybuffer_prototype.clone();
            o.arraybuffer_data = Some(data);
        }
        Self::object_ref(&obj)
    }

    /// Reserves `byte_length` zeroed bytes in the inline heap, or `None` when
    /// the request is above the inline ceiling.
    pub(crate) fn allocate_inline(&mut self, byte_length: usize) -> Option<JsObject> {
        if byte_length > self.config.max_inline_byte_length {
            return None;
        }
        let buffer = self.new_buffer_object(ArrayBufferData {
            byte_length,
            is_shared: false,
            is_detachable: true,
            store: BackingStore::Detached,
        });
        let block = self.inline_heap.allocate(buffer.id, byte_length);
        if let Some(obj) = self.get_object(buffer.id)
            && let Some(ref mut data) = obj.borrow_mut().arraybuffer_data
        {
            data.store = BackingStore::Inline { block };
        }
        tracing::trace!(buffer = buffer.id, byte_length, block, "inline buffer allocated");
        Some(buffer)
    }

    /// Wraps an existing block. The buffer is external and detachable.
    pub(crate) fn attach_external(
        &mut self,
        byte_length: usize,
        block: Rc<RefCell<Vec<u8>>>,
    ) -> JsObject {
        {
            let mut bytes = block.borrow_mut();
            if bytes.len() < byte_length {
                bytes.resize(byte_length, 0);
            }
        }
        self.new_buffer_object(ArrayBufferData {
            byte_length,
            is_shared: false,
            is_detachable: true,
            store: BackingStore::External(block),
        })
    }

    /// Backing buffer for a freshly constructed view.
    pub(crate) fn allocate_buffer(&mut self, byte_length: usize) -> JsObject {
        match self.allocate_inline(byte_length) {
            Some(buffer) => buffer,
            None => self.attach_external(byte_length, Rc::new(RefCell::new(vec![0; byte_length]))),
        }
    }

    pub(crate) fn buffer_data(&self, buffer: JsObject) -> Option<ArrayBufferData> {
        let obj = self.get_object(buffer.id)?;
        let data = obj.borrow().arraybuffer_data.clone();
        data
    }

    pub(crate) fn is_buffer_detached(&self, buffer: JsObject) -> bool {
        self.buffer_data(buffer).is_none_or(|d| d.is_detached())
    }

    /// Drops the buffer's storage. Idempotent.
    pub(crate) fn detach_buffer(&mut self, buffer: JsObject) {
        if let Some(obj) = self.get_object(buffer.id)
            && let Some(ref mut data) = obj.borrow_mut().arraybuffer_data
            && !data.is_detached()
        {
            data.store = BackingStore::Detached;
            tracing::debug!(buffer = buffer.id, byte_length = data.byte_length, "buffer detached");
        }
    }

    /// Moves an inline buffer's bytes to external storage so the buffer can
    /// be handed out; other buffers are left alone.
    pub(crate) fn materialize_buffer(&mut self, buffer: JsObject) {
        let Some(data) = self.buffer_data(buffer) else {
            return;
        };
        let BackingStore::Inline { block } = data.store else {
            return;
        };
        let start = block + gc::INLINE_HEADER_SIZE;
        let Some(bytes) = self
            .inline_heap
            .bytes()
            .get(start..start + data.byte_length)
            .map(<[u8]>::to_vec)
        else {
            return;
        };
        if let Some(obj) = self.get_object(buffer.id)
            && let Some(ref mut d) = obj.borrow_mut().arraybuffer_data
        {
            d.store = BackingStore::External(Rc::new(RefCell::new(bytes)));
        }
        tracing::debug!(buffer = buffer.id, byte_length = data.byte_length, "buffer materialized");
    }

    fn checked_buffer_length(&mut self, byte_length: usize) -> JsResult<usize> {
        if byte_length > self.config.max_byte_length {
            return self.fail(ViewError::InvalidBufferLength);
        }
        Ok(byte_length)
    }

    /// A zeroed, externally backed `ArrayBuffer`.
    pub fn create_array_buffer(&mut self, byte_length: usize) -> JsResult<JsValue> {
        let byte_length = self.checked_buffer_length(byte_length)?;
        let buffer = self.attach_external(byte_length, Rc::new(RefCell::new(vec![0; byte_length])));
        Ok(JsValue::Object(buffer))
    }

    /// An `ArrayBuffer` over caller-provided bytes.
    pub fn create_external_array_buffer(&mut self, block: Rc<RefCell<Vec<u8>>>) -> JsResult<JsValue> {
        let byte_length = block.borrow().len();
        let byte_length = self.checked_buffer_length(byte_length)?;
        Ok(JsValue::Object(self.attach_external(byte_length, block)))
    }

    /// A shareable buffer. Shared buffers can never be detached.
    pub fn create_shared_array_buffer(&mut self, byte_length: usize) -> JsResult<JsValue> {
        let byte_length = self.checked_buffer_length(byte_length)?;
        let buffer = self.new_buffer_object(ArrayBufferData {
            byte_length,
            is_shared: true,
            is_detachable: false,
            store: BackingStore::External(Rc::new(RefCell::new(vec![0; byte_length]))),
        });
        Ok(JsValue::Object(buffer))
    }

    /// Host hook: detach `buffer`, as a transfer would.
    pub fn detach_array_buffer(&mut self, buffer: &JsValue) -> JsResult<()> {
        let Some(o) = buffer.as_object() else {
            return self.fail(ViewError::incompatible("DetachArrayBuffer"));
        };
        let Some(data) = self.buffer_data(o) else {
            return self.fail(ViewError::incompatible("DetachArrayBuffer"));
        };
        if data.is_shared || !data.is_detachable {
            return self.fail(ViewError::NotDetachable);
        }
        self.detach_buffer(o);
        Ok(())
    }

    pub fn is_detached(&self, buffer: &JsValue) -> bool {
        buffer.as_object().is_some_and(|o| self.is_buffer_detached(o))
    }

    fn this_buffer_data(&mut self, this: &JsValue, method: &str) -> JsResult<ArrayBufferData> {
        match this.as_object().and_then(|o| self.buffer_data(o)) {
            Some(data) => Ok(data),
            None => self.fail(ViewError::incompatible(method)),
        }
    }

    pub(crate) fn setup_arraybuffer(&mut self) {
        let ab_ctor = self.create_function(JsFunction::constructor(
            "ArrayBuffer".to_string(),
            1,
            |interp, _this, args| {
                let Some(new_target) = interp.new_target() else {
                    return Completion::Throw(
                        interp.throw_view_error(ViewError::ConstructorRequiresNew("ArrayBuffer".into())),
                    );
                };
                let len_arg = args.first().cloned().unwrap_or(JsValue::Undefined);
                let result = interp
                    .to_index(&len_arg, |_| ViewError::InvalidBufferLength)
                    .and_then(|len| interp.create_array_buffer(len))
                    .and_then(|buffer| {
                        let fallback = interp.arraybuffer_prototype.clone();
                        let proto = interp.get_prototype_from_constructor(&new_target, fallback)?;
                        if let Some(obj) = buffer.as_object().and_then(|o| interp.get_object(o.id)) {
                            obj.borrow_mut().prototype = proto;
                        }
                        Ok(buffer)
                    });
                result.into()
            },
        ));
        let proto = match self.get(&ab_ctor, "prototype") {
            Ok(JsValue::Object(p)) => self.get_object(p.id),
            _ => None,
        };
        let Some(ab_proto) = proto else {
            return;
        };
        ab_proto.borrow_mut().class_name = "ArrayBuffer".to_string();
        self.arraybuffer_prototype = Some(ab_proto.clone());

        let byte_length_getter = self.create_function(JsFunction::native(
            "get byteLength".to_string(),
            0,
            |interp, this_val, _args| {
                interp
                    .this_buffer_data(this_val, "ArrayBuffer.prototype.byteLength")
                    .map(|d| JsValue::Number(d.observed_byte_length() as f64))
                    .into()
            },
        ));
        let detached_getter = self.create_function(JsFunction::native(
            "get detached".to_string(),
            0,
            |interp, this_val, _args| {
                interp
                    .this_buffer_data(this_val, "ArrayBuffer.prototype.detached")
                    .map(|d| JsValue::Boolean(d.is_detached()))
                    .into()
            },
        ));
        {
            let mut p = ab_proto.borrow_mut();
            p.insert_property(
                "byteLength".to_string(),
                PropertyDescriptor::accessor(Some(byte_length_getter), None),
            );
            p.insert_property(
                "detached".to_string(),
                PropertyDescriptor::accessor(Some(detached_getter), None),
            );
            p.insert_property(
                SYMBOL_TO_STRING_TAG.to_string(),
                PropertyDescriptor::data(JsValue::string("ArrayBuffer"), false, false, true),
            );
        }
        self.set_global("ArrayBuffer", ab_ctor);
    }
}
