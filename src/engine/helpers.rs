use super::*;
use crate::types::{bigint_ops, number_ops, string_to_number};
use num_bigint::BigInt;

const MAX_SAFE_INTEGER: f64 = 9007199254740991.0;

pub(crate) fn to_boolean(val: &JsValue) -> bool {
    match val {
        JsValue::Undefined | JsValue::Null => false,
        JsValue::Boolean(b) => *b,
        JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
        JsValue::String(s) => !s.is_empty(),
        JsValue::BigInt(b) => b.value != BigInt::from(0),
        JsValue::Object(_) => true,
    }
}

/// CanonicalNumericIndexString: the number `key` spells, if it spells one
/// exactly.
pub(crate) fn canonical_numeric_index(key: &str) -> Option<f64> {
    if key == "-0" {
        return Some(-0.0);
    }
    let n = string_to_number(key);
    if number_ops::to_string(n) == key {
        Some(n)
    } else {
        None
    }
}

/// An array index key in its canonical spelling.
pub(crate) fn array_index(key: &str) -> Option<usize> {
    let idx = key.parse::<usize>().ok()?;
    if idx.to_string() == key { Some(idx) } else { None }
}

impl Engine {
    pub(crate) fn create_error(&mut self, name: &str, msg: &str) -> JsValue {
        let error_proto = match self.globals.get(name) {
            Some(JsValue::Object(ctor)) => self.get_object(ctor.id).and_then(|ctor| {
                match ctor.borrow().get_property_value("prototype") {
                    Some(JsValue::Object(p)) => self.get_object(p.id),
                    _ => None,
                }
            }),
            _ => None,
        };
        let obj = self.create_object();
        {
            let mut o = obj.borrow_mut();
            o.class_name = name.to_string();
            if let Some(proto) = error_proto {
                o.prototype = Some(proto);
            }
            o.insert_builtin("message".to_string(), JsValue::string(msg));
        }
        JsValue::Object(Self::object_ref(&obj))
    }

    pub(crate) fn create_type_error(&mut self, msg: &str) -> JsValue {
        self.create_error("TypeError", msg)
    }

    /// Builds the thrown value for a view error.
    pub(crate) fn throw_view_error(&mut self, err: ViewError) -> JsValue {
        tracing::debug!(error = %err, kind = err.error_type().name(), "throwing view error");
        self.create_error(err.error_type().name(), &err.to_string())
    }

    pub(crate) fn fail<T>(&mut self, err: ViewError) -> JsResult<T> {
        Err(self.throw_view_error(err))
    }

    /// `(name, message)` of a thrown error object.
    pub fn error_details(&self, val: &JsValue) -> Option<(String, String)> {
        let obj = self.get_object(val.as_object()?.id)?;
        let o = obj.borrow();
        let message = match o.get_property_descriptor("message").and_then(|d| d.value) {
            Some(JsValue::String(s)) => s.to_rust_string(),
            _ => String::new(),
        };
        Some((o.class_name.clone(), message))
    }

    pub(crate) fn describe(&self, val: &JsValue) -> String {
        match val {
            JsValue::String(s) => format!("\"{s}\""),
            JsValue::Object(o) => match self.get_object(o.id) {
                Some(obj) => {
                    let o = obj.borrow();
                    match o.callable {
                        Some(ref f) => format!("function {}", f.name()),
                        None => format!("#<{}>", o.class_name),
                    }
                }
                None => "#<Object>".to_string(),
            },
            other => other.to_string(),
        }
    }

    pub fn is_callable(&self, val: &JsValue) -> bool {
        if let JsValue::Object(o) = val
            && let Some(obj) = self.get_object(o.id)
        {
            return obj.borrow().is_callable();
        }
        false
    }

    pub fn is_constructor(&self, val: &JsValue) -> bool {
        if let JsValue::Object(o) = val
            && let Some(obj) = self.get_object(o.id)
            && let Some(JsFunction::Native(_, _, _, is_ctor)) = obj.borrow().callable
        {
            return is_ctor;
        }
        false
    }

    // ---- property protocol ----

    pub(crate) fn get_object_property(
        &mut self,
        obj_id: u64,
        key: &str,
        this_val: &JsValue,
    ) -> Completion {
        let Some(obj) = self.get_object(obj_id) else {
            return Completion::Normal(JsValue::Undefined);
        };
        let ta = obj.borrow().typed_array_info.clone();
        if let Some(ta) = ta
            && let Some(n) = canonical_numeric_index(key)
        {
            let value = self
                .valid_integer_index(&ta, n)
                .and_then(|idx| self.read_element(&ta, idx))
                .map(Element::to_value)
                .unwrap_or(JsValue::Undefined);
            return Completion::Normal(value);
        }
        let desc = {
            let o = obj.borrow();
            if key == "length"
                && let Some(ref elems) = o.array_elements
            {
                return Completion::Normal(JsValue::Number(elems.len() as f64));
            }
            o.get_property_descriptor(key)
        };
        match desc {
            Some(PropertyDescriptor { get: Some(getter), .. }) => {
                self.call_function(&getter, this_val, &[])
            }
            Some(d) if d.is_accessor_descriptor() => Completion::Normal(JsValue::Undefined),
            Some(d) => Completion::Normal(d.value.unwrap_or(JsValue::Undefined)),
            None => Completion::Normal(JsValue::Undefined),
        }
    }

    /// `[[Get]]` with the target as receiver. Primitives have no properties.
    pub fn get(&mut self, target: &JsValue, key: &str) -> JsResult<JsValue> {
        match target {
            JsValue::Object(o) => self.get_object_property(o.id, key, target).into_result(),
            JsValue::String(s) => {
                if key == "length" {
                    return Ok(JsValue::Number(s.len() as f64));
                }
                Ok(array_index(key)
                    .and_then(|idx| s.code_unit_at(idx))
                    .map(JsValue::String)
                    .unwrap_or(JsValue::Undefined))
            }
            _ => Ok(JsValue::Undefined),
        }
    }

    /// `[[Set]]` with the target as receiver. Writes to non-writable data
    /// properties and setter-less accessors are silently dropped.
    pub fn set(&mut self, target: &JsValue, key: &str, value: JsValue) -> JsResult<()> {
        let Some(o) = target.as_object() else {
            return Ok(());
        };
        let Some(obj) = self.get_object(o.id) else {
            return Ok(());
        };
        self.note_property_store(o.id, key);

        let ta = obj.borrow().typed_array_info.clone();
        if let Some(ta) = ta
            && let Some(n) = canonical_numeric_index(key)
        {
            let element = self.to_element(ta.kind, &value)?;
            if let Some(idx) = self.valid_integer_index(&ta, n) {
                self.write_element(&ta, idx, element)?;
            }
            return Ok(());
        }

        {
            let mut o = obj.borrow_mut();
            if let Some(ref mut elems) = o.array_elements
                && let Some(idx) = array_index(key)
            {
                if idx >= elems.len() {
                    elems.resize(idx + 1, JsValue::Undefined);
                }
                elems[idx] = value;
                return Ok(());
            }
        }

        let desc = obj.borrow().get_property_descriptor(key);
        if let Some(d) = desc {
            if d.is_accessor_descriptor() {
                if let Some(setter) = d.set {
                    self.call(&setter, target, &[value])?;
                }
                return Ok(());
            }
            if d.writable == Some(false) {
                return Ok(());
            }
        }
        let mut o = obj.borrow_mut();
        match o.properties.get_mut(key) {
            Some(existing) => existing.value = Some(value),
            None => o.insert_value(key.to_string(), value),
        }
        Ok(())
    }

    /// Defines a writable, configurable, non-enumerable own data property.
    pub fn define_property(&mut self, target: &JsValue, key: &str, value: JsValue) -> JsResult<()> {
        self.define_own(target, key, PropertyDescriptor::data(value, true, false, true))
    }

    pub fn define_accessor(
        &mut self,
        target: &JsValue,
        key: &str,
        getter: Option<JsValue>,
        setter: Option<JsValue>,
    ) -> JsResult<()> {
        self.define_own(target, key, PropertyDescriptor::accessor(getter, setter))
    }

    fn define_own(&mut self, target: &JsValue, key: &str, desc: PropertyDescriptor) -> JsResult<()> {
        let Some(obj) = target.as_object().and_then(|o| self.get_object(o.id)) else {
            let msg = format!("Object.defineProperty called on non-object {}", self.describe(target));
            return Err(self.create_type_error(&msg));
        };
        self.note_property_store(Self::object_ref(&obj).id, key);
        obj.borrow_mut().insert_property(key.to_string(), desc);
        Ok(())
    }

    pub fn get_prototype_of(&self, target: &JsValue) -> JsValue {
        target
            .as_object()
            .and_then(|o| self.get_object(o.id))
            .and_then(|obj| obj.borrow().prototype.clone())
            .map(|p| JsValue::Object(Self::object_ref(&p)))
            .unwrap_or(JsValue::Null)
    }

    pub fn set_prototype_of(&mut self, target: &JsValue, proto: &JsValue) -> JsResult<()> {
        let new_proto = match proto {
            JsValue::Null => None,
            JsValue::Object(p) => self.get_object(p.id),
            other => {
                let msg = format!("Object prototype may only be an Object or null: {other}");
                return Err(self.create_type_error(&msg));
            }
        };
        if let Some(obj) = target.as_object().and_then(|o| self.get_object(o.id)) {
            obj.borrow_mut().prototype = new_proto;
        }
        Ok(())
    }

    /// Trips protectors whose fast paths a store to `key` on `obj_id` could
    /// invalidate.
    fn note_property_store(&mut self, obj_id: u64, key: &str) {
        match key {
            "constructor" => {
                let is_view = self
                    .get_object(obj_id)
                    .is_some_and(|o| o.borrow().typed_array_info.is_some());
                if is_view || self.is_typed_array_prototype(obj_id) {
                    self.protectors.invalidate_species();
                }
            }
            SYMBOL_SPECIES => {
                if self.is_typed_array_constructor(obj_id) {
                    self.protectors.invalidate_species();
                }
            }
            "next" => {
                let is_array_iterator_proto = self
                    .array_iterator_prototype
                    .as_ref()
                    .is_some_and(|p| p.borrow().id == Some(obj_id));
                if is_array_iterator_proto {
                    self.protectors.invalidate_array_iterator();
                }
            }
            _ => {}
        }
    }

    pub(crate) fn get_method(&mut self, val: &JsValue, key: &str) -> JsResult<Option<JsValue>> {
        let func = self.get(val, key)?;
        if func.is_nullish() {
            return Ok(None);
        }
        if !self.is_callable(&func) {
            let name = self.describe(&func);
            return self.fail(ViewError::NotCallable(name));
        }
        Ok(Some(func))
    }

    pub(crate) fn get_prototype_from_constructor(
        &mut self,
        new_target: &JsValue,
        fallback: Option<ObjectRef>,
    ) -> JsResult<Option<ObjectRef>> {
        match self.get(new_target, "prototype")? {
            JsValue::Object(p) => Ok(self.get_object(p.id)),
            _ => Ok(fallback),
        }
    }

    // ---- calls ----

    pub(crate) fn call_function(
        &mut self,
        func_val: &JsValue,
        this_val: &JsValue,
        args: &[JsValue],
    ) -> Completion {
        if let JsValue::Object(o) = func_val
            && let Some(obj) = self.get_object(o.id)
        {
            let callable = obj.borrow().callable.clone();
            if let Some(JsFunction::Native(_, _, f, _)) = callable {
                let saved = self.new_target.take();
                let result = f(self, this_val, args);
                self.new_target = saved;
                return result;
            }
        }
        let name = self.describe(func_val);
        Completion::Throw(self.throw_view_error(ViewError::NotCallable(name)))
    }

    pub fn call(&mut self, func: &JsValue, this_val: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
        self.call_function(func, this_val, args).into_result()
    }

    /// `Construct(ctor, args, new_target)`; `new_target` defaults to `ctor`.
    pub fn construct(
        &mut self,
        ctor: &JsValue,
        args: &[JsValue],
        new_target: Option<&JsValue>,
    ) -> JsResult<JsValue> {
        let callable = ctor
            .as_object()
            .and_then(|o| self.get_object(o.id))
            .and_then(|obj| obj.borrow().callable.clone());
        let Some(JsFunction::Native(_, _, f, true)) = callable else {
            let name = self.describe(ctor);
            return self.fail(ViewError::NotConstructor(name));
        };
        let target = new_target.unwrap_or(ctor).clone();
        let saved = self.new_target.replace(target);
        let result = f(self, &JsValue::Undefined, args);
        self.new_target = saved;
        result.into_result()
    }

    // ---- coercions ----

    pub(crate) fn to_primitive(&mut self, val: &JsValue, preferred_type: &str) -> JsResult<JsValue> {
        if !val.is_object() {
            return Ok(val.clone());
        }
        let order = if preferred_type == "string" {
            ["toString", "valueOf"]
        } else {
            ["valueOf", "toString"]
        };
        for name in order {
            let method = self.get(val, name)?;
            if self.is_callable(&method) {
                let result = self.call(&method, val, &[])?;
                if !result.is_object() {
                    return Ok(result);
                }
            }
        }
        self.fail(ViewError::NoPrimitive)
    }

    pub fn to_number(&mut self, val: &JsValue) -> JsResult<f64> {
        match val {
            JsValue::Undefined => Ok(f64::NAN),
            JsValue::Null => Ok(0.0),
            JsValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            JsValue::Number(n) => Ok(*n),
            JsValue::String(s) => Ok(string_to_number(&s.to_rust_string())),
            JsValue::BigInt(_) => self.fail(ViewError::BigIntToNumber),
            JsValue::Object(_) => {
                let prim = self.to_primitive(val, "number")?;
                self.to_number(&prim)
            }
        }
    }

    pub fn to_bigint(&mut self, val: &JsValue) -> JsResult<BigInt> {
        let prim = self.to_primitive(val, "number")?;
        match prim {
            JsValue::BigInt(b) => Ok(b.value),
            JsValue::Boolean(b) => Ok(BigInt::from(b as u8)),
            JsValue::String(s) => {
                let text = s.to_rust_string();
                match bigint_ops::parse(&text) {
                    Some(v) => Ok(v),
                    None => self.fail(ViewError::UnparsableBigInt(text)),
                }
            }
            other => {
                let shown = self.describe(&other);
                self.fail(ViewError::CannotConvertToBigInt(shown))
            }
        }
    }

    pub(crate) fn to_string_value(&mut self, val: &JsValue) -> JsResult<String> {
        match val {
            JsValue::String(s) => Ok(s.to_rust_string()),
            JsValue::BigInt(b) => Ok(b.value.to_string()),
            JsValue::Object(_) => {
                let prim = self.to_primitive(val, "string")?;
                self.to_string_value(&prim)
            }
            other => Ok(other.to_string()),
        }
    }

    pub fn to_integer_or_infinity(&mut self, val: &JsValue) -> JsResult<f64> {
        let n = self.to_number(val)?;
        Ok(number_ops::to_integer_or_infinity(n))
    }

    /// ToIndex; `on_error` builds the RangeError for out-of-range input.
    pub(crate) fn to_index(
        &mut self,
        val: &JsValue,
        on_error: impl FnOnce(f64) -> ViewError,
    ) -> JsResult<usize> {
        if val.is_undefined() {
            return Ok(0);
        }
        let integer = self.to_integer_or_infinity(val)?;
        if !(0.0..=MAX_SAFE_INTEGER).contains(&integer) {
            return self.fail(on_error(integer));
        }
        Ok(integer as usize)
    }

    pub fn to_length(&mut self, val: &JsValue) -> JsResult<usize> {
        let len = self.to_integer_or_infinity(val)?;
        if len <= 0.0 {
            return Ok(0);
        }
        Ok(len.min(MAX_SAFE_INTEGER) as usize)
    }

    pub(crate) fn to_object(&mut self, val: &JsValue) -> JsResult<JsValue> {
        match val {
            JsValue::Undefined | JsValue::Null => self.fail(ViewError::NullishToObject),
            JsValue::Object(_) => Ok(val.clone()),
            JsValue::String(s) => {
                let units = (0..s.len())
                    .filter_map(|i| s.code_unit_at(i))
                    .map(JsValue::String)
                    .collect();
                Ok(self.create_array(units))
            }
            _ => Ok(self.create_plain_object()),
        }
    }

    // ---- iteration ----

    pub(crate) fn get_iterator_from_method(
        &mut self,
        obj: &JsValue,
        method: &JsValue,
    ) -> JsResult<(JsValue, JsValue)> {
        let iterator = self.call(method, obj, &[])?;
        if !iterator.is_object() {
            let shown = self.describe(&iterator);
            return self.fail(ViewError::IteratorResultNotObject(shown));
        }
        let next = self.get(&iterator, "next")?;
        Ok((iterator, next))
    }

    /// GetIterator(obj, sync): the iterator and its `next` method.
    pub fn get_iterator(&mut self, obj: &JsValue) -> JsResult<(JsValue, JsValue)> {
        match self.get_method(obj, SYMBOL_ITERATOR)? {
            Some(method) => self.get_iterator_from_method(obj, &method),
            None => {
                let shown = self.describe(obj);
                self.fail(ViewError::NotIterable(shown))
            }
        }
    }

    /// One `next()` call; `None` once the iterator reports done.
    pub fn iterator_step(&mut self, iterator: &JsValue, next: &JsValue) -> JsResult<Option<JsValue>> {
        let result = self.call(next, iterator, &[])?;
        if !result.is_object() {
            let shown = self.describe(&result);
            return self.fail(ViewError::IteratorResultNotObject(shown));
        }
        let done = self.get(&result, "done")?;
        if to_boolean(&done) {
            return Ok(None);
        }
        Ok(Some(self.get(&result, "value")?))
    }

    pub(crate) fn iterable_to_list(&mut self, obj: &JsValue, method: &JsValue) -> JsResult<Vec<JsValue>> {
        let (iterator, next) = self.get_iterator_from_method(obj, method)?;
        let mut values = Vec::new();
        while let Some(value) = self.iterator_step(&iterator, &next)? {
            values.push(value);
        }
        Ok(values)
    }

    pub(crate) fn create_iter_result(&mut self, value: JsValue, done: bool) -> JsValue {
        let obj = self.create_object();
        {
            let mut o = obj.borrow_mut();
            o.insert_value("value".to_string(), value);
            o.insert_value("done".to_string(), JsValue::Boolean(done));
        }
        JsValue::Object(Self::object_ref(&obj))
    }
}
