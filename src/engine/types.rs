use super::builtins::{ArrayBufferData, TypedArrayInfo};
use crate::types::JsValue;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Debug)]
pub enum Completion {
    Normal(JsValue),
    Throw(JsValue),
}

impl Completion {
    pub fn into_result(self) -> JsResult<JsValue> {
        match self {
            Completion::Normal(v) => Ok(v),
            Completion::Throw(e) => Err(e),
        }
    }
}

impl From<JsResult<JsValue>> for Completion {
    fn from(result: JsResult<JsValue>) -> Self {
        match result {
            Ok(v) => Completion::Normal(v),
            Err(e) => Completion::Throw(e),
        }
    }
}

/// Internal result type; the error is the thrown value.
pub type JsResult<T> = Result<T, JsValue>;

pub type NativeFn = Rc<dyn Fn(&mut super::Engine, &JsValue, &[JsValue]) -> Completion>;

pub enum JsFunction {
    Native(String, usize, NativeFn, bool),
}

impl JsFunction {
    pub fn native(
        name: String,
        arity: usize,
        f: impl Fn(&mut super::Engine, &JsValue, &[JsValue]) -> Completion + 'static,
    ) -> Self {
        JsFunction::Native(name, arity, Rc::new(f), false)
    }

    pub fn constructor(
        name: String,
        arity: usize,
        f: impl Fn(&mut super::Engine, &JsValue, &[JsValue]) -> Completion + 'static,
    ) -> Self {
        JsFunction::Native(name, arity, Rc::new(f), true)
    }

    pub fn name(&self) -> &str {
        match self {
            JsFunction::Native(name, ..) => name,
        }
    }
}

impl Clone for JsFunction {
    fn clone(&self) -> Self {
        match self {
            JsFunction::Native(name, arity, f, is_ctor) => {
                JsFunction::Native(name.clone(), *arity, f.clone(), *is_ctor)
            }
        }
    }
}

impl std::fmt::Debug for JsFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JsFunction::Native(name, arity, _, is_ctor) => {
                write!(f, "JsFunction::Native({name:?}, {arity}, ctor={is_ctor})")
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PropertyDescriptor {
    pub value: Option<JsValue>,
    pub writable: Option<bool>,
    pub get: Option<JsValue>,
    pub set: Option<JsValue>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    pub fn data(value: JsValue, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Self {
            value: Some(value),
            writable: Some(writable),
            get: None,
            set: None,
            enumerable: Some(enumerable),
            configurable: Some(configurable),
        }
    }

    pub fn data_default(value: JsValue) -> Self {
        Self::data(value, true, true, true)
    }

    pub fn accessor(get: Option<JsValue>, set: Option<JsValue>) -> Self {
        Self {
            value: None,
            writable: None,
            get,
            set,
            enumerable: Some(false),
            configurable: Some(true),
        }
    }

    /// Accessors carry no `value`/`writable`, even when both halves are absent.
    pub fn is_accessor_descriptor(&self) -> bool {
        self.get.is_some() || self.set.is_some() || (self.value.is_none() && self.writable.is_none())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IteratorKind {
    Key,
    Value,
    KeyValue,
}

#[derive(Debug, Clone)]
pub enum IteratorState {
    ArrayIterator {
        array_id: u64,
        index: usize,
        kind: IteratorKind,
        done: bool,
    },
}

#[derive(Debug)]
pub(crate) struct JsObjectData {
    pub id: Option<u64>,
    pub properties: FxHashMap<String, PropertyDescriptor>,
    pub prototype: Option<Rc<RefCell<JsObjectData>>>,
    pub callable: Option<JsFunction>,
    pub array_elements: Option<Vec<JsValue>>,
    pub class_name: String,
    pub iterator_state: Option<IteratorState>,
    pub arraybuffer_data: Option<ArrayBufferData>,
    pub typed_array_info: Option<TypedArrayInfo>,
}

impl JsObjectData {
    pub(crate) fn new() -> Self {
        Self {
            id: None,
            properties: FxHashMap::default(),
            prototype: None,
            callable: None,
            array_elements: None,
            class_name: "Object".to_string(),
            iterator_state: None,
            arraybuffer_data: None,
            typed_array_info: None,
        }
    }

    pub fn get_property_descriptor(&self, key: &str) -> Option<PropertyDescriptor> {
        if let Some(desc) = self.properties.get(key) {
            return Some(desc.clone());
        }
        if let Some(ref elems) = self.array_elements
            && let Ok(idx) = key.parse::<usize>()
            && idx < elems.len()
        {
            return Some(PropertyDescriptor::data_default(elems[idx].clone()));
        }
        if let Some(proto) = &self.prototype {
            return proto.borrow().get_property_descriptor(key);
        }
        None
    }

    pub fn insert_value(&mut self, key: String, value: JsValue) {
        self.insert_property(key, PropertyDescriptor::data_default(value));
    }

    pub fn insert_builtin(&mut self, key: String, value: JsValue) {
        self.insert_property(key, PropertyDescriptor::data(value, true, false, true));
    }

    pub fn insert_property(&mut self, key: String, desc: PropertyDescriptor) {
        self.properties.insert(key, desc);
    }

    pub fn get_property_value(&self, key: &str) -> Option<JsValue> {
        self.properties.get(key).and_then(|d| d.value.clone())
    }

    pub fn is_callable(&self) -> bool {
        self.callable.is_some()
    }
}
