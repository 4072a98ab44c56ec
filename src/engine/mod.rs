use crate::types::{JsObject, JsString, JsValue};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

mod types;
pub use types::*;

mod config;
pub use config::*;
mod error;
pub use error::{ErrorType, ViewError};

mod helpers;
pub(crate) use helpers::*;
mod gc;
pub(crate) use gc::InlineHeap;
mod builtins;
pub use builtins::{ContentType, Element, ElementKind};
pub(crate) use builtins::{BackingStore, Protectors, TypedArrayInfo};

pub const SYMBOL_ITERATOR: &str = "Symbol(Symbol.iterator)";
pub const SYMBOL_SPECIES: &str = "Symbol(Symbol.species)";
pub const SYMBOL_TO_STRING_TAG: &str = "Symbol(Symbol.toStringTag)";

pub(crate) type ObjectRef = Rc<RefCell<JsObjectData>>;

/// Host for the typed-view builtins: owns every object, the inline byte heap
/// and the per-instance protector latches.
pub struct Engine {
    objects: Vec<Option<ObjectRef>>,
    gc_alloc_count: usize,
    inline_heap: InlineHeap,
    config: EngineConfig,
    protectors: Protectors,
    new_target: Option<JsValue>,
    globals: FxHashMap<String, JsValue>,
    object_prototype: Option<ObjectRef>,
    function_prototype: Option<ObjectRef>,
    array_prototype: Option<ObjectRef>,
    iterator_prototype: Option<ObjectRef>,
    array_iterator_prototype: Option<ObjectRef>,
    arraybuffer_prototype: Option<ObjectRef>,
    typed_array_prototype: Option<ObjectRef>,
    typed_array_constructor: Option<JsObject>,
    typed_array_prototypes: [Option<ObjectRef>; ElementKind::COUNT],
    typed_array_constructors: [Option<JsObject>; ElementKind::COUNT],
    typed_array_values_fn: Option<JsObject>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let mut engine = Self {
            objects: Vec::new(),
            gc_alloc_count: 0,
            inline_heap: InlineHeap::default(),
            config,
            protectors: Protectors::default(),
            new_target: None,
            globals: FxHashMap::default(),
            object_prototype: None,
            function_prototype: None,
            array_prototype: None,
            iterator_prototype: None,
            array_iterator_prototype: None,
            arraybuffer_prototype: None,
            typed_array_prototype: None,
            typed_array_constructor: None,
            typed_array_prototypes: std::array::from_fn(|_| None),
            typed_array_constructors: [None; ElementKind::COUNT],
            typed_array_values_fn: None,
        };
        engine.setup_globals();
        tracing::debug!(
            max_byte_length = engine.config.max_byte_length,
            max_inline_byte_length = engine.config.max_inline_byte_length,
            "engine initialized"
        );
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A global binding such as `Uint8Array` or `TypeError`.
    pub fn global(&self, name: &str) -> JsValue {
        self.globals.get(name).cloned().unwrap_or(JsValue::Undefined)
    }

    pub(crate) fn get_object(&self, id: u64) -> Option<ObjectRef> {
        self.objects.get(id as usize).and_then(|slot| slot.clone())
    }

    pub(crate) fn object_ref(obj: &ObjectRef) -> JsObject {
        // Every object reachable from Rust has been given a slot.
        JsObject {
            id: obj.borrow().id.unwrap_or(u64::MAX),
        }
    }

    pub(crate) fn create_object(&mut self) -> ObjectRef {
        let mut data = JsObjectData::new();
        data.prototype = self.object_prototype.clone();
        let obj = Rc::new(RefCell::new(data));
        self.allocate_object_slot(obj.clone());
        obj
    }

    pub fn create_plain_object(&mut self) -> JsValue {
        let obj = self.create_object();
        JsValue::Object(Self::object_ref(&obj))
    }

    pub(crate) fn create_function(&mut self, func: JsFunction) -> JsValue {
        let (fn_name, fn_length, is_ctor) = match &func {
            JsFunction::Native(name, arity, _, is_ctor) => (name.clone(), *arity, *is_ctor),
        };
        let mut obj_data = JsObjectData::new();
        obj_data.prototype = self.function_prototype.clone();
        obj_data.callable = Some(func);
        obj_data.class_name = "Function".to_string();
        obj_data.insert_property(
            "length".to_string(),
            PropertyDescriptor::data(JsValue::Number(fn_length as f64), false, false, true),
        );
        obj_data.insert_property(
            "name".to_string(),
            PropertyDescriptor::data(
                JsValue::String(JsString::from_str(&fn_name)),
                false,
                false,
                true,
            ),
        );
        let obj = Rc::new(RefCell::new(obj_data));
        let func_id = self.allocate_object_slot(obj.clone());
        let func_val = JsValue::Object(JsObject { id: func_id });
        if is_ctor {
            let proto = self.create_object();
            proto
                .borrow_mut()
                .insert_builtin("constructor".to_string(), func_val.clone());
            obj.borrow_mut().insert_property(
                "prototype".to_string(),
                PropertyDescriptor::data(
                    JsValue::Object(Self::object_ref(&proto)),
                    true,
                    false,
                    false,
                ),
            );
        }
        func_val
    }

    /// Wraps a Rust closure as a callable function object.
    pub fn create_native_function(
        &mut self,
        name: &str,
        arity: usize,
        f: impl Fn(&mut Engine, &JsValue, &[JsValue]) -> Completion + 'static,
    ) -> JsValue {
        self.create_function(JsFunction::native(name.to_string(), arity, f))
    }

    /// Like [`Engine::create_native_function`] but usable with `construct`.
    /// The closure reads the active new target through [`Engine::new_target`].
    pub fn create_native_constructor(
        &mut self,
        name: &str,
        arity: usize,
        f: impl Fn(&mut Engine, &JsValue, &[JsValue]) -> Completion + 'static,
    ) -> JsValue {
        self.create_function(JsFunction::constructor(name.to_string(), arity, f))
    }

    pub fn new_target(&self) -> Option<JsValue> {
        self.new_target.clone()
    }

    pub fn create_array(&mut self, values: Vec<JsValue>) -> JsValue {
        let obj = self.create_object();
        {
            let mut o = obj.borrow_mut();
            o.class_name = "Array".to_string();
            o.prototype = self.array_prototype.clone();
            o.array_elements = Some(values);
        }
        JsValue::Object(Self::object_ref(&obj))
    }

    /// Elements of a fast array, or `None` for any other value.
    pub fn array_elements(&self, value: &JsValue) -> Option<Vec<JsValue>> {
        let o = value.as_object()?;
        let obj = self.get_object(o.id)?;
        let elems = obj.borrow().array_elements.clone();
        elems
    }

    fn setup_globals(&mut self) {
        let object_proto = Rc::new(RefCell::new(JsObjectData::new()));
        self.allocate_object_slot(object_proto.clone());
        self.object_prototype = Some(object_proto.clone());

        let function_proto = self.create_object();
        function_proto.borrow_mut().class_name = "Function".to_string();
        self.function_prototype = Some(function_proto);

        self.setup_object_prototype();
        self.setup_error_builtins();
        self.setup_array_prototype();
        self.setup_iterator_builtins();
        self.setup_typedarray_builtins();
    }

    pub(crate) fn set_global(&mut self, name: &str, value: JsValue) {
        self.globals.insert(name.to_string(), value);
    }
}
