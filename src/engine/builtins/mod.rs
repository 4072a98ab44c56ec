use super::*;

mod buffer;
mod copy;
mod iterators;
mod kinds;
mod species;
mod typedarray;
mod view;

pub(crate) use buffer::{ArrayBufferData, BackingStore};
pub use kinds::{ContentType, Element, ElementKind};
pub(crate) use species::Protectors;
pub(crate) use view::TypedArrayInfo;

impl Engine {
    pub(crate) fn setup_error_builtins(&mut self) {
        let mut error_proto_val = JsValue::Undefined;
        for name in ["Error", "TypeError", "RangeError", "SyntaxError"] {
            let ctor = self.create_function(JsFunction::constructor(
                name.to_string(),
                1,
                move |interp, _this, args| {
                    let msg = match args.first() {
                        None | Some(JsValue::Undefined) => String::new(),
                        Some(v) => match interp.to_string_value(v) {
                            Ok(s) => s,
                            Err(e) => return Completion::Throw(e),
                        },
                    };
                    Completion::Normal(interp.create_error(name, &msg))
                },
            ));
            let proto_val = match self.get(&ctor, "prototype") {
                Ok(v) => v,
                Err(_) => continue,
            };
            if let Some(proto) = proto_val.as_object().and_then(|p| self.get_object(p.id)) {
                let mut p = proto.borrow_mut();
                p.class_name = "Error".to_string();
                p.insert_builtin("name".to_string(), JsValue::string(name));
                p.insert_builtin("message".to_string(), JsValue::string(""));
            }
            if name == "Error" {
                error_proto_val = proto_val;
            } else {
                // Native errors inherit from Error.prototype.
                let _ = self.set_prototype_of(&proto_val, &error_proto_val);
            }
            self.set_global(name, ctor);
        }
    }

    pub(crate) fn setup_object_prototype(&mut self) {
        let Some(proto) = self.object_prototype.clone() else {
            return;
        };
        let value_of = self.create_function(JsFunction::native(
            "valueOf".to_string(),
            0,
            |interp, this, _args| interp.to_object(this).into(),
        ));
        let to_string = self.create_function(JsFunction::native(
            "toString".to_string(),
            0,
            |interp, this, _args| {
                let tag = match this {
                    JsValue::Undefined => "Undefined".to_string(),
                    JsValue::Null => "Null".to_string(),
                    JsValue::Object(o) => {
                        let builtin = interp
                            .get_object(o.id)
                            .map(|obj| obj.borrow().class_name.clone())
                            .unwrap_or_else(|| "Object".to_string());
                        match interp.get(this, SYMBOL_TO_STRING_TAG) {
                            Ok(JsValue::String(s)) => s.to_rust_string(),
                            Ok(_) => builtin,
                            Err(e) => return Completion::Throw(e),
                        }
                    }
                    _ => "Object".to_string(),
                };
                Completion::Normal(JsValue::string(&format!("[object {tag}]")))
            },
        ));
        let mut p = proto.borrow_mut();
        p.insert_builtin("valueOf".to_string(), value_of);
        p.insert_builtin("toString".to_string(), to_string);
    }

    pub(crate) fn setup_array_prototype(&mut self) {
        let proto = self.create_object();
        proto.borrow_mut().class_name = "Array".to_string();

        let join = self.create_function(JsFunction::native(
            "join".to_string(),
            1,
            |interp, this, args| {
                let sep = match args.first() {
                    None | Some(JsValue::Undefined) => ",".to_string(),
                    Some(v) => match interp.to_string_value(v) {
                        Ok(s) => s,
                        Err(e) => return Completion::Throw(e),
                    },
                };
                interp.join_elements(this, &sep).map(|s| JsValue::string(&s)).into()
            },
        ));
        let to_string = self.create_function(JsFunction::native(
            "toString".to_string(),
            0,
            |interp, this, _args| interp.join_elements(this, ",").map(|s| JsValue::string(&s)).into(),
        ));
        {
            let mut p = proto.borrow_mut();
            p.insert_builtin("join".to_string(), join);
            p.insert_builtin("toString".to_string(), to_string);
        }
        self.array_prototype = Some(proto);
    }

    /// Array.prototype.join over any array-like, typed views included.
    pub(crate) fn join_elements(&mut self, this: &JsValue, sep: &str) -> JsResult<String> {
        let obj = self.to_object(this)?;
        let len_val = self.get(&obj, "length")?;
        let len = self.to_length(&len_val)?;
        let mut parts = Vec::with_capacity(len);
        for i in 0..len {
            let v = self.get(&obj, &i.to_string())?;
            if v.is_nullish() {
                parts.push(String::new());
            } else {
                parts.push(self.to_string_value(&v)?);
            }
        }
        Ok(parts.join(sep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_carry_name_and_message() {
        let mut engine = Engine::new();
        let err = engine.create_error("RangeError", "boom");
        assert_eq!(
            engine.error_details(&err),
            Some(("RangeError".to_string(), "boom".to_string()))
        );
        let name = engine.get(&err, "name").unwrap();
        assert_eq!(name.to_string(), "RangeError");
        let range_ctor = engine.global("RangeError");
        let proto = engine.get(&range_ctor, "prototype").unwrap();
        let error_proto = engine.get_prototype_of(&proto);
        let error_ctor = engine.global("Error");
        let expected = engine.get(&error_ctor, "prototype").unwrap();
        assert_eq!(error_proto.as_object(), expected.as_object());
    }

    #[test]
    fn error_constructor_builds_error_objects() {
        let mut engine = Engine::new();
        let ctor = engine.global("TypeError");
        let err = engine
            .construct(&ctor, &[JsValue::string("bad")], None)
            .unwrap();
        assert_eq!(
            engine.error_details(&err),
            Some(("TypeError".to_string(), "bad".to_string()))
        );
    }

    #[test]
    fn object_to_string_tags() {
        let mut engine = Engine::new();
        let obj = engine.create_plain_object();
        assert_eq!(engine.to_string_value(&obj).unwrap(), "[object Object]");
        let arr = engine.create_array(vec![JsValue::Number(1.0), JsValue::Null, JsValue::Number(2.5)]);
        assert_eq!(engine.to_string_value(&arr).unwrap(), "1,,2.5");
    }
}
