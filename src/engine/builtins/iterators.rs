use super::super::*;

impl Engine {
    pub(crate) fn setup_iterator_builtins(&mut self) {
        // %IteratorPrototype%
        let iter_proto = self.create_object();
        let iter_self = self.create_function(JsFunction::native(
            "[Symbol.iterator]".to_string(),
            0,
            |_interp, this, _args| Completion::Normal(this.clone()),
        ));
        iter_proto
            .borrow_mut()
            .insert_builtin(SYMBOL_ITERATOR.to_string(), iter_self);
        self.iterator_prototype = Some(iter_proto.clone());

        // %ArrayIteratorPrototype%
        let arr_iter_proto = self.create_object();
        let next = self.create_function(JsFunction::native(
            "next".to_string(),
            0,
            |interp, this, _args| interp.array_iterator_next(this).into(),
        ));
        {
            let mut p = arr_iter_proto.borrow_mut();
            p.prototype = Some(iter_proto);
            p.class_name = "Array Iterator".to_string();
            p.insert_builtin("next".to_string(), next);
            p.insert_property(
                SYMBOL_TO_STRING_TAG.to_string(),
                PropertyDescriptor::data(JsValue::string("Array Iterator"), false, false, true),
            );
        }
        self.array_iterator_prototype = Some(arr_iter_proto);

        // Array.prototype iteration methods.
        let Some(array_proto) = self.array_prototype.clone() else {
            return;
        };
        let values = self.array_iteration_function("values", IteratorKind::Value);
        let keys = self.array_iteration_function("keys", IteratorKind::Key);
        let entries = self.array_iteration_function("entries", IteratorKind::KeyValue);
        let mut p = array_proto.borrow_mut();
        p.insert_builtin("values".to_string(), values.clone());
        p.insert_builtin("keys".to_string(), keys);
        p.insert_builtin("entries".to_string(), entries);
        p.insert_builtin(SYMBOL_ITERATOR.to_string(), values);
    }

    fn array_iteration_function(&mut self, name: &str, kind: IteratorKind) -> JsValue {
        self.create_function(JsFunction::native(name.to_string(), 0, move |interp, this, _args| {
            match interp.to_object(this) {
                Ok(JsValue::Object(o)) => Completion::Normal(interp.create_array_iterator(o, kind)),
                Ok(_) => Completion::Normal(JsValue::Undefined),
                Err(e) => Completion::Throw(e),
            }
        }))
    }

    pub(crate) fn create_array_iterator(&mut self, target: JsObject, kind: IteratorKind) -> JsValue {
        let obj = self.create_object();
        {
            let mut o = obj.borrow_mut();
            o.prototype = self
                .array_iterator_prototype
                .clone()
                .or(self.iterator_prototype.clone());
            o.class_name = "Array Iterator".to_string();
            o.iterator_state = Some(IteratorState::ArrayIterator {
                array_id: target.id,
                index: 0,
                kind,
                done: false,
            });
        }
        JsValue::Object(Self::object_ref(&obj))
    }

    /// `%ArrayIteratorPrototype%.next`. Views are re-validated on every step;
    /// other targets are read through `length` and `[[Get]]`.
    fn array_iterator_next(&mut self, this: &JsValue) -> JsResult<JsValue> {
        const METHOD: &str = "%ArrayIteratorPrototype%.next";
        let Some(obj) = this.as_object().and_then(|o| self.get_object(o.id)) else {
            return self.fail(ViewError::incompatible(METHOD));
        };
        let state = obj.borrow().iterator_state.clone();
        let Some(IteratorState::ArrayIterator {
            array_id,
            index,
            kind,
            done,
        }) = state
        else {
            return self.fail(ViewError::incompatible(METHOD));
        };
        if done {
            return Ok(self.create_iter_result(JsValue::Undefined, true));
        }

        let target = JsValue::Object(JsObject { id: array_id });
        let len = match self.typed_array_info_of(&target) {
            Some(ta) => {
                if self.is_view_detached(&ta) {
                    return self.fail(ViewError::detached(METHOD));
                }
                self.view_length(&ta)
            }
            None => {
                let len_val = self.get(&target, "length")?;
                self.to_length(&len_val)?
            }
        };
        if index >= len {
            obj.borrow_mut().iterator_state = Some(IteratorState::ArrayIterator {
                array_id,
                index,
                kind,
                done: true,
            });
            return Ok(self.create_iter_result(JsValue::Undefined, true));
        }
        obj.borrow_mut().iterator_state = Some(IteratorState::ArrayIterator {
            array_id,
            index: index + 1,
            kind,
            done: false,
        });

        let value = match kind {
            IteratorKind::Key => JsValue::Number(index as f64),
            IteratorKind::Value => self.get(&target, &index.to_string())?,
            IteratorKind::KeyValue => {
                let elem = self.get(&target, &index.to_string())?;
                self.create_array(vec![JsValue::Number(index as f64), elem])
            }
        };
        Ok(self.create_iter_result(value, false))
    }
}
