//! Result construction for operations that derive a new view from an
//! existing one, honoring `constructor[Symbol.species]` overrides.

use super::super::*;

/// One-way latches guarding builtin fast paths. Each `Engine` owns its own
/// set, so tripping one in an engine leaves every other engine untouched.
/// Once tripped they stay tripped for the lifetime of the engine.
#[derive(Debug, Default)]
pub(crate) struct Protectors {
    species_broken: bool,
    array_iterator_broken: bool,
}

impl Protectors {
    pub(crate) fn species_intact(&self) -> bool {
        !self.species_broken
    }

    pub(crate) fn array_iterator_intact(&self) -> bool {
        !self.array_iterator_broken
    }

    pub(crate) fn invalidate_species(&mut self) {
        if !self.species_broken {
            tracing::debug!(protector = "species", "protector invalidated");
        }
        self.species_broken = true;
    }

    pub(crate) fn invalidate_array_iterator(&mut self) {
        if !self.array_iterator_broken {
            tracing::debug!(protector = "array_iterator", "protector invalidated");
        }
        self.array_iterator_broken = true;
    }
}

/// Arguments a derived view is requested with.
#[derive(Clone, Debug)]
pub(crate) enum SpeciesArgs {
    Length(usize),
    Buffer {
        buffer: JsObject,
        byte_offset: usize,
        length: usize,
    },
}

impl SpeciesArgs {
    fn to_values(&self) -> Vec<JsValue> {
        match self {
            SpeciesArgs::Length(len) => vec![JsValue::Number(*len as f64)],
            SpeciesArgs::Buffer {
                buffer,
                byte_offset,
                length,
            } => vec![
                JsValue::Object(*buffer),
                JsValue::Number(*byte_offset as f64),
                JsValue::Number(*length as f64),
            ],
        }
    }
}

impl Engine {
    pub fn species_protector_intact(&self) -> bool {
        self.protectors.species_intact()
    }

    pub fn array_iterator_protector_intact(&self) -> bool {
        self.protectors.array_iterator_intact()
    }

    pub(crate) fn default_constructor(&self, kind: ElementKind) -> JsValue {
        self.typed_array_constructors[kind.index()]
            .map(JsValue::Object)
            .unwrap_or(JsValue::Undefined)
    }

    pub(crate) fn is_typed_array_prototype(&self, obj_id: u64) -> bool {
        let is = |p: &Option<ObjectRef>| p.as_ref().is_some_and(|p| p.borrow().id == Some(obj_id));
        is(&self.typed_array_prototype) || self.typed_array_prototypes.iter().any(is)
    }

    pub(crate) fn is_typed_array_constructor(&self, obj_id: u64) -> bool {
        self.typed_array_constructor.is_some_and(|c| c.id == obj_id)
            || self
                .typed_array_constructors
                .iter()
                .any(|c| c.is_some_and(|c| c.id == obj_id))
    }

    fn has_default_prototype(&self, exemplar: &JsValue, kind: ElementKind) -> bool {
        let Some(obj) = exemplar.as_object().and_then(|o| self.get_object(o.id)) else {
            return false;
        };
        let proto = obj.borrow().prototype.clone();
        match (proto, &self.typed_array_prototypes[kind.index()]) {
            (Some(actual), Some(expected)) => Rc::ptr_eq(&actual, expected),
            _ => false,
        }
    }

    /// SpeciesConstructor(exemplar, default).
    pub(crate) fn species_constructor(&mut self, exemplar: &JsValue, default: &JsValue) -> JsResult<JsValue> {
        let ctor = self.get(exemplar, "constructor")?;
        if ctor.is_undefined() {
            return Ok(default.clone());
        }
        if !ctor.is_object() {
            return self.fail(ViewError::ConstructorNotObject);
        }
        let species = self.get(&ctor, SYMBOL_SPECIES)?;
        if species.is_nullish() {
            return Ok(default.clone());
        }
        if self.is_constructor(&species) {
            return Ok(species);
        }
        self.fail(ViewError::SpeciesNotConstructor)
    }

    /// Checks what a constructor handed back before anything trusts it.
    fn validate_created(&mut self, result: &JsValue, method: &str, allow_detached: bool) -> JsResult<TypedArrayInfo> {
        let Some(ta) = self.typed_array_info_of(result) else {
            return self.fail(ViewError::NotTypedArray);
        };
        if !allow_detached && self.is_view_detached(&ta) {
            return self.fail(ViewError::detached(method));
        }
        Ok(ta)
    }

    /// TypedArraySpeciesCreate. Views over a buffer may come back detached;
    /// every other result must be attached.
    pub(crate) fn typed_array_species_create(
        &mut self,
        exemplar: &JsValue,
        kind: ElementKind,
        args: SpeciesArgs,
        method: &str,
    ) -> JsResult<(JsValue, TypedArrayInfo)> {
        let allow_detached = matches!(args, SpeciesArgs::Buffer { .. });
        let result = if self.protectors.species_intact() && self.has_default_prototype(exemplar, kind) {
            tracing::debug!(kind = kind.name(), method, "species fast path");
            match args {
                SpeciesArgs::Length(len) => self.create_typed_array_object(kind, len, None)?,
                SpeciesArgs::Buffer {
                    buffer,
                    byte_offset,
                    length,
                } => JsValue::Object(self.bind_view(kind, buffer, byte_offset, length, None)?),
            }
        } else {
            tracing::debug!(kind = kind.name(), method, "species slow path");
            let default = self.default_constructor(kind);
            let ctor = self.species_constructor(exemplar, &default)?;
            self.construct(&ctor, &args.to_values(), None)?
        };
        let ta = self.validate_created(&result, method, allow_detached)?;
        Ok((result, ta))
    }

    /// Species creation for callers that will write `length` elements.
    pub(crate) fn species_create_by_length(
        &mut self,
        exemplar: &JsValue,
        kind: ElementKind,
        length: usize,
        method: &str,
    ) -> JsResult<(JsValue, TypedArrayInfo)> {
        let (result, ta) = self.typed_array_species_create(exemplar, kind, SpeciesArgs::Length(length), method)?;
        self.check_not_too_short(&ta, length)?;
        Ok((result, ta))
    }

    /// TypedArrayCreateByLength through an arbitrary constructor, as used by
    /// `of` and `from`.
    pub(crate) fn typed_array_create_by_length(
        &mut self,
        ctor: &JsValue,
        length: usize,
        method: &str,
    ) -> JsResult<(JsValue, TypedArrayInfo)> {
        if !self.is_constructor(ctor) {
            let name = self.describe(ctor);
            return self.fail(ViewError::NotConstructor(name));
        }
        let result = self.construct(ctor, &[JsValue::Number(length as f64)], None)?;
        let ta = self.validate_created(&result, method, false)?;
        self.check_not_too_short(&ta, length)?;
        Ok((result, ta))
    }

    fn check_not_too_short(&mut self, ta: &TypedArrayInfo, requested: usize) -> JsResult<()> {
        let actual = self.view_length(ta);
        if actual < requested {
            return self.fail(ViewError::TooShort { requested, actual });
        }
        Ok(())
    }
}
