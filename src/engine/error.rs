use thiserror::Error;

/// Intrinsic error constructor a `ViewError` is thrown as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorType {
    TypeError,
    RangeError,
    SyntaxError,
}

impl ErrorType {
    pub fn name(self) -> &'static str {
        match self {
            ErrorType::TypeError => "TypeError",
            ErrorType::RangeError => "RangeError",
            ErrorType::SyntaxError => "SyntaxError",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("Method {method} called on incompatible receiver")]
    IncompatibleReceiver { method: String },
    #[error("this is not a typed array.")]
    NotTypedArray,
    #[error("Cannot perform {method} on a detached ArrayBuffer")]
    Detached { method: String },
    #[error("Cannot mix BigInt and other types, use explicit conversions")]
    MixedContent,
    #[error("{0} is not a constructor")]
    NotConstructor(String),
    #[error("{0} is not a function")]
    NotCallable(String),
    #[error("Constructor {0} requires 'new'")]
    ConstructorRequiresNew(String),
    #[error("Abstract class TypedArray not directly constructable")]
    AbstractConstructor,
    #[error("The .constructor property is not an object")]
    ConstructorNotObject,
    #[error("object.constructor[Symbol.species] is not a constructor")]
    SpeciesNotConstructor,
    #[error("Derived TypedArray constructor created an array which was too small")]
    TooShort { requested: usize, actual: usize },
    #[error("Invalid typed array length: {0}")]
    InvalidLength(String),
    #[error("Invalid array buffer length")]
    InvalidBufferLength,
    #[error("offset is out of bounds")]
    OffsetOutOfBounds,
    #[error("Source is too large")]
    SourceTooLarge,
    #[error("start offset of {name} should be a multiple of {size}")]
    UnalignedOffset { name: &'static str, size: usize },
    #[error("byte length of {name} should be a multiple of {size}")]
    UnalignedLength { name: &'static str, size: usize },
    #[error("Start offset {byte_offset} with length {byte_length} is outside the bounds of the buffer")]
    OutOfBuffer { byte_offset: usize, byte_length: usize },
    #[error("ArrayBuffer is not detachable")]
    NotDetachable,
    #[error("Cannot convert {0} to a BigInt")]
    CannotConvertToBigInt(String),
    #[error("Cannot convert {0} to a BigInt")]
    UnparsableBigInt(String),
    #[error("Cannot convert a BigInt value to a number")]
    BigIntToNumber,
    #[error("Cannot convert object to primitive value")]
    NoPrimitive,
    #[error("Cannot convert undefined or null to object")]
    NullishToObject,
    #[error("{0} is not iterable")]
    NotIterable(String),
    #[error("Iterator result {0} is not an object")]
    IteratorResultNotObject(String),
}

impl ViewError {
    pub fn error_type(&self) -> ErrorType {
        match self {
            ViewError::InvalidLength(_)
            | ViewError::InvalidBufferLength
            | ViewError::OffsetOutOfBounds
            | ViewError::SourceTooLarge
            | ViewError::UnalignedOffset { .. }
            | ViewError::UnalignedLength { .. }
            | ViewError::OutOfBuffer { .. } => ErrorType::RangeError,
            ViewError::UnparsableBigInt(_) => ErrorType::SyntaxError,
            _ => ErrorType::TypeError,
        }
    }

    pub(crate) fn detached(method: &str) -> Self {
        ViewError::Detached {
            method: method.to_string(),
        }
    }

    pub(crate) fn incompatible(method: &str) -> Self {
        ViewError::IncompatibleReceiver {
            method: method.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy() {
        assert_eq!(ViewError::MixedContent.error_type(), ErrorType::TypeError);
        assert_eq!(ViewError::SourceTooLarge.error_type(), ErrorType::RangeError);
        assert_eq!(
            ViewError::TooShort {
                requested: 3,
                actual: 1
            }
            .error_type(),
            ErrorType::TypeError
        );
        assert_eq!(ViewError::detached("x").error_type(), ErrorType::TypeError);
        assert_eq!(
            ViewError::UnparsableBigInt("1.5".into()).error_type(),
            ErrorType::SyntaxError
        );
    }

    #[test]
    fn detached_message_names_method() {
        let err = ViewError::detached("%TypedArray%.prototype.set");
        assert_eq!(
            err.to_string(),
            "Cannot perform %TypedArray%.prototype.set on a detached ArrayBuffer"
        );
    }
}
