//! Element kinds and their fixed binary layout.
//!
//! Every view stores its elements little-endian. Conversions into a slot go
//! through [`Element`], which already carries the value in the target's
//! content class: `Number` for the numeric kinds, `BigInt` for the two 64-bit
//! integer kinds.

use super::super::error::ViewError;
use crate::types::{JsValue, number_ops};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Int8,
    Uint8,
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
    BigInt64,
    BigUint64,
}

/// The two compatibility classes element kinds fall into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    Number,
    BigInt,
}

impl ElementKind {
    pub const ALL: [ElementKind; 11] = [
        ElementKind::Int8,
        ElementKind::Uint8,
        ElementKind::Uint8Clamped,
        ElementKind::Int16,
        ElementKind::Uint16,
        ElementKind::Int32,
        ElementKind::Uint32,
        ElementKind::Float32,
        ElementKind::Float64,
        ElementKind::BigInt64,
        ElementKind::BigUint64,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn element_size(self) -> usize {
        match self {
            ElementKind::Int8 | ElementKind::Uint8 | ElementKind::Uint8Clamped => 1,
            ElementKind::Int16 | ElementKind::Uint16 => 2,
            ElementKind::Int32 | ElementKind::Uint32 | ElementKind::Float32 => 4,
            ElementKind::Float64 | ElementKind::BigInt64 | ElementKind::BigUint64 => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ElementKind::Int8 => "Int8Array",
            ElementKind::Uint8 => "Uint8Array",
            ElementKind::Uint8Clamped => "Uint8ClampedArray",
            ElementKind::Int16 => "Int16Array",
            ElementKind::Uint16 => "Uint16Array",
            ElementKind::Int32 => "Int32Array",
            ElementKind::Uint32 => "Uint32Array",
            ElementKind::Float32 => "Float32Array",
            ElementKind::Float64 => "Float64Array",
            ElementKind::BigInt64 => "BigInt64Array",
            ElementKind::BigUint64 => "BigUint64Array",
        }
    }

    /// Intrinsic name of the constructor species creation falls back to.
    pub const fn default_constructor_of(self) -> &'static str {
        match self {
            ElementKind::Int8 => "%Int8Array%",
            ElementKind::Uint8 => "%Uint8Array%",
            ElementKind::Uint8Clamped => "%Uint8ClampedArray%",
            ElementKind::Int16 => "%Int16Array%",
            ElementKind::Uint16 => "%Uint16Array%",
            ElementKind::Int32 => "%Int32Array%",
            ElementKind::Uint32 => "%Uint32Array%",
            ElementKind::Float32 => "%Float32Array%",
            ElementKind::Float64 => "%Float64Array%",
            ElementKind::BigInt64 => "%BigInt64Array%",
            ElementKind::BigUint64 => "%BigUint64Array%",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let trimmed = name.trim_start_matches('%').trim_end_matches('%');
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(trimmed))
    }

    pub const fn is_big_integer_kind(self) -> bool {
        matches!(self, ElementKind::BigInt64 | ElementKind::BigUint64)
    }

    pub const fn content_type(self) -> ContentType {
        if self.is_big_integer_kind() {
            ContentType::BigInt
        } else {
            ContentType::Number
        }
    }

    pub const fn is_uint8_kind(self) -> bool {
        matches!(self, ElementKind::Uint8 | ElementKind::Uint8Clamped)
    }

    /// Whether elements of `self` can be moved into `other` as raw bytes.
    pub fn is_byte_compatible_with(self, other: ElementKind) -> bool {
        self == other || (self.is_uint8_kind() && other.is_uint8_kind())
    }

    pub fn decode(self, bytes: &[u8]) -> Element {
        match self {
            ElementKind::Int8 => Element::Number(bytes[0] as i8 as f64),
            ElementKind::Uint8 | ElementKind::Uint8Clamped => Element::Number(bytes[0] as f64),
            ElementKind::Int16 => Element::Number(i16::from_le_bytes([bytes[0], bytes[1]]) as f64),
            ElementKind::Uint16 => Element::Number(u16::from_le_bytes([bytes[0], bytes[1]]) as f64),
            ElementKind::Int32 => Element::Number(i32::from_le_bytes(word4(bytes)) as f64),
            ElementKind::Uint32 => Element::Number(u32::from_le_bytes(word4(bytes)) as f64),
            ElementKind::Float32 => Element::Number(f32::from_le_bytes(word4(bytes)) as f64),
            ElementKind::Float64 => Element::Number(f64::from_le_bytes(word8(bytes))),
            ElementKind::BigInt64 => Element::BigInt(i64::from_le_bytes(word8(bytes)) as i128),
            ElementKind::BigUint64 => Element::BigInt(u64::from_le_bytes(word8(bytes)) as i128),
        }
    }

    /// Writes `value` into `out` using this kind's conversion rules.
    pub fn encode(self, value: Element, out: &mut [u8]) -> Result<(), ViewError> {
        match (self, value) {
            (ElementKind::Int8, Element::Number(n)) => out[0] = number_ops::to_int8(n) as u8,
            (ElementKind::Uint8, Element::Number(n)) => out[0] = number_ops::to_uint8(n),
            (ElementKind::Uint8Clamped, Element::Number(n)) => {
                out[0] = number_ops::to_uint8_clamp(n)
            }
            (ElementKind::Int16, Element::Number(n)) => {
                out[..2].copy_from_slice(&number_ops::to_int16(n).to_le_bytes())
            }
            (ElementKind::Uint16, Element::Number(n)) => {
                out[..2].copy_from_slice(&number_ops::to_uint16(n).to_le_bytes())
            }
            (ElementKind::Int32, Element::Number(n)) => {
                out[..4].copy_from_slice(&number_ops::to_int32(n).to_le_bytes())
            }
            (ElementKind::Uint32, Element::Number(n)) => {
                out[..4].copy_from_slice(&number_ops::to_uint32(n).to_le_bytes())
            }
            (ElementKind::Float32, Element::Number(n)) => {
                out[..4].copy_from_slice(&(n as f32).to_le_bytes())
            }
            (ElementKind::Float64, Element::Number(n)) => {
                out[..8].copy_from_slice(&n.to_le_bytes())
            }
            (ElementKind::BigInt64 | ElementKind::BigUint64, Element::BigInt(v)) => {
                // Both kinds keep the low 64 bits; only decoding differs.
                out[..8].copy_from_slice(&(v as u64).to_le_bytes())
            }
            _ => return Err(ViewError::MixedContent),
        }
        Ok(())
    }
}

fn word4(bytes: &[u8]) -> [u8; 4] {
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

fn word8(bytes: &[u8]) -> [u8; 8] {
    let mut w = [0u8; 8];
    w.copy_from_slice(&bytes[..8]);
    w
}

/// A single element value, already in its content class.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Element {
    Number(f64),
    BigInt(i128),
}

impl Element {
    pub fn content_type(self) -> ContentType {
        match self {
            Element::Number(_) => ContentType::Number,
            Element::BigInt(_) => ContentType::BigInt,
        }
    }

    pub fn to_value(self) -> JsValue {
        match self {
            Element::Number(n) => JsValue::Number(n),
            Element::BigInt(v) => JsValue::bigint(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(kind: ElementKind, value: Element) -> Element {
        let mut buf = [0u8; 8];
        kind.encode(value, &mut buf).unwrap();
        kind.decode(&buf)
    }

    #[test]
    fn sizes_and_classes() {
        let sizes: Vec<usize> = ElementKind::ALL.iter().map(|k| k.element_size()).collect();
        assert_eq!(sizes, vec![1, 1, 1, 2, 2, 4, 4, 4, 8, 8, 8]);
        assert!(ElementKind::BigInt64.is_big_integer_kind());
        assert!(!ElementKind::Float64.is_big_integer_kind());
        assert_eq!(ElementKind::COUNT, 11);
        for (i, kind) in ElementKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn byte_compatibility() {
        assert!(ElementKind::Uint8.is_byte_compatible_with(ElementKind::Uint8Clamped));
        assert!(ElementKind::Int16.is_byte_compatible_with(ElementKind::Int16));
        assert!(!ElementKind::Int8.is_byte_compatible_with(ElementKind::Uint8));
        assert!(!ElementKind::BigInt64.is_byte_compatible_with(ElementKind::BigUint64));
    }

    #[test]
    fn names_resolve() {
        assert_eq!(ElementKind::from_name("float64array"), Some(ElementKind::Float64));
        assert_eq!(
            ElementKind::from_name(ElementKind::Int32.default_constructor_of()),
            Some(ElementKind::Int32)
        );
        assert_eq!(ElementKind::from_name("Float16Array"), None);
    }

    #[test]
    fn conversions_per_kind() {
        assert_eq!(round(ElementKind::Int8, Element::Number(200.0)), Element::Number(-56.0));
        assert_eq!(round(ElementKind::Uint8, Element::Number(257.0)), Element::Number(1.0));
        assert_eq!(
            round(ElementKind::Uint8Clamped, Element::Number(257.0)),
            Element::Number(255.0)
        );
        assert_eq!(round(ElementKind::Uint16, Element::Number(-1.0)), Element::Number(65535.0));
        assert_eq!(round(ElementKind::Float32, Element::Number(0.1)), Element::Number(0.1f32 as f64));
        assert_eq!(round(ElementKind::BigUint64, Element::BigInt(-1)), Element::BigInt(u64::MAX as i128));
        assert_eq!(round(ElementKind::BigInt64, Element::BigInt(u64::MAX as i128)), Element::BigInt(-1));
    }

    #[test]
    fn little_endian_layout() {
        let mut buf = [0u8; 4];
        ElementKind::Int32.encode(Element::Number(1.0), &mut buf).unwrap();
        assert_eq!(buf, [1, 0, 0, 0]);
    }

    #[test]
    fn mixed_encode_rejected() {
        let mut buf = [0u8; 8];
        assert_eq!(
            ElementKind::BigInt64.encode(Element::Number(1.0), &mut buf),
            Err(ViewError::MixedContent)
        );
        assert_eq!(
            ElementKind::Int8.encode(Element::BigInt(1), &mut buf),
            Err(ViewError::MixedContent)
        );
    }
}
