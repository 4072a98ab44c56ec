use std::fmt;

#[derive(Clone, Debug)]
pub enum JsValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    BigInt(JsBigInt),
    Object(JsObject),
}

// UTF-16 code unit string (§6.1.4)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct JsString {
    pub code_units: Vec<u16>,
}

impl JsString {
    pub fn from_str(s: &str) -> Self {
        Self {
            code_units: s.encode_utf16().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.code_units.is_empty()
    }

    pub fn len(&self) -> usize {
        self.code_units.len()
    }

    pub fn to_rust_string(&self) -> String {
        String::from_utf16_lossy(&self.code_units)
    }

    /// The single code unit at `index` as a one-element string.
    pub fn code_unit_at(&self, index: usize) -> Option<JsString> {
        self.code_units.get(index).map(|&u| JsString {
            code_units: vec![u],
        })
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rust_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JsBigInt {
    pub value: num_bigint::BigInt,
}

impl JsBigInt {
    pub fn new(value: impl Into<num_bigint::BigInt>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// Handle to a heap object owned by an `Engine`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JsObject {
    pub id: u64,
}

impl JsValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, JsValue::Undefined)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, JsValue::Object(_))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, JsValue::Undefined | JsValue::Null)
    }

    pub fn as_object(&self) -> Option<JsObject> {
        match self {
            JsValue::Object(o) => Some(*o),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            JsValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn bigint(value: impl Into<num_bigint::BigInt>) -> Self {
        JsValue::BigInt(JsBigInt::new(value))
    }

    pub fn string(s: &str) -> Self {
        JsValue::String(JsString::from_str(s))
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        JsValue::Number(n)
    }
}

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        JsValue::Boolean(b)
    }
}

impl From<JsObject> for JsValue {
    fn from(o: JsObject) -> Self {
        JsValue::Object(o)
    }
}

// §6.1.6.1 Number type operations
pub mod number_ops {
    pub fn to_string(x: f64) -> String {
        if x.is_nan() {
            return "NaN".to_string();
        }
        if x == 0.0 {
            return "0".to_string();
        }
        if x.is_infinite() {
            return if x > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
        }
        // ryu-js gives the shortest round-trip form Number::toString wants
        let mut buf = ryu_js::Buffer::new();
        buf.format(x).to_string()
    }

    // §7.1.5 ToIntegerOrInfinity, on an already converted number
    pub fn to_integer_or_infinity(x: f64) -> f64 {
        if x.is_nan() || x == 0.0 {
            return 0.0;
        }
        if x.is_infinite() {
            return x;
        }
        x.trunc()
    }

    // Integer part modulo 2^bits; the shared core of ToInt8..ToUint32.
    fn modulo_pow2(x: f64, bits: u32) -> u64 {
        if x.is_nan() || x.is_infinite() || x == 0.0 {
            return 0;
        }
        let modulus = (1u64 << bits) as f64;
        let m = x.trunc() % modulus;
        let m = if m < 0.0 { m + modulus } else { m };
        m as u64
    }

    // §7.1.6 ToInt32
    pub fn to_int32(x: f64) -> i32 {
        modulo_pow2(x, 32) as u32 as i32
    }

    // §7.1.7 ToUint32
    pub fn to_uint32(x: f64) -> u32 {
        modulo_pow2(x, 32) as u32
    }

    // §7.1.8 ToInt16
    pub fn to_int16(x: f64) -> i16 {
        modulo_pow2(x, 16) as u16 as i16
    }

    // §7.1.9 ToUint16
    pub fn to_uint16(x: f64) -> u16 {
        modulo_pow2(x, 16) as u16
    }

    // §7.1.10 ToInt8
    pub fn to_int8(x: f64) -> i8 {
        modulo_pow2(x, 8) as u8 as i8
    }

    // §7.1.11 ToUint8
    pub fn to_uint8(x: f64) -> u8 {
        modulo_pow2(x, 8) as u8
    }

    // §7.1.12 ToUint8Clamp: saturate, then round half to even.
    pub fn to_uint8_clamp(x: f64) -> u8 {
        if x.is_nan() || x <= 0.0 {
            return 0;
        }
        if x >= 255.0 {
            return 255;
        }
        let f = x.floor();
        if f + 0.5 < x {
            return (f + 1.0) as u8;
        }
        if x < f + 0.5 {
            return f as u8;
        }
        if f % 2.0 == 0.0 { f as u8 } else { (f + 1.0) as u8 }
    }
}

// §6.1.6.2 BigInt type operations
pub mod bigint_ops {
    use num_bigint::{BigInt, Sign};

    // Low 64 bits of the two's complement representation.
    fn low_bits(x: &BigInt) -> u64 {
        let (sign, digits) = x.to_u64_digits();
        let low = digits.first().copied().unwrap_or(0);
        if sign == Sign::Minus {
            low.wrapping_neg()
        } else {
            low
        }
    }

    // §7.1.15 ToBigInt64
    pub fn to_big_int64(x: &BigInt) -> i64 {
        low_bits(x) as i64
    }

    // §7.1.16 ToBigUint64
    pub fn to_big_uint64(x: &BigInt) -> u64 {
        low_bits(x)
    }

    // StringToBigInt, decimal and 0x/0o/0b literals.
    pub fn parse(s: &str) -> Option<BigInt> {
        let t = s.trim();
        if t.is_empty() {
            return Some(BigInt::from(0));
        }
        let (radix, digits) = match t.get(..2) {
            Some("0x") | Some("0X") => (16, &t[2..]),
            Some("0o") | Some("0O") => (8, &t[2..]),
            Some("0b") | Some("0B") => (2, &t[2..]),
            _ => (10, t),
        };
        if radix != 10 && (digits.is_empty() || digits.starts_with(['+', '-'])) {
            return None;
        }
        BigInt::parse_bytes(digits.as_bytes(), radix)
    }
}

// §7.1.4.1.1 StringToNumber
pub fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let radix = match t.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&t[2..], radix)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }
    // Rust accepts "inf"/"nan" spellings that JS does not.
    if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

impl fmt::Display for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "undefined"),
            JsValue::Null => write!(f, "null"),
            JsValue::Boolean(b) => write!(f, "{b}"),
            JsValue::Number(n) => write!(f, "{}", number_ops::to_string(*n)),
            JsValue::String(s) => write!(f, "{s}"),
            JsValue::BigInt(b) => write!(f, "{}n", b.value),
            JsValue::Object(_) => write!(f, "[object Object]"),
        }
    }
}
