//! Typed attribute values
//!
//! A [`TypedValue`] is a type tag plus the canonical bytes for that type.
//! Equality and hashing look at nothing else: the optional column
//! back-reference and the cached column name never participate.
//!
//! ## Canonical layout
//!
//! The tag numbers and byte layouts below are a persistence contract and must
//! never change.
//!
//! | Tag | Type      | Bytes                                                   |
//! |-----|-----------|---------------------------------------------------------|
//! | 1   | Nid       | i32, big-endian                                         |
//! | 2   | Long      | i64, big-endian                                         |
//! | 3   | Int       | i32, big-endian                                         |
//! | 4   | Boolean   | `0x00` or `0x01`                                        |
//! | 5   | Bytes     | raw                                                     |
//! | 6   | Float     | IEEE-754 bits, big-endian, NaN canonicalized            |
//! | 7   | Double    | IEEE-754 bits, big-endian, NaN canonicalized            |
//! | 8   | String    | UTF-8                                                   |
//! | 9   | Uuid      | 16 bytes, RFC 4122 order                                |
//! | 10  | Array     | element tag, u32 count, then per element u32 len + bytes |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;
use tracing::warn;
use uuid::Uuid;

use crate::coordinate::{self, Coordinate};
use crate::error::{Result, StampError};
use crate::schema::ColumnLookup;
use crate::stamp::ComponentId;

/// Shown in place of a column name that could not be resolved
pub const NAME_PLACEHOLDER: &str = "???";

const CANONICAL_NAN_F32: u32 = 0x7fc0_0000;
const CANONICAL_NAN_F64: u64 = 0x7ff8_0000_0000_0000;

/// Type tag of a [`TypedValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DataType {
    Nid = 1,
    Long = 2,
    Int = 3,
    Boolean = 4,
    Bytes = 5,
    Float = 6,
    Double = 7,
    String = 8,
    Uuid = 9,
    Array = 10,
}

impl DataType {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            1 => DataType::Nid,
            2 => DataType::Long,
            3 => DataType::Int,
            4 => DataType::Boolean,
            5 => DataType::Bytes,
            6 => DataType::Float,
            7 => DataType::Double,
            8 => DataType::String,
            9 => DataType::Uuid,
            10 => DataType::Array,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::Nid => "NID",
            DataType::Long => "LONG",
            DataType::Int => "INTEGER",
            DataType::Boolean => "BOOLEAN",
            DataType::Bytes => "BYTEARRAY",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::String => "STRING",
            DataType::Uuid => "UUID",
            DataType::Array => "ARRAY",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nid(ComponentId),
    Long(i64),
    Int(i32),
    Boolean(bool),
    Bytes(Vec<u8>),
    Float(f32),
    Double(f64),
    String(String),
    Uuid(Uuid),
    /// Homogeneous; never nested
    Array(DataType, Vec<Value>),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Nid(_) => DataType::Nid,
            Value::Long(_) => DataType::Long,
            Value::Int(_) => DataType::Int,
            Value::Boolean(_) => DataType::Boolean,
            Value::Bytes(_) => DataType::Bytes,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::String(_) => DataType::String,
            Value::Uuid(_) => DataType::Uuid,
            Value::Array(..) => DataType::Array,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nid(id) => write!(f, "{}", id),
            Value::Long(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Bytes(bytes) => {
                f.write_str("0x")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(s) => f.write_str(s),
            Value::Uuid(u) => write!(f, "{}", u.hyphenated()),
            Value::Array(_, items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Where a value sits in its assemblage's schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub assemblage: ComponentId,
    pub column: usize,
}

/// Canonical byte-backed representation of one typed value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypedValue {
    data_type: DataType,
    data: Vec<u8>,
    #[serde(skip)]
    column: Option<ColumnRef>,
    /// Write-once; concurrent lookups may race but always store the same name
    #[serde(skip)]
    name: OnceLock<String>,
}

impl TypedValue {
    /// Wrap bytes already in the canonical layout for `data_type`. Nothing is
    /// validated here; [`value`](Self::value) reports malformed bytes.
    pub fn from_bytes(data_type: DataType, data: impl Into<Vec<u8>>) -> Self {
        Self {
            data_type,
            data: data.into(),
            column: None,
            name: OnceLock::new(),
        }
    }

    /// Encode a decoded value
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(Self::from_bytes(value.data_type(), encode(value)?))
    }

    /// Homogeneous array of `element` values
    pub fn array(element: DataType, items: impl IntoIterator<Item = TypedValue>) -> Result<Self> {
        if element == DataType::Array {
            return Err(StampError::InvalidArray("nested arrays are not supported".to_string()));
        }
        let items: Vec<TypedValue> = items.into_iter().collect();
        if let Some(stray) = items.iter().find(|item| item.data_type != element) {
            return Err(StampError::InvalidArray(format!(
                "{} element in {} array",
                stray.data_type, element
            )));
        }
        let count = u32::try_from(items.len())
            .map_err(|_| StampError::InvalidArray(format!("{} elements", items.len())))?;

        let mut data = Vec::with_capacity(5 + items.iter().map(|i| 4 + i.data.len()).sum::<usize>());
        data.push(element.tag());
        data.extend_from_slice(&count.to_be_bytes());
        for item in &items {
            let len = u32::try_from(item.data.len())
                .map_err(|_| StampError::InvalidArray(format!("element of {} bytes", item.data.len())))?;
            data.extend_from_slice(&len.to_be_bytes());
            data.extend_from_slice(&item.data);
        }
        Ok(Self::from_bytes(DataType::Array, data))
    }

    /// Attach the schema position used for name lookup
    pub fn with_column(mut self, assemblage: ComponentId, column: usize) -> Self {
        self.column = Some(ColumnRef { assemblage, column });
        self.name = OnceLock::new();
        self
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn column_ref(&self) -> Option<ColumnRef> {
        self.column
    }

    pub fn cached_name(&self) -> Option<&str> {
        self.name.get().map(String::as_str)
    }

    /// Decode the bytes according to the type tag
    pub fn value(&self) -> Result<Value> {
        decode(self.data_type, &self.data)
    }

    /// Column name from the schema this value was attached to.
    ///
    /// Returns the cached name when present. Otherwise looks the column up
    /// under `coordinate` (or the current default) and caches the result.
    pub fn resolved_name(&self, schemas: &impl ColumnLookup, coordinate: Option<&Coordinate>) -> Result<String> {
        if let Some(name) = self.name.get() {
            return Ok(name.clone());
        }
        let column = self.column.ok_or(StampError::NameUnavailable)?;
        let coordinate = coordinate::or_default(coordinate);
        let name = schemas.column_name(column.assemblage, column.column, &coordinate)?;
        // Losing a race is fine: the winner stored an equally valid name.
        let _ = self.name.set(name.clone());
        Ok(name)
    }

    /// `(TYPE - name - value)`; never fails. Lookup errors are logged and
    /// replaced with [`NAME_PLACEHOLDER`].
    pub fn render(&self, schemas: &impl ColumnLookup, coordinate: Option<&Coordinate>) -> String {
        let name = match self.resolved_name(schemas, coordinate) {
            Ok(name) => name,
            Err(e) => {
                warn!(error = %e, data_type = %self.data_type, "error reading column name");
                NAME_PLACEHOLDER.to_string()
            }
        };
        format!("({} - {} - {})", self.data_type, name, self.render_data())
    }

    fn render_data(&self) -> String {
        match self.value() {
            Ok(value) => value.to_string(),
            Err(_) => format!("<{} malformed bytes>", self.data.len()),
        }
    }
}

impl PartialEq for TypedValue {
    fn eq(&self, other: &Self) -> bool {
        self.data_type == other.data_type && self.data == other.data
    }
}

impl Eq for TypedValue {}

impl Hash for TypedValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data_type.hash(state);
        self.data.hash(state);
    }
}

/// Renders with the cached name only; see [`TypedValue::render`] for lookup
impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({} - {} - {})",
            self.data_type,
            self.cached_name().unwrap_or(NAME_PLACEHOLDER),
            self.render_data()
        )
    }
}

impl TryFrom<Value> for TypedValue {
    type Error = StampError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(&value)
    }
}

// =============================================================================
// Native constructors
// =============================================================================

impl From<ComponentId> for TypedValue {
    fn from(v: ComponentId) -> Self {
        Self::from_bytes(DataType::Nid, v.0.to_be_bytes())
    }
}

impl From<i64> for TypedValue {
    fn from(v: i64) -> Self {
        Self::from_bytes(DataType::Long, v.to_be_bytes())
    }
}

impl From<i32> for TypedValue {
    fn from(v: i32) -> Self {
        Self::from_bytes(DataType::Int, v.to_be_bytes())
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        Self::from_bytes(DataType::Boolean, [u8::from(v)])
    }
}

impl From<Vec<u8>> for TypedValue {
    fn from(v: Vec<u8>) -> Self {
        Self::from_bytes(DataType::Bytes, v)
    }
}

impl From<&[u8]> for TypedValue {
    fn from(v: &[u8]) -> Self {
        Self::from_bytes(DataType::Bytes, v)
    }
}

impl From<f32> for TypedValue {
    fn from(v: f32) -> Self {
        let bits = if v.is_nan() { CANONICAL_NAN_F32 } else { v.to_bits() };
        Self::from_bytes(DataType::Float, bits.to_be_bytes())
    }
}

impl From<f64> for TypedValue {
    fn from(v: f64) -> Self {
        let bits = if v.is_nan() { CANONICAL_NAN_F64 } else { v.to_bits() };
        Self::from_bytes(DataType::Double, bits.to_be_bytes())
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        Self::from_bytes(DataType::String, v.as_bytes())
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        Self::from_bytes(DataType::String, v.into_bytes())
    }
}

impl From<Uuid> for TypedValue {
    fn from(v: Uuid) -> Self {
        Self::from_bytes(DataType::Uuid, v.as_bytes().to_vec())
    }
}

macro_rules! array_from_vec {
    ($($native:ty => $element:ident),* $(,)?) => {
        $(
            impl TryFrom<Vec<$native>> for TypedValue {
                type Error = StampError;

                fn try_from(items: Vec<$native>) -> Result<Self> {
                    TypedValue::array(DataType::$element, items.into_iter().map(TypedValue::from))
                }
            }
        )*
    };
}

array_from_vec! {
    ComponentId => Nid,
    i64 => Long,
    i32 => Int,
    bool => Boolean,
    f32 => Float,
    f64 => Double,
    String => String,
    Uuid => Uuid,
}

// =============================================================================
// Codec
// =============================================================================

fn encode(value: &Value) -> Result<Vec<u8>> {
    let encoded = match value {
        Value::Nid(v) => TypedValue::from(*v),
        Value::Long(v) => TypedValue::from(*v),
        Value::Int(v) => TypedValue::from(*v),
        Value::Boolean(v) => TypedValue::from(*v),
        Value::Bytes(v) => TypedValue::from(v.as_slice()),
        Value::Float(v) => TypedValue::from(*v),
        Value::Double(v) => TypedValue::from(*v),
        Value::String(v) => TypedValue::from(v.as_str()),
        Value::Uuid(v) => TypedValue::from(*v),
        Value::Array(element, items) => {
            let items = items
                .iter()
                .map(TypedValue::from_value)
                .collect::<Result<Vec<_>>>()?;
            TypedValue::array(*element, items)?
        }
    };
    Ok(encoded.data)
}

fn malformed(data_type: DataType, reason: impl Into<String>) -> StampError {
    StampError::MalformedValue {
        data_type,
        reason: reason.into(),
    }
}

fn fixed<const N: usize>(data_type: DataType, data: &[u8]) -> Result<[u8; N]> {
    data.try_into()
        .map_err(|_| malformed(data_type, format!("expected {} bytes, found {}", N, data.len())))
}

fn decode(data_type: DataType, data: &[u8]) -> Result<Value> {
    Ok(match data_type {
        DataType::Nid => Value::Nid(ComponentId(i32::from_be_bytes(fixed(data_type, data)?))),
        DataType::Long => Value::Long(i64::from_be_bytes(fixed(data_type, data)?)),
        DataType::Int => Value::Int(i32::from_be_bytes(fixed(data_type, data)?)),
        DataType::Boolean => match data {
            [0] => Value::Boolean(false),
            [1] => Value::Boolean(true),
            _ => return Err(malformed(data_type, "expected a single 0 or 1 byte")),
        },
        DataType::Bytes => Value::Bytes(data.to_vec()),
        DataType::Float => Value::Float(f32::from_bits(u32::from_be_bytes(fixed(data_type, data)?))),
        DataType::Double => Value::Double(f64::from_bits(u64::from_be_bytes(fixed(data_type, data)?))),
        DataType::String => Value::String(
            String::from_utf8(data.to_vec()).map_err(|e| malformed(data_type, e.to_string()))?,
        ),
        DataType::Uuid => Value::Uuid(Uuid::from_bytes(fixed(data_type, data)?)),
        DataType::Array => decode_array(data)?,
    })
}

fn decode_array(data: &[u8]) -> Result<Value> {
    let (&tag, rest) = data
        .split_first()
        .ok_or_else(|| malformed(DataType::Array, "missing element tag"))?;
    let element = DataType::from_tag(tag)
        .filter(|t| *t != DataType::Array)
        .ok_or_else(|| malformed(DataType::Array, format!("invalid element tag {}", tag)))?;
    let (count, mut rest) = read_u32(rest)?;

    let mut items = Vec::new();
    for _ in 0..count {
        let (len, after) = read_u32(rest)?;
        let len = len as usize;
        if after.len() < len {
            return Err(malformed(DataType::Array, "element runs past end of data"));
        }
        let (bytes, after) = after.split_at(len);
        items.push(decode(element, bytes)?);
        rest = after;
    }
    if !rest.is_empty() {
        return Err(malformed(DataType::Array, format!("{} trailing bytes", rest.len())));
    }
    Ok(Value::Array(element, items))
}

fn read_u32(data: &[u8]) -> Result<(u32, &[u8])> {
    if data.len() < 4 {
        return Err(malformed(DataType::Array, "truncated length prefix"));
    }
    let (head, rest) = data.split_at(4);
    Ok((u32::from_be_bytes(fixed(DataType::Array, head)?), rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_scalar_layouts_are_big_endian() {
        assert_eq!(TypedValue::from(1i32).raw_bytes(), &[0, 0, 0, 1]);
        assert_eq!(TypedValue::from(-1i64).raw_bytes(), &[0xff; 8]);
        assert_eq!(TypedValue::from(true).raw_bytes(), &[1]);
        assert_eq!(TypedValue::from(ComponentId(258)).raw_bytes(), &[0, 0, 1, 2]);
        assert_eq!(TypedValue::from(1.0f32).raw_bytes(), &[0x3f, 0x80, 0, 0]);
        assert_eq!(TypedValue::from("é").raw_bytes(), &[0xc3, 0xa9]);
    }

    #[test]
    fn test_type_tag_follows_constructor() {
        // same bytes, different constructors
        let int = TypedValue::from(7i32);
        let nid = TypedValue::from(ComponentId(7));
        assert_eq!(int.raw_bytes(), nid.raw_bytes());
        assert_eq!(int.data_type(), DataType::Int);
        assert_eq!(nid.data_type(), DataType::Nid);
        assert_ne!(int, nid);
    }

    #[test]
    fn test_string_constructors_agree() {
        let owned = TypedValue::from(String::from("reason"));
        let borrowed = TypedValue::from("reason");
        let decoded = TypedValue::from_value(&Value::String("reason".into())).unwrap();
        assert_eq!(owned, borrowed);
        assert_eq!(owned.raw_bytes(), decoded.raw_bytes());
    }

    #[test]
    fn test_nan_is_canonical() {
        let quiet = TypedValue::from(f64::NAN);
        let other = TypedValue::from(f64::from_bits(0x7ff8_0000_0000_0001));
        assert_eq!(quiet.raw_bytes(), other.raw_bytes());
        assert_eq!(quiet, other);

        let single = TypedValue::from(-f32::NAN);
        assert_eq!(single.raw_bytes(), &CANONICAL_NAN_F32.to_be_bytes());
    }

    #[test]
    fn test_array_constructors_agree() {
        let from_vec = TypedValue::try_from(vec![1i64, 2, 3]).unwrap();
        let from_items = TypedValue::array(
            DataType::Long,
            vec![TypedValue::from(1i64), TypedValue::from(2i64), TypedValue::from(3i64)],
        )
        .unwrap();
        assert_eq!(from_vec, from_items);
        assert_eq!(
            from_vec.value().unwrap(),
            Value::Array(DataType::Long, vec![Value::Long(1), Value::Long(2), Value::Long(3)])
        );
    }

    #[test]
    fn test_vec_conversion_writes_length_prefixes() {
        let words = TypedValue::try_from(vec!["ab".to_string(), String::new()]).unwrap();
        let mut expected = vec![DataType::String.tag()];
        expected.extend_from_slice(&2u32.to_be_bytes());
        expected.extend_from_slice(&2u32.to_be_bytes());
        expected.extend_from_slice(b"ab");
        expected.extend_from_slice(&0u32.to_be_bytes());
        assert_eq!(words.raw_bytes(), expected.as_slice());
    }

    #[test]
    fn test_empty_array_keeps_element_type() {
        let strings = TypedValue::try_from(Vec::<String>::new()).unwrap();
        let ints = TypedValue::try_from(Vec::<i32>::new()).unwrap();
        assert_ne!(strings, ints);
        assert_eq!(strings.value().unwrap(), Value::Array(DataType::String, vec![]));
    }

    #[test]
    fn test_heterogeneous_array_rejected() {
        let err = TypedValue::array(DataType::Int, vec![TypedValue::from(1i32), TypedValue::from("x")])
            .unwrap_err();
        assert!(matches!(err, StampError::InvalidArray(_)));

        let nested = TypedValue::array(DataType::Array, vec![TypedValue::try_from(vec![1i32]).unwrap()]);
        assert!(nested.is_err());
    }

    #[test]
    fn test_decode_each_type() {
        let id = Uuid::from_u128(0x1234);
        let cases: Vec<(TypedValue, Value)> = vec![
            (TypedValue::from(ComponentId(-3)), Value::Nid(ComponentId(-3))),
            (TypedValue::from(i64::MIN), Value::Long(i64::MIN)),
            (TypedValue::from(42i32), Value::Int(42)),
            (TypedValue::from(false), Value::Boolean(false)),
            (TypedValue::from(vec![0u8, 9]), Value::Bytes(vec![0, 9])),
            (TypedValue::from(2.5f32), Value::Float(2.5)),
            (TypedValue::from(-0.25f64), Value::Double(-0.25)),
            (TypedValue::from("text"), Value::String("text".into())),
            (TypedValue::from(id), Value::Uuid(id)),
        ];
        for (typed, expected) in cases {
            assert_eq!(typed.value().unwrap(), expected, "{}", typed.data_type());
        }
    }

    #[test]
    fn test_malformed_bytes_are_reported_not_panicked() {
        let short = TypedValue::from_bytes(DataType::Long, vec![1, 2, 3]);
        assert!(matches!(
            short.value(),
            Err(StampError::MalformedValue { data_type: DataType::Long, .. })
        ));

        let bad_bool = TypedValue::from_bytes(DataType::Boolean, vec![2]);
        assert!(bad_bool.value().is_err());

        let truncated = TypedValue::from_bytes(DataType::Array, vec![DataType::Int.tag(), 0, 0, 0, 2, 0, 0, 0, 4, 0, 0]);
        assert!(truncated.value().is_err());

        // rendering still succeeds
        assert!(short.to_string().starts_with("(LONG - ??? - <3 malformed bytes>"));
    }

    #[test]
    fn test_equality_ignores_back_reference() {
        let plain = TypedValue::from("active");
        let attached = TypedValue::from("active").with_column(ComponentId(9), 0);
        assert_eq!(plain, attached);

        let mut set = HashSet::new();
        set.insert(plain);
        assert!(set.contains(&attached));
    }

    #[test]
    fn test_tags_round_trip() {
        for tag in 1..=10u8 {
            assert_eq!(DataType::from_tag(tag).unwrap().tag(), tag);
        }
        assert_eq!(DataType::from_tag(0), None);
        assert_eq!(DataType::from_tag(11), None);
    }

    #[test]
    fn test_display_values() {
        assert_eq!(Value::Bytes(vec![0xab, 0x01]).to_string(), "0xab01");
        assert_eq!(
            Value::Array(DataType::Int, vec![Value::Int(1), Value::Int(2)]).to_string(),
            "[1, 2]"
        );
        assert_eq!(TypedValue::from(5i32).to_string(), "(INTEGER - ??? - 5)");
    }

    #[test]
    fn test_serde_skips_back_reference() {
        let attached = TypedValue::from(3i32).with_column(ComponentId(1), 2);
        let json = serde_json::to_string(&attached).unwrap();
        assert_eq!(json, r#"{"data_type":"int","data":[0,0,0,3]}"#);

        let back: TypedValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, attached);
        assert_eq!(back.column_ref(), None);
    }
}
