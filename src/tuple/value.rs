use std::fmt;

use bytes::{Buf, BufMut};

use super::DataType;

/// Represents a typed value that can be stored in a tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    /// 32-bit signed integer
    Integer(i32),

    /// Text value
    Text(String),
}

impl Value {
    /// Returns true if this value can be stored in a column of the given type.
    pub fn fits(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Value::Integer(_), DataType::Integer) => true,
            (Value::Text(s), DataType::Text(max_len)) => s.len() <= *max_len as usize,
            _ => false,
        }
    }

    /// Writes exactly `data_type.width()` bytes.
    /// Returns false, writing nothing, if the value does not fit the type.
    pub fn encode<B: BufMut>(&self, data_type: &DataType, buf: &mut B) -> bool {
        if !self.fits(data_type) {
            return false;
        }

        match (self, data_type) {
            (Value::Integer(v), DataType::Integer) => buf.put_i32(*v),
            (Value::Text(s), DataType::Text(max_len)) => {
                let bytes = s.as_bytes();
                buf.put_u32(bytes.len() as u32);
                buf.put_slice(bytes);
                buf.put_bytes(0, *max_len as usize - bytes.len());
            }
            _ => unreachable!("checked by fits()"),
        }
        true
    }

    /// Reads one value of the given type, consuming `data_type.width()` bytes.
    pub fn decode<B: Buf>(data_type: &DataType, buf: &mut B) -> Option<Self> {
        if buf.remaining() < data_type.width() {
            return None;
        }

        match data_type {
            DataType::Integer => Some(Value::Integer(buf.get_i32())),
            DataType::Text(max_len) => {
                let max_len = *max_len as usize;
                let len = buf.get_u32() as usize;
                if len > max_len {
                    return None;
                }
                let mut raw = vec![0u8; max_len];
                buf.copy_to_slice(&mut raw);
                raw.truncate(len);
                Some(Value::Text(String::from_utf8_lossy(&raw).into_owned()))
            }
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_encoding_is_big_endian() {
        let mut buf = Vec::new();
        assert!(Value::Integer(-2).encode(&DataType::Integer, &mut buf));
        assert_eq!(buf, vec![0xFF, 0xFF, 0xFF, 0xFE]);

        let decoded = Value::decode(&DataType::Integer, &mut buf.as_slice()).unwrap();
        assert_eq!(decoded, Value::Integer(-2));
    }

    #[test]
    fn test_text_is_length_prefixed_and_zero_padded() {
        let ty = DataType::Text(6);
        let mut buf = Vec::new();
        assert!(Value::from("abc").encode(&ty, &mut buf));

        assert_eq!(buf.len(), ty.width());
        assert_eq!(&buf[..4], &[0, 0, 0, 3]);
        assert_eq!(&buf[4..7], b"abc");
        assert_eq!(&buf[7..], &[0, 0, 0]);

        let decoded = Value::decode(&ty, &mut buf.as_slice()).unwrap();
        assert_eq!(decoded, Value::from("abc"));
    }

    #[test]
    fn test_type_mismatch_writes_nothing() {
        let mut buf = Vec::new();
        assert!(!Value::from("x").encode(&DataType::Integer, &mut buf));
        assert!(!Value::from("too long").encode(&DataType::Text(3), &mut buf));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_short_buffer() {
        let data = [0u8; 3];
        assert!(Value::decode(&DataType::Integer, &mut &data[..]).is_none());
    }
}
