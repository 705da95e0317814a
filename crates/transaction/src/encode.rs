use std::io::{self, Write};

use serde::{ser::SerializeMap, Serialize, Serializer};
use serde_json::ser::Formatter;

use crate::{
    canonical::is_canonical,
    error::Error,
    value::{Value, BIG_INT_MARKER, BYTES_MARKER, FIXED_MARKER},
};
use xian_common::utils::strings::encode_hex;

/// The JSON layouts a canonical [`Value`] can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layout {
    /// Python's `json.dumps` defaults: `", "` and `": "` separators, every integer in plain
    /// decimal. This is what gets signed.
    Signing,
    /// The signing separators, with integers outside 64 bits wrapped as `__big_int__` so JSON
    /// readers that stop at 64 bits read them back exactly. Used for broadcast transactions.
    Wire,
    /// No whitespace, integers outside 64 bits wrapped. The network's storage encoder.
    Compact,
}

impl Layout {
    fn spaced(self) -> bool {
        !matches!(self, Layout::Compact)
    }

    fn wraps_big_ints(self) -> bool {
        !matches!(self, Layout::Signing)
    }
}

/// Encodes a canonical value to the exact string that gets signed.
///
/// The layout is that of Python's `json.dumps` with its default arguments: `", "` between items,
/// `": "` between keys and values, every character outside printable ASCII escaped as `\uXXXX`,
/// integers in plain decimal whatever their size, floats written with their shortest
/// round-trip digits. `Fixed` and `Bytes` values are written as their `__fixed__` and
/// `__bytes__` wrappers.
///
/// Fails with [`Error::NonCanonical`] if a map is unsorted or has non-string keys, or a float is
/// not finite.
///
/// ```
/// use xian_transaction::{canonicalize, encode, Value};
///
/// let value = canonicalize(&Value::map([("b", Value::from(1.0)), ("a", Value::from("é"))]))
///     .expect("should canonicalize");
/// assert_eq!(encode(&value).expect("should encode"), r#"{"a": "\u00e9", "b": 1.0}"#);
/// ```
pub fn encode(value: &Value) -> Result<String, Error> {
    encode_with(value, Layout::Signing)
}

/// Encodes a canonical value to the bytes that are signed and verified.
pub fn encode_for_signing(value: &Value) -> Result<Vec<u8>, Error> {
    encode(value).map(String::into_bytes)
}

/// Encodes a canonical value in the network's compact storage layout: no whitespace around
/// `,` and `:`, and integers outside the signed 64-bit range wrapped as
/// `{"__big_int__":"…"}`. Older clients signed this layout; current ones sign [`encode`].
///
/// ```
/// use xian_transaction::{canonicalize, encode_compact, Value};
///
/// let value = canonicalize(&Value::map([("n", Value::Int(10i128.pow(20)))]))
///     .expect("should canonicalize");
/// assert_eq!(
///     encode_compact(&value).expect("should encode"),
///     r#"{"n":{"__big_int__":"100000000000000000000"}}"#
/// );
/// ```
pub fn encode_compact(value: &Value) -> Result<String, Error> {
    encode_with(value, Layout::Compact)
}

pub(crate) fn encode_with(value: &Value, layout: Layout) -> Result<String, Error> {
    check_encodable(value)?;

    let mut buf = Vec::new();
    let formatter = AsciiFormatter { spaced: layout.spaced() };
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    Encoded { value, wrap_big_ints: layout.wraps_big_ints() }.serialize(&mut serializer)?;

    // every byte the formatter emits is ASCII
    String::from_utf8(buf).map_err(|e| Error::NonCanonical(e.to_string()))
}

fn check_encodable(value: &Value) -> Result<(), Error> {
    if !is_canonical(value) {
        return Err(Error::NonCanonical(
            "maps must have string keys in ascending order; canonicalize first".to_string(),
        ));
    }
    if let Some(f) = find_non_finite(value) {
        return Err(Error::NonCanonical(format!("float {f} has no encoding")));
    }

    Ok(())
}

fn find_non_finite(value: &Value) -> Option<f64> {
    match value {
        Value::Float(f) if !f.is_finite() => Some(*f),
        Value::List(items) => items.iter().find_map(find_non_finite),
        Value::Map(entries) => entries.iter().find_map(|(_, v)| find_non_finite(v)),
        _ => None,
    }
}

/// Integers in the open interval (-2^63, 2^63 - 1) are written as plain numbers.
fn fits_plain_int(i: i128) -> bool {
    i > i64::MIN as i128 && i < i64::MAX as i128
}

/// A value together with how its big integers are written.
#[derive(Debug, Clone, Copy)]
struct Encoded<'a> {
    value: &'a Value,
    wrap_big_ints: bool,
}

impl Encoded<'_> {
    fn with<'b>(&self, value: &'b Value) -> Encoded<'b> {
        Encoded { value, wrap_big_ints: self.wrap_big_ints }
    }
}

impl Serialize for Encoded<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) if self.wrap_big_ints && !fits_plain_int(*i) => {
                wrapped(serializer, BIG_INT_MARKER, &i.to_string())
            }
            Value::Int(i) => serializer.serialize_i128(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Fixed(s) => wrapped(serializer, FIXED_MARKER, s),
            Value::Bytes(b) => wrapped(serializer, BYTES_MARKER, &encode_hex(b)),
            Value::List(items) => serializer.collect_seq(items.iter().map(|item| self.with(item))),
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    match key.as_str() {
                        Some(key) => map.serialize_entry(key, &self.with(value))?,
                        None => {
                            return Err(serde::ser::Error::custom(format!(
                                "non-string key {key} is not allowed"
                            )))
                        }
                    }
                }
                map.end()
            }
        }
    }
}

fn wrapped<S: Serializer>(serializer: S, marker: &str, inner: &str) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(marker, inner)?;
    map.end()
}

/// A [`Formatter`] producing ASCII-only JSON, with or without a space after `,` and `:`.
#[derive(Debug, Clone, Copy, Default)]
struct AsciiFormatter {
    spaced: bool,
}

impl AsciiFormatter {
    fn separator<W>(&self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        match (first, self.spaced) {
            (true, _) => Ok(()),
            (false, true) => writer.write_all(b", "),
            (false, false) => writer.write_all(b","),
        }
    }
}

impl Formatter for AsciiFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.separator(writer, first)
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.separator(writer, first)
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        writer.write_all(if self.spaced { b": " } else { b":" })
    }

    fn write_f64<W>(&mut self, writer: &mut W, value: f64) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        writer.write_all(float_repr(value).as_bytes())
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            if (' '..='~').contains(&c) {
                continue;
            }

            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = i + c.len_utf8();
        }

        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Lays out a finite float with its shortest round-trip digits: fixed notation (always with a
/// fractional part) for decimal exponents in `[-4, 16)`, scientific notation otherwise.
fn float_repr(value: f64) -> String {
    let sci = format!("{value:e}");
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((&sci, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    if (-4..16).contains(&exponent) {
        if exponent >= 0 {
            let point = exponent as usize + 1;
            if digits.len() <= point {
                format!("{sign}{digits}{}.0", "0".repeat(point - digits.len()))
            } else {
                format!("{sign}{}.{}", &digits[..point], &digits[point..])
            }
        } else {
            format!("{sign}0.{}{digits}", "0".repeat((-exponent - 1) as usize))
        }
    } else {
        let (head, tail) = digits.split_at(1);
        let exponent_sign = if exponent < 0 { '-' } else { '+' };
        let fraction = if tail.is_empty() { String::new() } else { format!(".{tail}") };
        format!("{sign}{head}{fraction}e{exponent_sign}{:02}", exponent.abs())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{canonical::canonicalize, value::Key};

    fn encoded(value: Value) -> String {
        encode(&canonicalize(&value).expect("should canonicalize")).expect("should encode")
    }

    fn compact(value: Value) -> String {
        encode_compact(&canonicalize(&value).expect("should canonicalize")).expect("should encode")
    }

    #[test]
    fn test_float_repr() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(-0.0), "-0.0");
        assert_eq!(float_repr(0.0), "0.0");
        assert_eq!(float_repr(2.75), "2.75");
        assert_eq!(float_repr(100.0), "100.0");
        assert_eq!(float_repr(0.1), "0.1");
        assert_eq!(float_repr(0.0001), "0.0001");
        assert_eq!(float_repr(0.00001), "1e-05");
        assert_eq!(float_repr(1.5e-7), "1.5e-07");
        assert_eq!(float_repr(1e15), "1000000000000000.0");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(1.2345e20), "1.2345e+20");
        assert_eq!(float_repr(-2.5e300), "-2.5e+300");
        assert_eq!(float_repr(123456.789), "123456.789");
    }

    #[test]
    fn test_encode_signing_layout() {
        let value = Value::map([
            ("b", Value::List(vec![Value::from(1), Value::Null, Value::Bool(true)])),
            ("a", Value::from("x")),
        ]);
        assert_eq!(encoded(value), r#"{"a": "x", "b": [1, null, true]}"#);
    }

    #[test]
    fn test_encode_nested_empty_containers() {
        // output of `json.dumps({"a": [], "b": {}, "c": [1, [2, {}]], "d": "\x7f\x01\n"})`
        let value = Value::map([
            ("d", Value::from("\u{7f}\u{1}\n")),
            (
                "c",
                Value::List(vec![
                    Value::from(1),
                    Value::List(vec![Value::from(2), Value::Map(vec![])]),
                ]),
            ),
            ("b", Value::Map(vec![])),
            ("a", Value::List(vec![])),
        ]);
        assert_eq!(
            encoded(value),
            r#"{"a": [], "b": {}, "c": [1, [2, {}]], "d": "\u007f\u0001\n"}"#
        );
    }

    #[test]
    fn test_encode_compact_layout() {
        let value = Value::map([
            ("b", Value::List(vec![Value::from(1), Value::Null, Value::Bool(true)])),
            ("a", Value::map([("z", Value::from("x")), ("y", Value::from(2.5))])),
        ]);
        assert_eq!(compact(value), r#"{"a":{"y":2.5,"z":"x"},"b":[1,null,true]}"#);
    }

    #[test]
    fn test_encode_escapes_non_ascii() {
        assert_eq!(encoded(Value::from("caf\u{e9}")), r#""caf\u00e9""#);
        assert_eq!(encoded(Value::from("\u{1F600}")), r#""\ud83d\ude00""#);
        assert_eq!(encoded(Value::from("\u{7f}")), r#""\u007f""#);
        assert_eq!(encoded(Value::from("a\"b\\c\nd\te\u{1}")), r#""a\"b\\c\nd\te\u0001""#);
        assert_eq!(compact(Value::from("caf\u{e9}")), r#""caf\u00e9""#);
    }

    #[test]
    fn test_encode_big_ints_are_plain_when_signed() {
        assert_eq!(encoded(Value::Int(i64::MAX as i128)), "9223372036854775807");
        assert_eq!(encoded(Value::Int(i64::MIN as i128)), "-9223372036854775808");
        assert_eq!(encoded(Value::Int(10i128.pow(20))), "100000000000000000000");
        assert_eq!(
            encoded(Value::map([("n", Value::Int(-(10i128.pow(30))))])),
            r#"{"n": -1000000000000000000000000000000}"#
        );
    }

    #[test]
    fn test_encode_compact_wraps_big_ints() {
        assert_eq!(compact(Value::Int(i64::MAX as i128 - 1)), "9223372036854775806");
        assert_eq!(compact(Value::Int(i64::MIN as i128 + 1)), "-9223372036854775807");
        assert_eq!(compact(Value::Int(i64::MAX as i128)), r#"{"__big_int__":"9223372036854775807"}"#);
        assert_eq!(
            compact(Value::Int(i64::MIN as i128)),
            r#"{"__big_int__":"-9223372036854775808"}"#
        );
        assert_eq!(
            compact(Value::List(vec![Value::Int(10i128.pow(20))])),
            r#"[{"__big_int__":"100000000000000000000"}]"#
        );
    }

    #[test]
    fn test_wire_layout_is_spaced_and_wraps_big_ints() {
        let value = Value::map([("n", Value::Int(10i128.pow(20))), ("m", Value::from(1))]);
        let value = canonicalize(&value).expect("should canonicalize");
        assert_eq!(
            encode_with(&value, Layout::Wire).expect("should encode"),
            r#"{"m": 1, "n": {"__big_int__": "100000000000000000000"}}"#
        );
    }

    #[test]
    fn test_encode_wrapped_scalars() {
        assert_eq!(encoded(Value::Fixed("1.50".to_string())), r#"{"__fixed__": "1.50"}"#);
        assert_eq!(encoded(Value::Bytes(vec![0xde, 0xad])), r#"{"__bytes__": "dead"}"#);
        assert_eq!(compact(Value::Bytes(vec![])), r#"{"__bytes__":""}"#);
    }

    #[test]
    fn test_encode_rejects_unsorted_maps() {
        let value = Value::map([("b", Value::Null), ("a", Value::Null)]);
        assert!(matches!(encode(&value), Err(Error::NonCanonical(_))));
        assert!(matches!(encode_compact(&value), Err(Error::NonCanonical(_))));

        let value = Value::Map(vec![(Key::Int(1), Value::Null)]);
        assert!(matches!(encode(&value), Err(Error::NonCanonical(_))));
    }

    #[test]
    fn test_encode_rejects_non_finite_floats() {
        for f in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let value = Value::List(vec![Value::Float(f)]);
            assert!(matches!(encode(&value), Err(Error::NonCanonical(_))));
        }
    }

    #[test]
    fn test_encode_order_independent() {
        let a = Value::map([("x", Value::from(1)), ("y", Value::map([("q", Value::Null)]))]);
        let b = Value::map([("y", Value::map([("q", Value::Null)])), ("x", Value::from(1))]);
        assert_eq!(encoded(a), encoded(b));
    }
}
