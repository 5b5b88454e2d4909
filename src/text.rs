//! Rendering scalar values as tag text.
//!
//! Map keys and simple-tag values are plain text. [`to_text`] renders any
//! scalar [`Serialize`] value (numbers, booleans, strings, chars, unit enum
//! variants, newtypes and options around those) without escaping; escaping
//! happens when the text is written. Composite values are rejected with a
//! conversion error.

use serde::ser::{self, Impossible, Serialize};

use crate::error::{Error, Result};

/// Renders a scalar value as text.
///
/// ```
/// assert_eq!(adaptive_xml::to_text(&42u8).unwrap(), "42");
/// assert_eq!(adaptive_xml::to_text(&1.5f64).unwrap(), "1.5");
/// assert_eq!(adaptive_xml::to_text(&Some("key")).unwrap(), "key");
/// ```
pub fn to_text<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut serializer = TextSerializer { output: String::new() };
    value.serialize(&mut serializer)?;
    Ok(serializer.output)
}

struct TextSerializer {
    output: String,
}

fn not_scalar(what: &str) -> Error {
    Error::conversion(format!("cannot render a {} as text", what))
}

impl ser::Serializer for &mut TextSerializer {
    type Ok = ();
    type Error = Error;

    type SerializeSeq = Impossible<(), Error>;
    type SerializeTuple = Impossible<(), Error>;
    type SerializeTupleStruct = Impossible<(), Error>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = Impossible<(), Error>;
    type SerializeStruct = Impossible<(), Error>;
    type SerializeStructVariant = Impossible<(), Error>;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.output.push_str(if v { "true" } else { "false" });
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<()> { self.serialize_i64(i64::from(v)) }
    fn serialize_i16(self, v: i16) -> Result<()> { self.serialize_i64(i64::from(v)) }
    fn serialize_i32(self, v: i32) -> Result<()> { self.serialize_i64(i64::from(v)) }
    fn serialize_i64(self, v: i64) -> Result<()> {
        self.output.push_str(itoa::Buffer::new().format(v));
        Ok(())
    }

    fn serialize_i128(self, v: i128) -> Result<()> {
        self.output.push_str(itoa::Buffer::new().format(v));
        Ok(())
    }

    fn serialize_u8(self, v: u8) -> Result<()> { self.serialize_u64(u64::from(v)) }
    fn serialize_u16(self, v: u16) -> Result<()> { self.serialize_u64(u64::from(v)) }
    fn serialize_u32(self, v: u32) -> Result<()> { self.serialize_u64(u64::from(v)) }
    fn serialize_u64(self, v: u64) -> Result<()> {
        self.output.push_str(itoa::Buffer::new().format(v));
        Ok(())
    }

    fn serialize_u128(self, v: u128) -> Result<()> {
        self.output.push_str(itoa::Buffer::new().format(v));
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.output.push_str(ryu::Buffer::new().format(v));
        Ok(())
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.output.push_str(ryu::Buffer::new().format(v));
        Ok(())
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.output.push(v);
        Ok(())
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.output.push_str(v);
        Ok(())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<()> {
        Err(not_scalar("byte string"))
    }

    fn serialize_none(self) -> Result<()> { Ok(()) }
    fn serialize_some<T: ?Sized + Serialize>(self, v: &T) -> Result<()> { v.serialize(self) }
    fn serialize_unit(self) -> Result<()> { Ok(()) }
    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> { Ok(()) }
    fn serialize_unit_variant(self, _name: &'static str, _idx: u32, variant: &'static str) -> Result<()> {
        self.output.push_str(variant);
        Ok(())
    }
    fn serialize_newtype_struct<T: ?Sized + Serialize>(self, _name: &'static str, v: &T) -> Result<()> {
        v.serialize(self)
    }
    fn serialize_newtype_variant<T: ?Sized + Serialize>(self, _name: &'static str, _idx: u32, _variant: &'static str, v: &T) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(not_scalar("sequence"))
    }
    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(not_scalar("tuple"))
    }
    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeTupleStruct> {
        Err(not_scalar("tuple struct"))
    }
    fn serialize_tuple_variant(self, _name: &'static str, _idx: u32, _variant: &'static str, _len: usize) -> Result<Self::SerializeTupleVariant> {
        Err(not_scalar("tuple variant"))
    }
    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(not_scalar("map"))
    }
    fn serialize_struct(self, name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(not_scalar(name))
    }
    fn serialize_struct_variant(self, _name: &'static str, _idx: u32, variant: &'static str, _len: usize) -> Result<Self::SerializeStructVariant> {
        Err(not_scalar(variant))
    }
}
