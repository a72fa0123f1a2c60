// SPDX-License-Identifier: LGPL-3.0-or-later

//! Typed, named scalar values attached to objects and ports.
//!
//! A [`Property`] carries a declared [`PropertyType`], a set of flags fixed
//! at creation (`configurable`, `required`, `public_mutable`), and an
//! optional value. Reading a property with no value is an
//! [`Error::Undefined`]; writing a value of the wrong type is an
//! [`Error::Type`].

use std::path::PathBuf;

use smol_str::SmolStr;

use crate::error::Error;

/// A property's declared type. Values are coerced against this at write
/// time rather than left to whatever the caller happened to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Boolean,
    Integer,
    Real,
    Size,
    String,
    File,
}

crate::simple_display! {
    PropertyType {
        Boolean => "boolean",
        Integer => "integer",
        Real => "real",
        Size => "size",
        String => "string",
        File => "file",
    }
}

/// A dynamically typed scalar value.
///
/// `Size` is kept distinct from `Integer` even though both store a machine
/// word: a `Size` can never be negative, and attempting to construct one
/// from a negative `Integer` is a [`Error::Value`], not a silent
/// reinterpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyValue {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Size(u64),
    String(SmolStr),
    File(PathBuf),
}

impl AnyValue {
    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::Boolean(_) => PropertyType::Boolean,
            Self::Integer(_) => PropertyType::Integer,
            Self::Real(_) => PropertyType::Real,
            Self::Size(_) => PropertyType::Size,
            Self::String(_) => PropertyType::String,
            Self::File(_) => PropertyType::File,
        }
    }

    pub fn as_boolean(&self) -> Result<bool, Error> {
        match self {
            Self::Boolean(v) => Ok(*v),
            other => Err(Error::Type(format!("expected boolean, found {}", other.property_type()))),
        }
    }

    pub fn as_integer(&self) -> Result<i64, Error> {
        match self {
            Self::Integer(v) => Ok(*v),
            other => Err(Error::Type(format!("expected integer, found {}", other.property_type()))),
        }
    }

    pub fn as_real(&self) -> Result<f64, Error> {
        match self {
            Self::Real(v) => Ok(*v),
            Self::Integer(v) => Ok(*v as f64),
            other => Err(Error::Type(format!("expected real, found {}", other.property_type()))),
        }
    }

    pub fn as_size(&self) -> Result<u64, Error> {
        match self {
            Self::Size(v) => Ok(*v),
            other => Err(Error::Type(format!("expected size, found {}", other.property_type()))),
        }
    }

    pub fn as_str(&self) -> Result<&str, Error> {
        match self {
            Self::String(v) => Ok(v.as_str()),
            other => Err(Error::Type(format!("expected string, found {}", other.property_type()))),
        }
    }

    pub fn as_path(&self) -> Result<&std::path::Path, Error> {
        match self {
            Self::File(v) => Ok(v.as_path()),
            other => Err(Error::Type(format!("expected file, found {}", other.property_type()))),
        }
    }
}

impl From<bool> for AnyValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i64> for AnyValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for AnyValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<SmolStr> for AnyValue {
    fn from(v: SmolStr) -> Self {
        Self::String(v)
    }
}

impl From<&str> for AnyValue {
    fn from(v: &str) -> Self {
        Self::String(SmolStr::new(v))
    }
}

impl From<PathBuf> for AnyValue {
    fn from(v: PathBuf) -> Self {
        Self::File(v)
    }
}

/// Construct a `Size` from an integer, rejecting negative values: a
/// negative value assigned to a `Size` property is a value error, not a
/// silent truncation.
pub fn size_from_integer(value: i64) -> Result<AnyValue, Error> {
    if value < 0 {
        return Err(Error::Value(format!("size properties cannot be negative, got {value}")));
    }
    Ok(AnyValue::Size(value as u64))
}

/// A named, typed property slot on an object or port.
#[derive(Debug, Clone)]
pub struct Property {
    name: SmolStr,
    property_type: PropertyType,
    configurable: bool,
    required: bool,
    public_mutable: bool,
    value: Option<AnyValue>,
}

impl Property {
    pub fn new(name: impl Into<SmolStr>, property_type: PropertyType) -> Self {
        Self { name: name.into(), property_type, configurable: false, required: false, public_mutable: false, value: None }
    }

    pub fn set_configurable(mut self, value: bool) -> Self {
        self.configurable = value;
        self
    }

    pub fn set_required(mut self, value: bool) -> Self {
        self.required = value;
        self
    }

    pub fn set_public_mutable(mut self, value: bool) -> Self {
        self.public_mutable = value;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    pub fn configurable(&self) -> bool {
        self.configurable
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn public_mutable(&self) -> bool {
        self.public_mutable
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }

    /// Read the current value. [`Error::Undefined`] if never set.
    pub fn get(&self) -> Result<&AnyValue, Error> {
        self.value.as_ref().ok_or_else(|| Error::Undefined { name: self.name.to_string() })
    }

    /// Set the value, checked against [`Property::property_type`].
    ///
    /// This is the "internal" write path used during object construction
    /// and by hooks running under the object lock — it bypasses the
    /// `public_mutable` check, which only gates the public API.
    pub fn set(&mut self, value: AnyValue) -> Result<(), Error> {
        if value.property_type() != self.property_type {
            return Err(Error::Type(format!(
                "property {:?} is {}, cannot assign a {} value",
                self.name,
                self.property_type,
                value.property_type()
            )));
        }
        self.value = Some(value);
        Ok(())
    }

    /// Set the value through the public API: additionally rejects the
    /// write if `public_mutable` is false.
    pub fn set_public(&mut self, value: AnyValue) -> Result<(), Error> {
        if !self.public_mutable {
            return Err(Error::Immutable { name: self.name.to_string() });
        }
        self.set(value)
    }

    /// Clear a previously set value, returning it to undefined.
    pub fn unset(&mut self) {
        self.value = None;
    }
}

/// An ordered list of `(name, value)` pairs consumed by
/// [`crate::object::Object::configure`]. Order matters only in that
/// properties are applied in the order given; duplicate names simply
/// apply twice, last write wins.
#[derive(Debug, Clone, Default)]
pub struct ObjectConfig {
    entries: Vec<(SmolStr, AnyValue)>,
}

impl ObjectConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<SmolStr>, value: impl Into<AnyValue>) -> Self {
        self.entries.push((name.into(), value.into()));
        self
    }

    pub fn entries(&self) -> &[(SmolStr, AnyValue)] {
        &self.entries
    }
}

#[cfg(test)]
#[path = "property_tests.rs"]
mod tests;
