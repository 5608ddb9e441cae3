use std::{cmp::Ordering, collections::BTreeMap};

use miette::Diagnostic;
use thiserror::Error;

use crate::{
    ConstValue, TypeId,
    builtin_annotations::{HIDDEN_ANNOTATION, KEY_ANNOTATION},
    field_key::{FieldKeyRecord, KeyError},
    types::TypeFingerprint,
};

/// Annotations attached to a field, keyed by annotation name.
/// A later definition for the same name replaces the earlier one.
pub type Annotations = BTreeMap<String, String>;

/// Presence contract of a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Requiredness {
    Required,
    Optional,
    /// Written when set, not mandatory when read.
    #[default]
    OptInReqOut,
}

impl std::fmt::Display for Requiredness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Requiredness::Required => "required",
            Requiredness::Optional => "optional",
            Requiredness::OptInReqOut => "opt-in-req-out",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
#[error("Unknown requiredness `{0}`")]
#[diagnostic(code(tidl::field::requiredness), help("use one of `required`, `optional`, `opt-in-req-out` or `default`"))]
pub struct UnknownRequiredness(pub String);

impl TryFrom<&str> for Requiredness {
    type Error = UnknownRequiredness;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim() {
            "required" => Ok(Requiredness::Required),
            "optional" => Ok(Requiredness::Optional),
            "opt-in-req-out" | "default" => Ok(Requiredness::OptInReqOut),
            other => Err(UnknownRequiredness(other.to_string())),
        }
    }
}

/// A single member of a struct, union or exception.
///
/// `ty`, `name` and `key` are fixed at construction; everything else is refined by
/// later passes through the setters.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    ty: TypeId,
    name: String,
    key: i32,
    requiredness: Requiredness,
    default_value: Option<ConstValue>,
    xsd_optional: bool,
    xsd_nillable: bool,
    xsd_attrs: Option<TypeId>,
    annotations: Annotations,
    auto_generated: bool,
}

impl Field {
    /// Creates a field whose key is not resolved yet (key `0`).
    pub fn new(ty: TypeId, name: impl Into<String>) -> Self {
        Self::with_key(ty, name, 0)
    }

    pub fn with_key(ty: TypeId, name: impl Into<String>, key: i32) -> Self {
        Self {
            ty,
            name: name.into(),
            key,
            requiredness: Requiredness::default(),
            default_value: None,
            xsd_optional: false,
            xsd_nillable: false,
            xsd_attrs: None,
            annotations: Annotations::new(),
            auto_generated: false,
        }
    }

    /// Creates a field from a key resolved by the [`crate::KeyAllocator`].
    pub fn from_key_record(ty: TypeId, name: impl Into<String>, record: FieldKeyRecord) -> Result<Self, KeyError> {
        Ok(Self::with_key(ty, name, record.narrow()?))
    }

    /// Creates a compiler-synthesized field named after its key.
    pub fn new_auto_generated(ty: TypeId, key: i32) -> Self {
        let mut field = Self::with_key(ty, Self::auto_string_name(key), key);
        field.auto_generated = true;
        field
    }

    /// Name given to a synthesized field, e.g. `str7` for key `7`.
    pub fn auto_string_name(key: i32) -> String {
        format!("str{key}")
    }

    pub fn ty(&self) -> TypeId {
        self.ty
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> i32 {
        self.key
    }

    pub fn requiredness(&self) -> Requiredness {
        self.requiredness
    }

    pub fn set_requiredness(&mut self, requiredness: Requiredness) {
        self.requiredness = requiredness;
    }

    pub fn default_value(&self) -> Option<&ConstValue> {
        self.default_value.as_ref()
    }

    pub fn set_default_value(&mut self, value: Option<ConstValue>) {
        self.default_value = value;
    }

    pub fn xsd_optional(&self) -> bool {
        self.xsd_optional
    }

    pub fn set_xsd_optional(&mut self, xsd_optional: bool) {
        self.xsd_optional = xsd_optional;
    }

    pub fn xsd_nillable(&self) -> bool {
        self.xsd_nillable
    }

    pub fn set_xsd_nillable(&mut self, xsd_nillable: bool) {
        self.xsd_nillable = xsd_nillable;
    }

    /// Structure describing the XSD attribute group of this field, if any.
    pub fn xsd_attrs(&self) -> Option<TypeId> {
        self.xsd_attrs
    }

    pub fn set_xsd_attrs(&mut self, xsd_attrs: Option<TypeId>) {
        self.xsd_attrs = xsd_attrs;
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.annotations
    }

    pub fn set_annotations(&mut self, annotations: Annotations) {
        self.annotations = annotations;
    }

    pub fn annotation(&self, name: &str) -> Option<&str> {
        self.annotations.get(name).map(String::as_str)
    }

    pub fn set_annotation(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.annotations.insert(name.into(), value.into());
    }

    pub fn auto_generated(&self) -> bool {
        self.auto_generated
    }

    pub fn set_auto_generated(&mut self, auto_generated: bool) {
        self.auto_generated = auto_generated;
    }

    pub fn has_key_annotation(&self) -> bool {
        self.annotations.contains_key(KEY_ANNOTATION.id)
    }

    pub fn has_hidden_annotation(&self) -> bool {
        self.annotations.contains_key(HIDDEN_ANNOTATION.id)
    }

    /// Contribution of this field to its structure's fingerprint: `<key>:[opt-]<type material>`.
    ///
    /// Only [`Requiredness::Optional`] is marked; required and opt-in-req-out fields
    /// produce the same material.
    pub fn fingerprint_material(&self, types: &impl TypeFingerprint) -> String {
        self.fingerprint_material_from(&types.fingerprint_material(self.ty))
    }

    pub(crate) fn fingerprint_material_from(&self, type_material: &str) -> String {
        let optional = if self.requiredness == Requiredness::Optional { "opt-" } else { "" };
        format!("{}:{}{}", self.key, optional, type_material)
    }

    /// Orders fields by ascending key. Equal keys compare equal; duplicates are
    /// rejected by [`crate::StructDef::append`], not here.
    pub fn key_compare(a: &Field, b: &Field) -> Ordering {
        a.key.cmp(&b.key)
    }

    /// Strict "less than" form of [`Field::key_compare`].
    pub fn key_less(a: &Field, b: &Field) -> bool {
        a.key < b.key
    }
}
