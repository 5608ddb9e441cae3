use std::collections::HashMap;

use log::{debug, warn};
use miette::Diagnostic;
use slotmap::{HopSlotMap, new_key_type};
use thiserror::Error;

use crate::{Field, Requiredness};

new_key_type! {
    /// Handle to a node of the [`TypeGraph`]. Copying it never copies the type.
    pub struct TypeId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Void,
    String,
    Binary,
    Bool,
    Byte,
    I16,
    I32,
    I64,
    Double,
}

impl BaseType {
    pub const ALL: [BaseType; 9] = [
        BaseType::Void,
        BaseType::String,
        BaseType::Binary,
        BaseType::Bool,
        BaseType::Byte,
        BaseType::I16,
        BaseType::I32,
        BaseType::I64,
        BaseType::Double,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BaseType::Void => "void",
            BaseType::String => "string",
            BaseType::Binary => "binary",
            BaseType::Bool => "bool",
            BaseType::Byte => "byte",
            BaseType::I16 => "i16",
            BaseType::I32 => "i32",
            BaseType::I64 => "i64",
            BaseType::Double => "double",
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, BaseType::Bool | BaseType::Byte | BaseType::I16 | BaseType::I32 | BaseType::I64)
    }
}

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
#[error("`{0}` is not a base type")]
#[diagnostic(code(tidl::types::unknown_base_type))]
pub struct UnknownBaseType(pub String);

impl TryFrom<&str> for BaseType {
    type Error = UnknownBaseType;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let s = s.trim();
        BaseType::ALL.into_iter().find(|b| b.name() == s).ok_or_else(|| UnknownBaseType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructKind {
    Struct,
    Union,
    Exception,
}

impl std::fmt::Display for StructKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StructKind::Struct => "struct",
            StructKind::Union => "union",
            StructKind::Exception => "exception",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum StructError {
    #[error("Field `{field}` in `{struct_name}` reuses key {key} of field `{existing}`")]
    #[diagnostic(code(tidl::struct_def::duplicate_key), help("every field of a structure needs its own key"))]
    DuplicateKey {
        struct_name: String,
        field: String,
        existing: String,
        key: i32,
    },
    #[error("Duplicate field `{field}` in `{struct_name}`")]
    #[diagnostic(code(tidl::struct_def::duplicate_name))]
    DuplicateName { struct_name: String, field: String },
    #[error("Field `{field}` provides another default value for union `{struct_name}`")]
    #[diagnostic(code(tidl::struct_def::union_default), help("a union may default at most one member"))]
    UnionDefault { struct_name: String, field: String },
}

/// A struct, union or exception together with the fields it owns.
#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    name: String,
    kind: StructKind,
    members: Vec<Field>,
    /// Indices into `members`, ascending by key.
    key_order: Vec<usize>,
}

impl StructDef {
    pub fn new(name: impl Into<String>, kind: StructKind) -> Self {
        Self {
            name: name.into(),
            kind,
            members: Vec::new(),
            key_order: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StructKind {
        self.kind
    }

    pub fn is_union(&self) -> bool {
        self.kind == StructKind::Union
    }

    /// Adds a member, keeping the key-ordered view sorted.
    ///
    /// Union members are forced to [`Requiredness::Optional`].
    pub fn append(&mut self, mut field: Field) -> Result<(), StructError> {
        let lower = self.key_order.partition_point(|&i| Field::key_less(&self.members[i], &field));
        let upper = self.key_order.partition_point(|&i| !Field::key_less(&field, &self.members[i]));
        if lower != upper {
            let existing = &self.members[self.key_order[lower]];
            return Err(StructError::DuplicateKey {
                struct_name: self.name.clone(),
                field: field.name().to_string(),
                existing: existing.name().to_string(),
                key: field.key(),
            });
        }
        if self.member(field.name()).is_some() {
            return Err(StructError::DuplicateName {
                struct_name: self.name.clone(),
                field: field.name().to_string(),
            });
        }
        if self.is_union() {
            self.validate_union_member(&mut field)?;
        }

        debug!("Appending field `{}` (key {}) to `{}`", field.name(), field.key(), self.name);
        self.members.push(field);
        self.key_order.insert(upper, self.members.len() - 1);
        Ok(())
    }

    fn validate_union_member(&self, field: &mut Field) -> Result<(), StructError> {
        if field.requiredness() != Requiredness::Optional {
            if field.requiredness() == Requiredness::Required {
                warn!(
                    "Union `{}` field `{}`: union members must be optional, ignoring specified requiredness",
                    self.name,
                    field.name()
                );
            }
            field.set_requiredness(Requiredness::Optional);
        }
        if field.default_value().is_some() && self.members.iter().any(|m| m.default_value().is_some()) {
            return Err(StructError::UnionDefault {
                struct_name: self.name.clone(),
                field: field.name().to_string(),
            });
        }
        Ok(())
    }

    /// Members in declaration order.
    pub fn members(&self) -> &[Field] {
        &self.members
    }

    /// Members in ascending key order.
    pub fn members_in_key_order(&self) -> impl Iterator<Item = &Field> + '_ {
        self.key_order.iter().map(|&i| &self.members[i])
    }

    pub fn member(&self, name: &str) -> Option<&Field> {
        self.members.iter().find(|f| f.name() == name)
    }

    /// Mutable access for later passes. The key and name of a field cannot change,
    /// so the key-ordered view stays valid.
    pub fn member_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.members.iter_mut().find(|f| f.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<(String, i64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Base(BaseType),
    List(TypeId),
    Set(TypeId),
    Map { key: TypeId, value: TypeId },
    Enum(EnumDef),
    Typedef { name: String, target: TypeId },
    Struct(StructDef),
}

impl TypeKind {
    /// Declared name for named types.
    pub fn declared_name(&self) -> Option<&str> {
        match self {
            TypeKind::Enum(def) => Some(&def.name),
            TypeKind::Typedef { name, .. } => Some(name),
            TypeKind::Struct(def) => Some(def.name()),
            _ => None,
        }
    }
}

/// Anything that can produce the fingerprint material of a type handle.
pub trait TypeFingerprint {
    fn fingerprint_material(&self, ty: TypeId) -> String;
}

const UNKNOWN_TYPE_MATERIAL: &str = "(unknown)";

/// Arena owning every type of a compilation unit.
#[derive(Debug, Clone)]
pub struct TypeGraph {
    types: HopSlotMap<TypeId, TypeKind>,
    base_ids: HashMap<BaseType, TypeId>,
    /// Named types in declaration order.
    declared: Vec<TypeId>,
}

impl TypeGraph {
    pub fn new() -> Self {
        let mut types = HopSlotMap::with_key();
        let base_ids = BaseType::ALL.into_iter().map(|base| (base, types.insert(TypeKind::Base(base)))).collect();
        Self {
            types,
            base_ids,
            declared: Vec::new(),
        }
    }

    pub fn base(&self, base: BaseType) -> TypeId {
        self.base_ids[&base]
    }

    pub fn list_of(&mut self, elem: TypeId) -> TypeId {
        self.types.insert(TypeKind::List(elem))
    }

    pub fn set_of(&mut self, elem: TypeId) -> TypeId {
        self.types.insert(TypeKind::Set(elem))
    }

    pub fn map_of(&mut self, key: TypeId, value: TypeId) -> TypeId {
        self.types.insert(TypeKind::Map { key, value })
    }

    pub fn add_enum(&mut self, def: EnumDef) -> TypeId {
        self.declare(TypeKind::Enum(def))
    }

    pub fn add_typedef(&mut self, name: impl Into<String>, target: TypeId) -> TypeId {
        self.declare(TypeKind::Typedef { name: name.into(), target })
    }

    pub fn add_struct(&mut self, def: StructDef) -> TypeId {
        self.declare(TypeKind::Struct(def))
    }

    fn declare(&mut self, kind: TypeKind) -> TypeId {
        let id = self.types.insert(kind);
        self.declared.push(id);
        id
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeKind> {
        self.types.get(id)
    }

    pub fn struct_def(&self, id: TypeId) -> Option<&StructDef> {
        match self.types.get(id) {
            Some(TypeKind::Struct(def)) => Some(def),
            _ => None,
        }
    }

    pub fn struct_def_mut(&mut self, id: TypeId) -> Option<&mut StructDef> {
        match self.types.get_mut(id) {
            Some(TypeKind::Struct(def)) => Some(def),
            _ => None,
        }
    }

    pub fn struct_ids(&self) -> Vec<TypeId> {
        self.declared.iter().copied().filter(|&id| self.struct_def(id).is_some()).collect()
    }

    pub fn find(&self, name: &str) -> Option<TypeId> {
        self.declared
            .iter()
            .copied()
            .find(|&id| self.types.get(id).and_then(TypeKind::declared_name) == Some(name))
    }

    /// Follows typedefs down to the type they name.
    pub fn resolve_typedefs(&self, mut id: TypeId) -> TypeId {
        // Typedef targets are declared before the typedef, so the chain is finite.
        while let Some(TypeKind::Typedef { target, .. }) = self.types.get(id) {
            id = *target;
        }
        id
    }

    /// Human-readable name of a type, as it would be written in source.
    pub fn type_name(&self, id: TypeId) -> String {
        match self.types.get(id) {
            None => UNKNOWN_TYPE_MATERIAL.to_string(),
            Some(TypeKind::Base(base)) => base.name().to_string(),
            Some(TypeKind::List(elem)) => format!("list<{}>", self.type_name(*elem)),
            Some(TypeKind::Set(elem)) => format!("set<{}>", self.type_name(*elem)),
            Some(TypeKind::Map { key, value }) => format!("map<{}, {}>", self.type_name(*key), self.type_name(*value)),
            Some(named) => named.declared_name().unwrap_or(UNKNOWN_TYPE_MATERIAL).to_string(),
        }
    }

    fn material(&self, id: TypeId, in_progress: &mut Vec<TypeId>) -> String {
        match self.types.get(id) {
            None => UNKNOWN_TYPE_MATERIAL.to_string(),
            Some(TypeKind::Base(base)) => base.name().to_string(),
            Some(TypeKind::List(elem)) => format!("list<{}>", self.material(*elem, in_progress)),
            Some(TypeKind::Set(elem)) => format!("set<{}>", self.material(*elem, in_progress)),
            Some(TypeKind::Map { key, value }) => {
                format!("map<{},{}>", self.material(*key, in_progress), self.material(*value, in_progress))
            }
            Some(TypeKind::Enum(_)) => "enum".to_string(),
            Some(TypeKind::Typedef { target, .. }) => self.material(*target, in_progress),
            Some(TypeKind::Struct(def)) => {
                if in_progress.contains(&id) {
                    return format!("@{}", def.name());
                }
                in_progress.push(id);
                let mut material = String::from("{");
                for field in def.members_in_key_order() {
                    let type_material = self.material(field.ty(), in_progress);
                    material.push_str(&field.fingerprint_material_from(&type_material));
                    material.push(';');
                }
                material.push('}');
                in_progress.pop();
                material
            }
        }
    }
}

impl Default for TypeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeFingerprint for TypeGraph {
    fn fingerprint_material(&self, ty: TypeId) -> String {
        self.material(ty, &mut Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConstValue;

    #[test]
    fn test_base_types_are_interned() {
        let graph = TypeGraph::new();
        assert_eq!(graph.base(BaseType::I32), graph.base(BaseType::I32));
        assert_ne!(graph.base(BaseType::I32), graph.base(BaseType::I64));
        assert_eq!(BaseType::try_from(" double "), Ok(BaseType::Double));
        assert_eq!(BaseType::try_from(" float"), Err(UnknownBaseType("float".to_string())));
    }

    #[test]
    fn test_container_material() {
        let mut graph = TypeGraph::new();
        let string = graph.base(BaseType::String);
        let list = graph.list_of(string);
        let set = graph.set_of(graph.base(BaseType::I16));
        let map = graph.map_of(string, list);
        assert_eq!(graph.fingerprint_material(set), "set<i16>");
        assert_eq!(graph.fingerprint_material(map), "map<string,list<string>>");
        assert_eq!(graph.type_name(map), "map<string, list<string>>");
    }

    #[test]
    fn test_typedef_and_enum_material() {
        let mut graph = TypeGraph::new();
        let user_id = graph.add_typedef("UserId", graph.base(BaseType::I64));
        let color = graph.add_enum(EnumDef {
            name: "Color".to_string(),
            values: vec![("RED".to_string(), 1)],
        });
        assert_eq!(graph.fingerprint_material(user_id), "i64");
        assert_eq!(graph.fingerprint_material(color), "enum");
        assert_eq!(graph.resolve_typedefs(user_id), graph.base(BaseType::I64));
        assert_eq!(graph.find("Color"), Some(color));
        assert_eq!(graph.find("Missing"), None);
    }

    #[test]
    fn test_append_keeps_key_order() {
        let graph = TypeGraph::new();
        let i32_ty = graph.base(BaseType::I32);
        let mut def = StructDef::new("Point", StructKind::Struct);
        def.append(Field::with_key(i32_ty, "z", 3)).unwrap();
        def.append(Field::with_key(i32_ty, "x", 1)).unwrap();
        def.append(Field::with_key(i32_ty, "y", 2)).unwrap();

        let declared: Vec<_> = def.members().iter().map(Field::name).collect();
        let by_key: Vec<_> = def.members_in_key_order().map(Field::name).collect();
        assert_eq!(declared, vec!["z", "x", "y"]);
        assert_eq!(by_key, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_append_rejects_duplicates() {
        let graph = TypeGraph::new();
        let i32_ty = graph.base(BaseType::I32);
        let mut def = StructDef::new("Point", StructKind::Struct);
        def.append(Field::with_key(i32_ty, "x", 1)).unwrap();

        assert_eq!(
            def.append(Field::with_key(i32_ty, "y", 1)),
            Err(StructError::DuplicateKey {
                struct_name: "Point".to_string(),
                field: "y".to_string(),
                existing: "x".to_string(),
                key: 1,
            })
        );
        assert_eq!(
            def.append(Field::with_key(i32_ty, "x", 2)),
            Err(StructError::DuplicateName {
                struct_name: "Point".to_string(),
                field: "x".to_string(),
            })
        );
        assert_eq!(def.members().len(), 1);
    }

    #[test]
    fn test_union_members_become_optional() {
        let graph = TypeGraph::new();
        let string = graph.base(BaseType::String);
        let mut def = StructDef::new("Value", StructKind::Union);

        let mut required = Field::with_key(string, "text", 1);
        required.set_requiredness(Requiredness::Required);
        def.append(required).unwrap();
        def.append(Field::with_key(string, "other", 2)).unwrap();

        assert!(def.members().iter().all(|f| f.requiredness() == Requiredness::Optional));
    }

    #[test]
    fn test_union_allows_single_default() {
        let graph = TypeGraph::new();
        let string = graph.base(BaseType::String);
        let mut def = StructDef::new("Value", StructKind::Union);

        let mut first = Field::with_key(string, "a", 1);
        first.set_default_value(Some(ConstValue::String("x".to_string())));
        def.append(first).unwrap();

        let mut second = Field::with_key(string, "b", 2);
        second.set_default_value(Some(ConstValue::String("y".to_string())));
        assert!(matches!(def.append(second), Err(StructError::UnionDefault { .. })));
    }

    #[test]
    fn test_struct_material_sorted_by_key() {
        let mut graph = TypeGraph::new();
        let i32_ty = graph.base(BaseType::I32);
        let mut def = StructDef::new("S", StructKind::Struct);
        def.append(Field::with_key(i32_ty, "c", 3)).unwrap();
        def.append(Field::with_key(i32_ty, "a", 1)).unwrap();
        let mut b = Field::with_key(graph.base(BaseType::String), "b", 2);
        b.set_requiredness(Requiredness::Optional);
        def.append(b).unwrap();
        let id = graph.add_struct(def);

        assert_eq!(graph.fingerprint_material(id), "{1:i32;2:opt-string;3:i32;}");
    }

    #[test]
    fn test_recursive_struct_material_terminates() {
        let mut graph = TypeGraph::new();
        let node = graph.add_struct(StructDef::new("Node", StructKind::Struct));
        let children = graph.list_of(node);
        let def = graph.struct_def_mut(node).unwrap();
        def.append(Field::with_key(children, "children", 1)).unwrap();

        assert_eq!(graph.fingerprint_material(node), "{1:list<@Node>;}");
    }

    #[test]
    fn test_nested_struct_material() {
        let mut graph = TypeGraph::new();
        let mut inner = StructDef::new("Inner", StructKind::Struct);
        inner.append(Field::with_key(graph.base(BaseType::Bool), "flag", 1)).unwrap();
        let inner = graph.add_struct(inner);
        let mut outer = StructDef::new("Outer", StructKind::Exception);
        outer.append(Field::with_key(inner, "inner", 1)).unwrap();
        let outer = graph.add_struct(outer);

        assert_eq!(graph.fingerprint_material(outer), "{1:{1:bool;};}");
        assert_eq!(graph.struct_ids(), vec![inner, outer]);
    }
}
