use log::debug;
use miette::Diagnostic;
use thiserror::Error;

use crate::{BaseType, ConstValue, Field, StructDef, TypeGraph, TypeId, TypeKind};

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum SemanticAnalyzerError {
    #[error("Field `{field}` in `{struct_name}` uses `{found}` for its XSD attributes, which is not a structure")]
    #[diagnostic(code(tidl::semantic::xsd_attrs))]
    XsdAttrsNotStruct { struct_name: String, field: String, found: String },
    #[error("Default value {value} does not match type `{ty}` of field `{field}` in `{struct_name}`")]
    #[diagnostic(code(tidl::semantic::default_type))]
    DefaultTypeMismatch {
        struct_name: String,
        field: String,
        ty: String,
        value: String,
    },
}

/// Checks the fields of every structure once the type graph is complete.
pub struct SemanticAnalyzer {}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self {}
    }

    pub fn analyze(&self, graph: &TypeGraph) -> Result<(), Vec<SemanticAnalyzerError>> {
        let mut errors = Vec::new();
        for id in graph.struct_ids() {
            let Some(def) = graph.struct_def(id) else {
                continue;
            };
            debug!("Checking {} `{}` ({} fields)", def.kind(), def.name(), def.members().len());
            for field in def.members() {
                Self::check_field(graph, def, field, &mut errors);
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    fn check_field(graph: &TypeGraph, def: &StructDef, field: &Field, errors: &mut Vec<SemanticAnalyzerError>) {
        if let Some(attrs) = field.xsd_attrs()
            && graph.struct_def(attrs).is_none()
        {
            errors.push(SemanticAnalyzerError::XsdAttrsNotStruct {
                struct_name: def.name().to_string(),
                field: field.name().to_string(),
                found: graph.type_name(attrs),
            });
        }

        if let Some(value) = field.default_value()
            && !Self::default_matches(graph, field.ty(), value)
        {
            errors.push(SemanticAnalyzerError::DefaultTypeMismatch {
                struct_name: def.name().to_string(),
                field: field.name().to_string(),
                ty: graph.type_name(field.ty()),
                value: value.to_string(),
            });
        }
    }

    fn default_matches(graph: &TypeGraph, ty: TypeId, value: &ConstValue) -> bool {
        // Named constants are resolved by the parser; accept them here.
        if matches!(value, ConstValue::Identifier(_)) {
            return true;
        }
        let Some(kind) = graph.get(graph.resolve_typedefs(ty)) else {
            return false;
        };
        match (kind, value) {
            (TypeKind::Base(BaseType::String | BaseType::Binary), ConstValue::String(_)) => true,
            (TypeKind::Base(BaseType::Double), ConstValue::Integer(_) | ConstValue::Double(_)) => true,
            (TypeKind::Base(base), ConstValue::Integer(_)) => base.is_integral(),
            (TypeKind::Enum(_), ConstValue::Integer(_)) => true,
            (TypeKind::List(elem) | TypeKind::Set(elem), ConstValue::List(items)) => items.iter().all(|item| Self::default_matches(graph, *elem, item)),
            (TypeKind::Map { key, value: val }, ConstValue::Map(entries)) => entries
                .iter()
                .all(|(k, v)| Self::default_matches(graph, *key, k) && Self::default_matches(graph, *val, v)),
            (TypeKind::Struct(def), ConstValue::Map(entries)) => entries.iter().all(|(k, v)| match k {
                ConstValue::String(member) => def.member(member).is_some_and(|m| Self::default_matches(graph, m.ty(), v)),
                _ => false,
            }),
            _ => false,
        }
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
