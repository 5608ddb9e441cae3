use std::collections::{BTreeMap, HashSet};

use config::TidlConfig;
use lang::{
    Annotations, BaseType, ConstValue, EnumDef, Field, KeyAllocator, KeyError, KeyPolicy, Requiredness, StructDef, StructError, StructKind, TypeGraph, TypeId,
    builtin_annotation,
};
use log::debug;
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

/// Schema document accepted by the CLI (YAML or JSON).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    #[serde(default)]
    pub enums: Vec<EnumDecl>,
    #[serde(default)]
    pub typedefs: Vec<TypedefDecl>,
    #[serde(default)]
    pub structs: Vec<StructDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumDecl {
    pub name: String,
    /// Values are numbered from zero in declaration order.
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypedefDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructKindDecl {
    #[default]
    Struct,
    Union,
    Exception,
}

impl From<StructKindDecl> for StructKind {
    fn from(kind: StructKindDecl) -> Self {
        match kind {
            StructKindDecl::Struct => StructKind::Struct,
            StructKindDecl::Union => StructKind::Union,
            StructKindDecl::Exception => StructKind::Exception,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructDecl {
    pub name: String,
    #[serde(default)]
    pub kind: StructKindDecl,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDecl {
    pub name: Option<String>,
    pub key: Option<i64>,
    #[serde(rename = "type")]
    pub ty: String,
    pub requiredness: Option<String>,
    /// Literal default value.
    pub default: Option<serde_json::Value>,
    /// Default given as a reference to a named constant, e.g. `Color.RED`.
    pub default_const: Option<String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub xsd_optional: bool,
    #[serde(default)]
    pub xsd_nillable: bool,
    pub xsd_attrs: Option<String>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum LoadError {
    #[error("Type `{0}` is declared more than once")]
    #[diagnostic(code(tidl::load::duplicate_type))]
    DuplicateType(String),
    #[error("Unknown type `{ty}` used by `{context}`")]
    #[diagnostic(code(tidl::load::unknown_type))]
    UnknownType { ty: String, context: String },
    #[error("Malformed type expression `{expr}` used by `{context}`")]
    #[diagnostic(code(tidl::load::malformed_type), help("expected a base type, a declared name, `list<T>`, `set<T>` or `map<K, V>`"))]
    MalformedType { expr: String, context: String },
    #[error("Invalid requiredness `{value}` for field `{field}`")]
    #[diagnostic(code(tidl::load::requiredness), help("use one of `required`, `optional` or `default`"))]
    InvalidRequiredness { field: String, value: String },
    #[error("Field with key {key} in `{struct_name}` has no name")]
    #[diagnostic(code(tidl::load::missing_name), help("name the field, or enable `extensions.auto_generated_fields` to synthesize one"))]
    MissingFieldName { struct_name: String, key: i64 },
    #[error("Invalid default for field `{field}`: {reason}")]
    #[diagnostic(code(tidl::load::default))]
    InvalidDefault { field: String, reason: String },
    #[error(transparent)]
    #[diagnostic(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Struct(#[from] StructError),
}

/// Builds a [`TypeGraph`] from a [`SchemaDocument`], assigning field keys on the way.
pub struct SchemaLoader {
    keys: KeyAllocator,
    auto_generated_fields: bool,
}

impl SchemaLoader {
    pub fn new(config: &TidlConfig) -> Self {
        let policy = KeyPolicy {
            allow_negative_keys: config.keys.allow_negative_keys,
            strict_implicit_keys: config.keys.strict_implicit_keys,
        };
        Self {
            keys: KeyAllocator::new(policy),
            auto_generated_fields: config.extensions.auto_generated_fields,
        }
    }

    pub fn load(&mut self, doc: &SchemaDocument) -> Result<TypeGraph, Vec<LoadError>> {
        let mut graph = TypeGraph::new();
        let mut errors = Vec::new();

        let mut seen = HashSet::new();
        let names = doc.enums.iter().map(|e| &e.name).chain(doc.typedefs.iter().map(|t| &t.name)).chain(doc.structs.iter().map(|s| &s.name));
        for name in names {
            if !seen.insert(name.as_str()) {
                errors.push(LoadError::DuplicateType(name.clone()));
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        for decl in &doc.enums {
            let values = decl.values.iter().cloned().zip(0..).collect();
            graph.add_enum(EnumDef {
                name: decl.name.clone(),
                values,
            });
        }

        // Structs are declared empty first so fields can refer to any of them.
        let struct_ids: Vec<TypeId> = doc.structs.iter().map(|decl| graph.add_struct(StructDef::new(decl.name.clone(), decl.kind.into()))).collect();

        errors.extend(Self::declare_typedefs(&mut graph, &doc.typedefs));

        for (decl, id) in doc.structs.iter().zip(struct_ids) {
            self.keys.reset();
            for field_decl in &decl.fields {
                let appended = self
                    .build_field(&mut graph, decl, field_decl)
                    .and_then(|field| graph.struct_def_mut(id).map_or(Ok(()), |def| def.append(field)).map_err(LoadError::from));
                if let Err(e) = appended {
                    errors.push(e);
                }
            }
        }

        if errors.is_empty() { Ok(graph) } else { Err(errors) }
    }

    /// Declares typedefs in dependency order, so a typedef may name one declared
    /// later in the document. Typedefs that never resolve (unknown names, cycles)
    /// report the error of their last attempt.
    fn declare_typedefs(graph: &mut TypeGraph, typedefs: &[TypedefDecl]) -> Vec<LoadError> {
        let mut pending: Vec<&TypedefDecl> = typedefs.iter().collect();
        loop {
            let attempted = pending.len();
            let mut deferred = Vec::new();
            let mut failures = Vec::new();
            for decl in pending {
                match Self::parse_type(graph, &decl.ty, &decl.name) {
                    Ok(target) => {
                        graph.add_typedef(decl.name.clone(), target);
                    }
                    Err(e) => {
                        deferred.push(decl);
                        failures.push(e);
                    }
                }
            }
            if deferred.is_empty() || deferred.len() == attempted {
                return failures;
            }
            debug!("Deferring {} typedef(s) to a later pass", deferred.len());
            pending = deferred;
        }
    }

    fn build_field(&mut self, graph: &mut TypeGraph, decl: &StructDecl, field_decl: &FieldDecl) -> Result<Field, LoadError> {
        let display_name = field_decl.name.clone().unwrap_or_else(|| "<unnamed>".to_string());
        let context = format!("{}.{}", decl.name, display_name);
        let ty = Self::parse_type(graph, &field_decl.ty, &context)?;
        let record = self.keys.resolve(field_decl.key, &display_name)?;

        let mut field = match &field_decl.name {
            Some(name) => Field::from_key_record(ty, name.clone(), record)?,
            None if self.auto_generated_fields => Field::new_auto_generated(ty, record.narrow()?),
            None => {
                return Err(LoadError::MissingFieldName {
                    struct_name: decl.name.clone(),
                    key: record.key,
                });
            }
        };

        if let Some(value) = &field_decl.requiredness {
            let requiredness = Requiredness::try_from(value.as_str()).map_err(|e| LoadError::InvalidRequiredness {
                field: context.clone(),
                value: e.0,
            })?;
            field.set_requiredness(requiredness);
        }

        let default = match (&field_decl.default, &field_decl.default_const) {
            (Some(_), Some(_)) => {
                return Err(LoadError::InvalidDefault {
                    field: context,
                    reason: "`default` and `default_const` are mutually exclusive".to_string(),
                });
            }
            (Some(value), None) => Some(Self::const_value(value).map_err(|reason| LoadError::InvalidDefault { field: context.clone(), reason })?),
            (None, Some(name)) => Some(ConstValue::Identifier(name.clone())),
            (None, None) => None,
        };
        field.set_default_value(default);

        let annotations: Annotations = field_decl.annotations.clone();
        for name in annotations.keys().filter(|name| builtin_annotation(name).is_some()) {
            debug!("Field `{}` carries built-in annotation `{}`", context, name);
        }
        field.set_annotations(annotations);
        field.set_xsd_optional(field_decl.xsd_optional);
        field.set_xsd_nillable(field_decl.xsd_nillable);
        if let Some(attrs) = &field_decl.xsd_attrs {
            field.set_xsd_attrs(Some(Self::parse_type(graph, attrs, &context)?));
        }

        Ok(field)
    }

    /// Resolves a type expression such as `map<string, list<Item>>`.
    pub fn parse_type(graph: &mut TypeGraph, expr: &str, context: &str) -> Result<TypeId, LoadError> {
        let expr = expr.trim();
        let malformed = || LoadError::MalformedType {
            expr: expr.to_string(),
            context: context.to_string(),
        };

        if let Some((container, inner)) = expr.split_once('<') {
            let inner = inner.strip_suffix('>').ok_or_else(malformed)?;
            return match container.trim() {
                "list" => {
                    let elem = Self::parse_type(graph, inner, context)?;
                    Ok(graph.list_of(elem))
                }
                "set" => {
                    let elem = Self::parse_type(graph, inner, context)?;
                    Ok(graph.set_of(elem))
                }
                "map" => {
                    let (key, value) = split_top_level_comma(inner).ok_or_else(malformed)?;
                    let key = Self::parse_type(graph, key, context)?;
                    let value = Self::parse_type(graph, value, context)?;
                    Ok(graph.map_of(key, value))
                }
                _ => Err(malformed()),
            };
        }

        if expr.is_empty() || expr.contains(['>', ',']) {
            return Err(malformed());
        }
        if let Ok(base) = BaseType::try_from(expr) {
            return Ok(graph.base(base));
        }
        graph.find(expr).ok_or_else(|| LoadError::UnknownType {
            ty: expr.to_string(),
            context: context.to_string(),
        })
    }

    fn const_value(value: &serde_json::Value) -> Result<ConstValue, String> {
        use serde_json::Value;

        match value {
            Value::Null => Err("null is not a constant".to_string()),
            Value::Bool(b) => Ok(ConstValue::Integer(i64::from(*b))),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(ConstValue::Integer(i)),
                None => n.as_f64().map(ConstValue::Double).ok_or_else(|| format!("number {n} is out of range")),
            },
            Value::String(s) => Ok(ConstValue::String(s.clone())),
            Value::Array(items) => items.iter().map(Self::const_value).collect::<Result<Vec<_>, _>>().map(ConstValue::List),
            Value::Object(entries) => entries
                .iter()
                .map(|(k, v)| Self::const_value(v).map(|v| (ConstValue::String(k.clone()), v)))
                .collect::<Result<Vec<_>, _>>()
                .map(ConstValue::Map),
        }
    }
}

/// Splits `K, V` at the comma that is not nested inside `<...>`.
fn split_top_level_comma(s: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => return Some((&s[..i], &s[i + 1..])),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use lang::{StructFingerprint, TypeFingerprint};

    use super::*;

    fn load(src: &str, config: &TidlConfig) -> Result<TypeGraph, Vec<LoadError>> {
        let doc: SchemaDocument = serde_yaml::from_str(src).unwrap();
        SchemaLoader::new(config).load(&doc)
    }

    #[test]
    fn test_load_struct_with_forward_reference() {
        let src = indoc! {r#"
            typedefs:
              - name: Tags
                type: list<string>
            structs:
              - name: Order
                fields:
                  - { name: items, key: 2, type: "map<string, Item>" }
                  - { name: id, key: 1, type: i64, requiredness: required }
                  - { name: tags, key: 3, type: Tags, requiredness: optional }
              - name: Item
                fields:
                  - { name: sku, key: 1, type: string }
        "#};
        let graph = load(src, &TidlConfig::default()).unwrap();
        let order = graph.find("Order").unwrap();
        let def = graph.struct_def(order).unwrap();
        assert_eq!(def.member("id").unwrap().requiredness(), Requiredness::Required);
        assert_eq!(graph.fingerprint_material(order), "{1:i64;2:map<string,{1:string;}>;3:opt-list<string>;}");
        assert!(StructFingerprint::compute(&graph, order).is_some());
    }

    #[test]
    fn test_implicit_keys_are_auto_assigned() {
        let src = indoc! {r#"
            structs:
              - name: Legacy
                fields:
                  - { name: a, type: i32 }
                  - { name: b, key: 1, type: i32 }
                  - { name: c, type: i32 }
        "#};
        let graph = load(src, &TidlConfig::default()).unwrap();
        let def = graph.struct_def(graph.find("Legacy").unwrap()).unwrap();
        let keys: Vec<_> = def.members_in_key_order().map(|f| (f.name(), f.key())).collect();
        assert_eq!(keys, vec![("c", -2), ("a", -1), ("b", 1)]);
    }

    #[test]
    fn test_unnamed_field_needs_extension() {
        let src = indoc! {r#"
            structs:
              - name: Log
                fields:
                  - { key: 4, type: string }
        "#};
        let errors = load(src, &TidlConfig::default()).unwrap_err();
        assert!(matches!(errors.as_slice(), [LoadError::MissingFieldName { key: 4, .. }]));

        let mut config = TidlConfig::default();
        config.extensions.auto_generated_fields = true;
        let graph = load(src, &config).unwrap();
        let field = &graph.struct_def(graph.find("Log").unwrap()).unwrap().members()[0];
        assert_eq!(field.name(), "str4");
        assert!(field.auto_generated());
    }

    #[test]
    fn test_errors_are_collected_per_field() {
        let src = indoc! {r#"
            structs:
              - name: Broken
                fields:
                  - { name: a, key: 1, type: Missing }
                  - { name: b, key: 1, type: i32 }
                  - { name: c, key: 1, type: i32 }
                  - { name: d, key: 2, type: "list<i32", requiredness: sometimes }
        "#};
        let errors = load(src, &TidlConfig::default()).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(matches!(&errors[0], LoadError::UnknownType { ty, .. } if ty == "Missing"));
        assert!(matches!(&errors[1], LoadError::Struct(StructError::DuplicateKey { key: 1, .. })));
        assert!(matches!(&errors[2], LoadError::MalformedType { .. }));
    }

    #[test]
    fn test_strict_keys_from_config() {
        let src = indoc! {r#"
            structs:
              - name: S
                fields:
                  - { name: a, type: i32 }
        "#};
        let mut config = TidlConfig::default();
        config.keys.strict_implicit_keys = true;
        let errors = load(src, &config).unwrap_err();
        assert!(matches!(&errors[0], LoadError::Key(KeyError::ImplicitKey { field }) if field == "a"));
    }

    #[test]
    fn test_typedefs_may_name_later_typedefs() {
        let src = indoc! {r#"
            typedefs:
              - { name: Ids, type: list<Id> }
              - { name: Id, type: UserId }
              - { name: UserId, type: i64 }
            structs:
              - name: Group
                fields:
                  - { name: members, key: 1, type: Ids }
        "#};
        let graph = load(src, &TidlConfig::default()).unwrap();
        assert_eq!(graph.fingerprint_material(graph.find("Group").unwrap()), "{1:list<i64>;}");
    }

    #[test]
    fn test_typedef_cycle_is_reported() {
        let src = indoc! {r#"
            typedefs:
              - { name: A, type: B }
              - { name: B, type: A }
        "#};
        let errors = load(src, &TidlConfig::default()).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, LoadError::UnknownType { .. })));
    }

    #[test]
    fn test_extreme_negative_keys_are_load_errors() {
        let src = indoc! {r#"
            structs:
              - name: Edge
                fields:
                  - { name: a, key: -9223372036854775808, type: i32 }
                  - { name: b, key: -2147483648, type: i32 }
                  - { name: c, type: i32 }
        "#};
        let mut config = TidlConfig::default();
        config.keys.allow_negative_keys = true;
        let errors = load(src, &config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(&errors[0], LoadError::Key(KeyError::OutOfRange { key: i64::MIN })));
        assert!(matches!(&errors[1], LoadError::Key(KeyError::OutOfRange { key: -2147483649 })));
    }

    #[test]
    fn test_invalid_requiredness() {
        let src = indoc! {r#"
            structs:
              - name: S
                fields:
                  - { name: a, key: 1, type: i32, requiredness: " sometimes" }
        "#};
        let errors = load(src, &TidlConfig::default()).unwrap_err();
        assert!(matches!(&errors[0], LoadError::InvalidRequiredness { field, value } if field == "S.a" && value == "sometimes"));
    }

    #[test]
    fn test_duplicate_type_names() {
        let src = indoc! {r#"
            enums:
              - { name: Thing, values: [A] }
            structs:
              - { name: Thing }
        "#};
        let errors = load(src, &TidlConfig::default()).unwrap_err();
        assert!(matches!(&errors[0], LoadError::DuplicateType(name) if name == "Thing"));
    }

    #[test]
    fn test_defaults_and_annotations() {
        let src = indoc! {r#"
            enums:
              - { name: Color, values: [RED, GREEN] }
            structs:
              - name: Pixel
                fields:
                  - { name: color, key: 1, type: Color, default_const: Color.GREEN, annotations: { key: PixelTable } }
                  - { name: alpha, key: 2, type: double, default: 0.5, annotations: { hidden: "1" } }
                  - { name: meta, key: 3, type: "map<string, i32>", default: { a: 1 } }
        "#};
        let graph = load(src, &TidlConfig::default()).unwrap();
        let def = graph.struct_def(graph.find("Pixel").unwrap()).unwrap();

        let color = def.member("color").unwrap();
        assert_eq!(color.default_value(), Some(&ConstValue::Identifier("Color.GREEN".to_string())));
        assert!(color.has_key_annotation());
        assert!(!color.has_hidden_annotation());

        let alpha = def.member("alpha").unwrap();
        assert_eq!(alpha.default_value(), Some(&ConstValue::Double(0.5)));
        assert!(alpha.has_hidden_annotation());

        let meta = def.member("meta").unwrap();
        assert_eq!(
            meta.default_value(),
            Some(&ConstValue::Map(vec![(ConstValue::String("a".to_string()), ConstValue::Integer(1))]))
        );
    }

    #[test]
    fn test_parse_type_expressions() {
        let mut graph = TypeGraph::new();
        let nested = SchemaLoader::parse_type(&mut graph, "map<list<i32>, map<string, set<bool>>>", "t").unwrap();
        assert_eq!(graph.type_name(nested), "map<list<i32>, map<string, set<bool>>>");

        for bad in ["", "list<>", "vector<i32>", "map<i32>", "i32>"] {
            assert!(SchemaLoader::parse_type(&mut graph, bad, "t").is_err(), "{bad} should not parse");
        }
    }
}
