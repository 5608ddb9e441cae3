mod builtin_annotations;
mod const_value;
mod diagnostics;
mod field;
mod field_key;
mod fingerprint;
mod semantic_analyzer;
mod types;

pub use builtin_annotations::{AnnotationDef, BUILTIN_ANNOTATIONS, HIDDEN_ANNOTATION, KEY_ANNOTATION, builtin_annotation};
pub use const_value::ConstValue;
pub use diagnostics::{print_report, render_diagnostic};
pub use field::{Annotations, Field, Requiredness, UnknownRequiredness};
pub use field_key::{FieldKeyRecord, KeyAllocator, KeyError, KeyPolicy};
pub use fingerprint::{StructFingerprint, fields_fingerprint_material};
pub use semantic_analyzer::{SemanticAnalyzer, SemanticAnalyzerError};
pub use types::{BaseType, EnumDef, StructDef, StructError, StructKind, TypeFingerprint, TypeGraph, TypeId, TypeKind, UnknownBaseType};
