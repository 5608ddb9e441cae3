/// Definition of an annotation the compiler itself understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationDef {
    /// The annotation name as written in source (e.g., "hidden" for `(hidden = "1")`).
    pub id: &'static str,
    /// Documentation string for the annotation (used in error messages and generated docs).
    pub doc: &'static str,
}

impl AnnotationDef {
    pub fn doc(&self) -> String {
        format!("Annotation: {}\n\n{}", self.id, self.doc)
    }
}

/// Marks the field whose value identifies the enclosing object.
pub const KEY_ANNOTATION: &AnnotationDef = &AnnotationDef {
    id: "key",
    doc: "Marks the field used as the lookup key of the enclosing object. The value names the table the key belongs to.",
};

/// Marks a field that generators should leave out of user-facing output.
pub const HIDDEN_ANNOTATION: &AnnotationDef = &AnnotationDef {
    id: "hidden",
    doc: "Excludes the field from user-facing output. The value is ignored; presence is what counts.",
};

/// All built-in field annotations.
pub const BUILTIN_ANNOTATIONS: &[&AnnotationDef] = &[KEY_ANNOTATION, HIDDEN_ANNOTATION];

pub fn builtin_annotation(id: &str) -> Option<&'static AnnotationDef> {
    BUILTIN_ANNOTATIONS.iter().copied().find(|def| def.id == id)
}
