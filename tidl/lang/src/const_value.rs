/// Constant expression used as a field default.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Integer(i64),
    Double(f64),
    String(String),
    /// Reference to a named constant or enum value, e.g. `Color.RED`.
    Identifier(String),
    List(Vec<ConstValue>),
    /// Entries keep their source order.
    Map(Vec<(ConstValue, ConstValue)>),
}

impl ConstValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ConstValue::Integer(_) => "integer",
            ConstValue::Double(_) => "double",
            ConstValue::String(_) => "string",
            ConstValue::Identifier(_) => "identifier",
            ConstValue::List(_) => "list",
            ConstValue::Map(_) => "map",
        }
    }
}

impl std::fmt::Display for ConstValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstValue::Integer(i) => write!(f, "{i}"),
            ConstValue::Double(d) => write!(f, "{d}"),
            ConstValue::String(s) => write!(f, "\"{s}\""),
            ConstValue::Identifier(id) => write!(f, "{id}"),
            ConstValue::List(items) => {
                let items: Vec<String> = items.iter().map(|item| format!("{item}")).collect();
                write!(f, "[{}]", items.join(", "))
            }
            ConstValue::Map(entries) => {
                let entries: Vec<String> = entries.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", entries.join(", "))
            }
        }
    }
}
