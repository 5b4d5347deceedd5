use std::fmt;

/// Runtime value types held by record attributes and expression results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::Bool(_) => "Bool",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Number(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// The scalar attribute types a fixed-layout data record may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Float,
    Bool,
}

impl ScalarType {
    /// The zero/false value every field is default-initialized with.
    pub fn zero(&self) -> Value {
        match self {
            ScalarType::Float => Value::Number(0.0),
            ScalarType::Bool => Value::Bool(false),
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ScalarType::Float, Value::Number(_)) | (ScalarType::Bool, Value::Bool(_))
        )
    }

    /// Maps UML primitive type names onto scalar types.
    pub fn from_uml_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "real" | "double" | "float" | "f64" | "f32" | "integer" | "int" => {
                Some(ScalarType::Float)
            }
            "boolean" | "bool" => Some(ScalarType::Bool),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::Float => write!(f, "float"),
            ScalarType::Bool => write!(f, "bool"),
        }
    }
}
