use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseNotReady {
    #[error("payload is empty")]
    Empty,
    #[error("payload is not valid JSON: {0}")]
    Syntax(String),
    #[error("payload is JSON but not an object")]
    NotAnObject,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    fields: Map<String, Value>,
}

impl Payload {
    pub fn parse(text: &str) -> Result<Self, ParseNotReady> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ParseNotReady::Empty);
        }
        let value: Value =
            serde_json::from_str(trimmed).map_err(|err| ParseNotReady::Syntax(err.to_string()))?;
        Self::try_from(value)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|value| !value.is_null())
    }
}

impl TryFrom<Value> for Payload {
    type Error = ParseNotReady;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(ParseNotReady::NotAnObject),
        }
    }
}
