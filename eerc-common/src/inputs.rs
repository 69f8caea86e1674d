use std::{fmt, fs, path::Path};

use ark_bn254::Fr;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    error::{PipelineError, PipelineResult},
    field::{field_to_decimal, parse_field, FieldError},
};

/// A single integer from an input document: a JSON number of any width or a
/// decimal / `0x`-hex string.
///
/// JSON integers that fit neither `u64` nor `i64` are kept as their literal
/// digits in `Text`, so field-sized values are never rounded through `f64`.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum InputValue {
    Number(u64),
    Signed(i64),
    Text(String),
}

impl<'de> Deserialize<'de> for InputValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(number) => {
                if let Some(n) = number.as_u64() {
                    return Ok(InputValue::Number(n));
                }
                if let Some(n) = number.as_i64() {
                    return Ok(InputValue::Signed(n));
                }
                let literal = number.to_string();
                let digits = literal.strip_prefix('-').unwrap_or(&literal);
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(de::Error::custom(format!(
                        "expected an integer, found {literal}"
                    )));
                }
                Ok(InputValue::Text(literal))
            }
            Value::String(text) => Ok(InputValue::Text(text)),
            other => Err(de::Error::custom(format!(
                "expected an integer or integer string, found {other}"
            ))),
        }
    }
}

impl InputValue {
    pub fn to_field(&self) -> Result<Fr, FieldError> {
        match self {
            InputValue::Number(n) => Ok(Fr::from(*n)),
            InputValue::Signed(n) if *n >= 0 => Ok(Fr::from(n.unsigned_abs())),
            InputValue::Signed(n) => Err(FieldError::Negative(n.to_string())),
            InputValue::Text(text) => parse_field(text),
        }
    }
}

impl From<u64> for InputValue {
    fn from(value: u64) -> Self {
        InputValue::Number(value)
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        InputValue::Text(value.to_string())
    }
}

impl From<Fr> for InputValue {
    fn from(value: Fr) -> Self {
        InputValue::Text(field_to_decimal(&value))
    }
}

impl fmt::Debug for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputValue::Number(n) => write!(f, "{n}"),
            InputValue::Signed(n) => write!(f, "{n}"),
            InputValue::Text(text) => write!(f, "{text:?}"),
        }
    }
}

/// Decoded `{"PubIns": [...], "PrivIns": [...]}` document. Order is significant.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inputs {
    #[serde(rename = "PubIns", default)]
    pub public: Vec<InputValue>,
    #[serde(rename = "PrivIns", default)]
    pub private: Vec<InputValue>,
}

impl Inputs {
    pub fn new(
        public: impl IntoIterator<Item = impl Into<InputValue>>,
        private: impl IntoIterator<Item = impl Into<InputValue>>,
    ) -> Self {
        Self {
            public: public.into_iter().map(Into::into).collect(),
            private: private.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_json_slice(bytes: &[u8]) -> PipelineResult<Self> {
        serde_json::from_slice(bytes).map_err(|err| PipelineError::InputParse(err.to_string()))
    }

    pub fn from_json_str(json: &str) -> PipelineResult<Self> {
        Self::from_json_slice(json.as_bytes())
    }

    pub fn to_json_pretty(&self) -> String {
        // Serializing plain vectors of integers and strings cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

// Private inputs are secrets; keep them out of logs.
impl fmt::Debug for Inputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inputs")
            .field("public", &self.public)
            .field("private", &format_args!("<{} redacted>", self.private.len()))
            .finish()
    }
}

pub fn read_inputs(path: impl AsRef<Path>) -> PipelineResult<Inputs> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| PipelineError::InputRead {
        path: path.to_path_buf(),
        source,
    })?;
    Inputs::from_json_slice(&bytes)
}
