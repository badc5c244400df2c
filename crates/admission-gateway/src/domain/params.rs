//! Route parameter contracts.
//!
//! Every route declares its accepted parameters with a compact string:
//!
//! ```text
//! ?pubkey signature:hex, time:string, ?token_ecosystem:int64
//! ```
//!
//! Comma separated groups of `<names>:<kind>`, names separated by spaces, a
//! leading `?` marks a name optional. Contracts are compiled once while the
//! route table is built; a malformed contract aborts startup.

use crate::domain::error::{ApiError, ApiResult};
use std::collections::HashMap;
use std::fmt;

/// Value kind accepted for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Hex-encoded byte string
    Hex,
    /// Plain string
    String,
    /// Signed 64-bit integer
    Int64,
}

impl ParamKind {
    /// Parse a kind token of the contract language.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "hex" => Some(Self::Hex),
            "string" => Some(Self::String),
            "int64" => Some(Self::Int64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hex => "hex",
            Self::String => "string",
            Self::Int64 => "int64",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind and optionality of one declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub kind: ParamKind,
    pub optional: bool,
}

/// Errors raised while compiling a contract string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    /// Group does not split into exactly `<names>:<kind>`
    #[error("incorrect api route parameters: {group:?}")]
    MalformedGroup { group: String },
    /// Kind token is not one of hex, string, int64
    #[error("unknown type {kind:?} of api route parameter in {group:?}")]
    UnknownKind { group: String, kind: String },
    /// A bare `?` with no name attached
    #[error("incorrect name of api route parameter in {group:?}")]
    EmptyOptionalName { group: String },
}

/// Compiled parameter contract of a route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamContract {
    params: HashMap<String, ParamSpec>,
}

impl ParamContract {
    /// Compile a contract string. An empty string yields an empty contract.
    pub fn compile(input: &str) -> Result<Self, ContractError> {
        let mut params = HashMap::new();
        if input.is_empty() {
            return Ok(Self { params });
        }

        for group in input.split(',') {
            let parts: Vec<&str> = group.split(':').collect();
            if parts.len() != 2 {
                return Err(ContractError::MalformedGroup {
                    group: group.to_string(),
                });
            }

            let kind_token = parts[1].trim();
            let kind = ParamKind::from_token(kind_token).ok_or_else(|| ContractError::UnknownKind {
                group: group.to_string(),
                kind: kind_token.to_string(),
            })?;

            for name in parts[0].split(' ') {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                match name.strip_prefix('?') {
                    Some("") => {
                        return Err(ContractError::EmptyOptionalName {
                            group: group.to_string(),
                        });
                    }
                    Some(optional) => {
                        params.insert(
                            optional.to_string(),
                            ParamSpec {
                                kind,
                                optional: true,
                            },
                        );
                    }
                    None => {
                        params.insert(
                            name.to_string(),
                            ParamSpec {
                                kind,
                                optional: false,
                            },
                        );
                    }
                }
            }
        }

        Ok(Self { params })
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.get(name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamSpec)> {
        self.params.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    /// Check raw request inputs against the contract and convert them.
    ///
    /// Names outside the contract are ignored. An empty value counts as
    /// absent; any other value is checked exactly as sent.
    pub fn validate(&self, raw: &HashMap<String, String>) -> ApiResult<Params> {
        let mut values = HashMap::with_capacity(self.params.len());

        for (name, spec) in &self.params {
            let value = match raw.get(name).map(String::as_str).filter(|v| !v.is_empty()) {
                Some(value) => value,
                None if spec.optional => continue,
                None => return Err(ApiError::missing_param(name)),
            };

            let parsed = match spec.kind {
                ParamKind::String => ParamValue::String(value.to_string()),
                ParamKind::Int64 => value.parse::<i64>().map(ParamValue::Int64).map_err(|_| {
                    ApiError::invalid_params(format!("{name}: {value:?} is not an int64"))
                })?,
                ParamKind::Hex => {
                    let digits = value.strip_prefix("0x").unwrap_or(value);
                    hex::decode(digits).map(ParamValue::Hex).map_err(|e| {
                        ApiError::invalid_params(format!("{name}: invalid hex: {e}"))
                    })?
                }
            };
            values.insert(name.clone(), parsed);
        }

        Ok(Params { values })
    }
}

/// A validated, typed parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Hex(Vec<u8>),
    String(String),
    Int64(i64),
}

/// Parameters that passed a route contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    values: HashMap<String, ParamValue>,
}

impl Params {
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ParamValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn hex(&self, name: &str) -> Option<&[u8]> {
        match self.values.get(name) {
            Some(ParamValue::Hex(bytes)) => Some(bytes),
            _ => None,
        }
    }

    pub fn int64(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ParamValue::Int64(v)) => Some(*v),
            _ => None,
        }
    }

    /// Required string; the contract already guarantees presence for
    /// non-optional names, so absence here means a handler/contract mismatch.
    pub fn require_str(&self, name: &str) -> ApiResult<&str> {
        self.str(name).ok_or_else(|| ApiError::missing_param(name))
    }

    pub fn require_hex(&self, name: &str) -> ApiResult<&[u8]> {
        self.hex(name).ok_or_else(|| ApiError::missing_param(name))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
