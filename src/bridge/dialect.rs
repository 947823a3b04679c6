use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::SemanticType;

/// Target schema dialects `to_schema` knows the limits of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Xsd,
    #[default]
    JsonSchema,
    Avro,
    Protobuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnionSupport {
    None,
    /// e.g. `xs:union`, which only combines simple types
    ScalarsOnly,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub unions: UnionSupport,
    pub nullability: bool,
    pub attributes: bool,
}

impl Dialect {
    pub const ALL: [Dialect; 4] = [Dialect::Xsd, Dialect::JsonSchema, Dialect::Avro, Dialect::Protobuf];

    pub fn capabilities(self) -> Capabilities {
        match self {
            Dialect::Xsd => Capabilities { unions: UnionSupport::ScalarsOnly, nullability: true, attributes: true },
            Dialect::JsonSchema => Capabilities { unions: UnionSupport::Full, nullability: true, attributes: false },
            Dialect::Avro => Capabilities { unions: UnionSupport::Full, nullability: true, attributes: false },
            Dialect::Protobuf => Capabilities { unions: UnionSupport::None, nullability: false, attributes: false },
        }
    }

    /// Can this dialect state "one of `alternatives`" natively?
    pub fn supports_union_of(self, alternatives: &[SemanticType]) -> bool {
        match self.capabilities().unions {
            UnionSupport::None => false,
            UnionSupport::Full => true,
            UnionSupport::ScalarsOnly => alternatives.iter().all(|t| matches!(t, SemanticType::Scalar(_))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dialect::Xsd => "xsd",
            Dialect::JsonSchema => "jsonschema",
            Dialect::Avro => "avro",
            Dialect::Protobuf => "protobuf",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "xsd" | "xml" => Ok(Dialect::Xsd),
            "jsonschema" | "json" | "jsch" => Ok(Dialect::JsonSchema),
            "avro" => Ok(Dialect::Avro),
            "protobuf" | "proto" => Ok(Dialect::Protobuf),
            _ => Err(format!(
                "unknown dialect `{s}` (expected one of: {})",
                Dialect::ALL.map(Dialect::name).join(", ")
            )),
        }
    }
}
