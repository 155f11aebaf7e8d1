//! Parameter arguments for `lines add|update`
//!
//! Accepted forms:
//! - `field:<id>`              field reference
//! - `lit:<value>`             untyped literal, rendered verbatim
//! - `lit:<TYPE>:<value>`      typed literal (`lit:STRING:gold`)

use forge_rules::ParamInput;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamArg(pub ParamInput);

impl FromStr for ParamArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix("field:") {
            let id: i64 = id
                .trim()
                .parse()
                .map_err(|_| format!("invalid field id in '{}'", s))?;
            return Ok(ParamArg(ParamInput::field(id)));
        }

        if let Some(rest) = s.strip_prefix("lit:") {
            // A leading all-caps word followed by ':' is the declared type
            if let Some((ty, value)) = rest.split_once(':') {
                if !ty.is_empty() && ty.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
                    return Ok(ParamArg(ParamInput::typed_literal(value, ty)));
                }
            }
            return Ok(ParamArg(ParamInput::literal(rest)));
        }

        Err(format!(
            "invalid parameter '{}': expected field:<id>, lit:<value> or lit:<TYPE>:<value>",
            s
        ))
    }
}

pub fn into_inputs(args: Vec<ParamArg>) -> Vec<ParamInput> {
    args.into_iter().map(|arg| arg.0).collect()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(
            "field:4".parse::<ParamArg>().unwrap().0,
            ParamInput::field(4)
        );
        assert_eq!(
            "lit:42".parse::<ParamArg>().unwrap().0,
            ParamInput::literal("42")
        );
        assert_eq!(
            "lit:STRING:gold".parse::<ParamArg>().unwrap().0,
            ParamInput::typed_literal("gold", "STRING")
        );
        // Lowercase prefix is part of the value, not a type
        assert_eq!(
            "lit:http://x".parse::<ParamArg>().unwrap().0,
            ParamInput::literal("http://x")
        );
        assert_eq!(
            "lit:".parse::<ParamArg>().unwrap().0,
            ParamInput::literal("")
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!("field:abc".parse::<ParamArg>().is_err());
        assert!("42".parse::<ParamArg>().is_err());
    }
}
