//! DAP2 Dataset Attribute Structure (`.das`) parsing.
//!
//! Containers are flattened: attributes of nested containers are merged into
//! the top-level container that holds them. `NC_GLOBAL` (or any container
//! whose name contains `GLOBAL`) becomes the global block.

use std::collections::HashMap;

use grid_dataset::{AttributeValue, Attributes, EndpointMetadata};

use crate::error::{OpendapError, OpendapResult};
use crate::lexer::{Token, Tokens};

/// Parsed DAS.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Das {
    pub global: Attributes,
    pub variables: HashMap<String, Attributes>,
}

impl Das {
    pub fn parse(text: &str) -> OpendapResult<Self> {
        let mut tokens = Tokens::new(text)?;
        tokens.keyword("Attributes")?;
        tokens.expect(Token::LBrace)?;

        let mut das = Das::default();
        while tokens.peek() != Some(&Token::RBrace) {
            let name = tokens.word()?;
            tokens.expect(Token::LBrace)?;
            let mut attributes = Attributes::new();
            parse_container(&mut tokens, &mut attributes)?;

            if name.to_ascii_uppercase().contains("GLOBAL") {
                for (n, v) in attributes.iter() {
                    das.global.set(n, v.clone());
                }
            } else {
                das.variables.insert(name, attributes);
            }
        }
        tokens.expect(Token::RBrace)?;
        Ok(das)
    }

    pub fn variable(&self, name: &str) -> Attributes {
        self.variables.get(name).cloned().unwrap_or_default()
    }

    pub fn to_endpoint_metadata(&self) -> EndpointMetadata {
        EndpointMetadata {
            global: self.global.clone(),
            variables: self.variables.clone(),
        }
    }
}

/// Parse attributes up to and including the container's closing brace.
fn parse_container(tokens: &mut Tokens, attributes: &mut Attributes) -> OpendapResult<()> {
    loop {
        match tokens.peek() {
            Some(Token::RBrace) => {
                tokens.next()?;
                return Ok(());
            }
            None => return Err(OpendapError::parse("unterminated attribute container")),
            _ => {}
        }

        let head = tokens.word()?;
        if tokens.peek() == Some(&Token::LBrace) {
            tokens.next()?;
            parse_container(tokens, attributes)?;
            continue;
        }

        let name = tokens.word()?;
        let mut raw = Vec::new();
        loop {
            match tokens.next()? {
                Token::Semicolon => break,
                Token::Comma => {}
                Token::Word(w) | Token::Str(w) => raw.push(w),
                other => {
                    return Err(OpendapError::parse(format!(
                        "unexpected {:?} in attribute '{}'",
                        other, name
                    )))
                }
            }
        }
        attributes.set(name, convert(&head, raw)?);
    }
}

fn convert(kind: &str, raw: Vec<String>) -> OpendapResult<AttributeValue> {
    let kind = kind.to_ascii_lowercase();
    if kind.starts_with("float") {
        let values = raw
            .iter()
            .map(|s| parse_float(s))
            .collect::<OpendapResult<Vec<f64>>>()?;
        Ok(match values.as_slice() {
            [single] => AttributeValue::Double(*single),
            _ => AttributeValue::Doubles(values),
        })
    } else if kind.starts_with("int") || kind.starts_with("uint") || kind == "byte" {
        let values = raw
            .iter()
            .map(|s| {
                s.parse::<i64>()
                    .map_err(|_| OpendapError::parse(format!("bad integer attribute '{}'", s)))
            })
            .collect::<OpendapResult<Vec<i64>>>()?;
        Ok(match values.as_slice() {
            [single] => AttributeValue::Int(*single),
            _ => AttributeValue::Ints(values),
        })
    } else {
        Ok(AttributeValue::Text(raw.join(", ")))
    }
}

fn parse_float(s: &str) -> OpendapResult<f64> {
    match s.to_ascii_lowercase().as_str() {
        "nan" => Ok(f64::NAN),
        "inf" | "infinity" => Ok(f64::INFINITY),
        "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
        _ => s
            .parse()
            .map_err(|_| OpendapError::parse(format!("bad float attribute '{}'", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAS: &str = r#"Attributes {
    time {
        String units "seconds since 1970-01-01T00:00:00Z";
        String long_name "Centered Time";
        Float64 actual_range 1.1550384E9, 1.1552112E9;
    }
    lat {
        String axis "Y";
        String _CoordinateAxisType "Lat";
    }
    chlorophyll {
        Float32 _FillValue -9999999.0;
        String units "mg m-3";
        Int32 numberOfObservations 12;
    }
    NC_GLOBAL {
        String title "Chlorophyll-a, Aqua MODIS";
        String summary "Composite of \"daily\" passes.";
        Int16 rows 4320;
    }
    DODS_EXTRA {
        String Unlimited_Dimension "time";
    }
}"#;

    #[test]
    fn test_parse_das() {
        let das = Das::parse(DAS).unwrap();

        assert_eq!(das.global.get_str("title"), Some("Chlorophyll-a, Aqua MODIS"));
        assert_eq!(
            das.global.get_str("summary"),
            Some("Composite of \"daily\" passes.")
        );
        assert_eq!(das.global.get("rows"), Some(&AttributeValue::Int(4320)));

        let time = das.variable("time");
        assert_eq!(time.get_str("long_name"), Some("Centered Time"));
        assert_eq!(
            time.get("actual_range"),
            Some(&AttributeValue::Doubles(vec![1.1550384e9, 1.1552112e9]))
        );

        let chl = das.variable("chlorophyll");
        assert_eq!(chl.get_f64("_FillValue"), Some(-9999999.0));
        assert_eq!(chl.get("numberOfObservations"), Some(&AttributeValue::Int(12)));
        assert_eq!(das.variable("lat").get_str("axis"), Some("Y"));
    }

    #[test]
    fn test_nested_containers_flatten() {
        let das = Das::parse(
            r#"Attributes { sst { String units "degree_C"; extra { Float32 scale 0.5; } } }"#,
        )
        .unwrap();
        let sst = das.variable("sst");
        assert_eq!(sst.get_str("units"), Some("degree_C"));
        assert_eq!(sst.get_f64("scale"), Some(0.5));
    }

    #[test]
    fn test_nan_and_errors() {
        let das = Das::parse("Attributes { v { Float32 missing_value NaN; } }").unwrap();
        assert!(das.variable("v").get_f64("missing_value").unwrap().is_nan());

        assert!(Das::parse("Attributes { v { Int32 bad x; } }").is_err());
        assert!(Das::parse("Attributes { v { String t \"a\";").is_err());
    }

    #[test]
    fn test_to_endpoint_metadata() {
        let metadata = Das::parse(DAS).unwrap().to_endpoint_metadata();
        assert_eq!(metadata.variable("chlorophyll").get_str("units"), Some("mg m-3"));
        assert!(metadata.variables.contains_key("DODS_EXTRA"));
    }
}
