//! DAP2 ASCII (`.ascii?`) response parsing.
//!
//! The body repeats the DDS, then a dashed separator, then one section per
//! returned array:
//!
//! ```text
//! ---------------------------------------------
//! chlorophyll.chlorophyll[1][1][2][3]
//! [0][0][0], 0.11, 0.12, 0.13
//! [0][0][1], 0.21, 0.22, 0.23
//!
//! chlorophyll.lat[2]
//! -10.0, -9.95
//! ```

use crate::error::{OpendapError, OpendapResult};

/// One named array section.
#[derive(Debug, Clone, PartialEq)]
pub struct AsciiSection {
    pub name: String,
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

/// Every section of an ASCII response, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AsciiResponse {
    pub sections: Vec<AsciiSection>,
}

impl AsciiResponse {
    pub fn parse(text: &str) -> OpendapResult<Self> {
        let body = match text.lines().position(|l| l.trim_start().starts_with("-----")) {
            Some(separator) => text.lines().skip(separator + 1).collect::<Vec<_>>(),
            None => text.lines().collect(),
        };

        let mut response = AsciiResponse::default();
        for line in body {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(section) = parse_header(line) {
                response.sections.push(section);
                continue;
            }
            let section = response
                .sections
                .last_mut()
                .ok_or_else(|| OpendapError::parse(format!("values before any header: '{}'", line)))?;
            parse_values(line, &mut section.values)?;
        }

        for section in &response.sections {
            let expected: usize = section.shape.iter().product();
            if !section.shape.is_empty() && expected != section.values.len() {
                return Err(OpendapError::parse(format!(
                    "section '{}' declares {} values, found {}",
                    section.name,
                    expected,
                    section.values.len()
                )));
            }
        }
        Ok(response)
    }

    /// First section with this variable name.
    pub fn get(&self, name: &str) -> Option<&AsciiSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn require(&self, name: &str) -> OpendapResult<&AsciiSection> {
        self.get(name)
            .ok_or_else(|| OpendapError::missing(format!("no '{}' section in response", name)))
    }
}

/// `grid.var[2][3]` -> section `var` with shape `[2, 3]`.
fn parse_header(line: &str) -> Option<AsciiSection> {
    let open = line.find('[')?;
    let qualified = &line[..open];
    if qualified.is_empty() || qualified.contains(',') {
        return None;
    }
    let name = qualified.rsplit('.').next().unwrap_or(qualified).to_string();

    let mut shape = Vec::new();
    for part in line[open..].split(']') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        shape.push(part.strip_prefix('[')?.trim().parse().ok()?);
    }

    Some(AsciiSection {
        name,
        shape,
        values: Vec::new(),
    })
}

fn parse_values(line: &str, values: &mut Vec<f64>) -> OpendapResult<()> {
    // Strip a leading `[i][j],` row prefix.
    let line = match line.rfind("],") {
        Some(end) if line.starts_with('[') => &line[end + 2..],
        _ => line,
    };
    for token in line.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let value = match token.to_ascii_lowercase().as_str() {
            "nan" => f64::NAN,
            _ => token
                .parse()
                .map_err(|_| OpendapError::parse(format!("bad value '{}'", token)))?,
        };
        values.push(value);
    }
    Ok(())
}
