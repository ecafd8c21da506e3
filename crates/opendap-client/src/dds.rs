//! DAP2 Dataset Descriptor Structure (`.dds`) parsing.
//!
//! ```text
//! Dataset {
//!     Grid {
//!       ARRAY:
//!         Float32 chlorophyll[time = 1][altitude = 1][lat = 4320][lon = 8640];
//!       MAPS:
//!         Float64 time[time = 1];
//!         ...
//!     } chlorophyll;
//! } satellite/MO/chla/1day;
//! ```

use grid_dataset::TypedArray;

use crate::error::{OpendapError, OpendapResult};
use crate::lexer::{Token, Tokens};

/// DAP2 base types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DapType {
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
    String,
    Url,
}

impl DapType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "byte" => Some(Self::Byte),
            "int16" => Some(Self::Int16),
            "uint16" => Some(Self::UInt16),
            "int32" => Some(Self::Int32),
            "uint32" => Some(Self::UInt32),
            "float32" => Some(Self::Float32),
            "float64" => Some(Self::Float64),
            "string" => Some(Self::String),
            "url" => Some(Self::Url),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Byte | Self::Int16 | Self::UInt16 | Self::Int32 | Self::UInt32
        )
    }

    /// Narrow parsed values back to this element type.
    pub fn to_typed_array(&self, values: Vec<f64>) -> TypedArray {
        match self {
            Self::Float32 => TypedArray::Float32(values.into_iter().map(|v| v as f32).collect()),
            Self::Int32 | Self::UInt16 => {
                TypedArray::Int32(values.into_iter().map(|v| v as i32).collect())
            }
            Self::Int16 => TypedArray::Int16(values.into_iter().map(|v| v as i16).collect()),
            Self::Byte => TypedArray::UInt8(values.into_iter().map(|v| v as u8).collect()),
            Self::UInt32 | Self::Float64 | Self::String | Self::Url => TypedArray::Float64(values),
        }
    }
}

/// One array declaration, e.g. `Float32 sst[time = 1][lat = 10]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDeclaration {
    pub dtype: DapType,
    pub name: String,
    /// `(dimension name, size)` in server order.
    pub dimensions: Vec<(String, usize)>,
}

/// Parsed DDS: grids and plain arrays found at any nesting level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dds {
    pub name: String,
    pub grids: Vec<ArrayDeclaration>,
    pub arrays: Vec<ArrayDeclaration>,
}

impl Dds {
    pub fn parse(text: &str) -> OpendapResult<Self> {
        let mut tokens = Tokens::new(text)?;
        tokens.keyword("Dataset")?;
        tokens.expect(Token::LBrace)?;

        let mut dds = Dds::default();
        parse_declarations(&mut tokens, &mut dds)?;
        tokens.expect(Token::RBrace)?;
        dds.name = tokens.word().unwrap_or_default();
        Ok(dds)
    }

    /// The single data variable of an endpoint: the first grid, else the
    /// first plain array with four dimensions.
    pub fn grid_variable(&self) -> OpendapResult<&ArrayDeclaration> {
        self.grids
            .first()
            .or_else(|| self.arrays.iter().find(|a| a.dimensions.len() == 4))
            .ok_or_else(|| OpendapError::missing("no grid variable in DDS"))
    }
}

fn parse_declarations(tokens: &mut Tokens, dds: &mut Dds) -> OpendapResult<()> {
    while let Some(token) = tokens.peek() {
        if *token == Token::RBrace {
            return Ok(());
        }
        let kind = tokens.word()?;
        match kind.to_ascii_lowercase().as_str() {
            "grid" => {
                tokens.expect(Token::LBrace)?;
                tokens.keyword("ARRAY")?;
                tokens.expect(Token::Colon)?;
                let mut array = parse_array(tokens, None)?;
                tokens.keyword("MAPS")?;
                tokens.expect(Token::Colon)?;
                while tokens.peek() != Some(&Token::RBrace) {
                    dds.arrays.push(parse_array(tokens, None)?);
                }
                tokens.expect(Token::RBrace)?;
                array.name = tokens.word()?;
                tokens.expect(Token::Semicolon)?;
                dds.grids.push(array);
            }
            "structure" | "sequence" => {
                tokens.expect(Token::LBrace)?;
                parse_declarations(tokens, dds)?;
                tokens.expect(Token::RBrace)?;
                tokens.word()?;
                tokens.expect(Token::Semicolon)?;
            }
            _ => {
                let array = parse_array(tokens, Some(kind))?;
                dds.arrays.push(array);
            }
        }
    }
    Ok(())
}

fn parse_array(tokens: &mut Tokens, kind: Option<String>) -> OpendapResult<ArrayDeclaration> {
    let kind = match kind {
        Some(kind) => kind,
        None => tokens.word()?,
    };
    let dtype = DapType::from_name(&kind)
        .ok_or_else(|| OpendapError::parse(format!("unknown DAP type '{}'", kind)))?;
    let name = tokens.word()?;

    let mut dimensions = Vec::new();
    while tokens.peek() == Some(&Token::LBracket) {
        tokens.next()?;
        let (dim_name, size) = if tokens.peek_at(1) == Some(&Token::Equals) {
            let dim_name = tokens.word()?;
            tokens.next()?;
            (dim_name, tokens.word()?)
        } else {
            (name.clone(), tokens.word()?)
        };
        let size = size
            .parse()
            .map_err(|_| OpendapError::parse(format!("bad dimension size '{}'", size)))?;
        tokens.expect(Token::RBracket)?;
        dimensions.push((dim_name, size));
    }
    tokens.expect(Token::Semicolon)?;

    Ok(ArrayDeclaration {
        dtype,
        name,
        dimensions,
    })
}
