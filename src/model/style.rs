//! Presentation attributes applied by write handlers.
//!
//! Styles only ever change how a cell looks; they never touch its value.

/// Cell style: font, fill, alignment and number format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellStyle {
    pub font: Option<CellFont>,
    pub fill: Option<CellFill>,
    pub horizontal_alignment: Option<HorizontalAlignment>,
    pub wrap_text: bool,
    pub number_format: Option<String>,
}

impl CellStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_font(mut self, font: CellFont) -> Self {
        self.font = Some(font);
        self
    }

    pub fn with_fill(mut self, fill: CellFill) -> Self {
        self.fill = Some(fill);
        self
    }

    pub fn with_alignment(mut self, alignment: HorizontalAlignment) -> Self {
        self.horizontal_alignment = Some(alignment);
        self
    }

    pub fn with_number_format(mut self, pattern: impl Into<String>) -> Self {
        self.number_format = Some(pattern.into());
        self
    }

    /// Overlay `other` on top of this style; set attributes in `other` win.
    pub fn merge(&mut self, other: &CellStyle) {
        if other.font.is_some() {
            self.font = other.font.clone();
        }
        if other.fill.is_some() {
            self.fill = other.fill.clone();
        }
        if other.horizontal_alignment.is_some() {
            self.horizontal_alignment = other.horizontal_alignment;
        }
        self.wrap_text |= other.wrap_text;
        if other.number_format.is_some() {
            self.number_format = other.number_format.clone();
        }
    }
}

/// Font properties for a cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellFont {
    pub name: Option<String>,
    pub size: Option<f64>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub color: Option<String>,
}

/// Fill properties for a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellFill {
    pub pattern_type: CellFillPatternType,
    pub fg_color: Option<String>,
}

impl CellFill {
    pub fn solid(color: impl Into<String>) -> Self {
        Self {
            pattern_type: CellFillPatternType::Solid,
            fg_color: Some(color.into()),
        }
    }
}

/// Cell fill pattern types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellFillPatternType {
    None,
    Solid,
    Gray125,
    LightGray,
}

/// Horizontal alignment of cell content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HorizontalAlignment {
    Left,
    Center,
    Right,
}
