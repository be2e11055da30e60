//! Page layout: a cursor moving down A4 pages, emitting PDF content operators.
//!
//! All coordinates are whole points so the content streams are byte-stable.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use super::text::{text_width, wrap};
use crate::Result;

pub const PAGE_WIDTH: i64 = 595;
pub const PAGE_HEIGHT: i64 = 842;
pub const MARGIN_X: i64 = 56;
pub const MARGIN_TOP: i64 = 60;
pub const MARGIN_BOTTOM: i64 = 64;
pub const CONTENT_WIDTH: i64 = PAGE_WIDTH - 2 * MARGIN_X;

const FOOTER_Y: i64 = 32;
const CELL_PADDING: i64 = 4;

/// Font face used for a run of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource_name(self) -> &'static [u8] {
        match self {
            Font::Regular => b"F1",
            Font::Bold => b"F2",
        }
    }

    fn is_bold(self) -> bool {
        matches!(self, Font::Bold)
    }
}

/// Text style: face and size.
#[derive(Debug, Clone, Copy)]
pub struct Style {
    pub font: Font,
    pub size: i64,
}

impl Style {
    pub const fn regular(size: i64) -> Self {
        Self {
            font: Font::Regular,
            size,
        }
    }

    pub const fn bold(size: i64) -> Self {
        Self {
            font: Font::Bold,
            size,
        }
    }

    /// Baseline-to-baseline distance.
    pub fn leading(&self) -> i64 {
        self.size + self.size / 2
    }

    pub fn wrap(&self, text: &str, width: i64) -> Vec<String> {
        wrap(text, self.size as f32, self.font.is_bold(), width as f32)
    }

    pub fn width(&self, text: &str) -> i64 {
        text_width(text, self.size as f32, self.font.is_bold()).round() as i64
    }
}

/// One table cell: its lines are already wrapped to the column width.
#[derive(Debug, Clone)]
pub struct Cell {
    pub lines: Vec<(Style, String)>,
}

/// Paginating layout cursor.
pub struct Layout {
    pages: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    y: i64,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new()
    }
}

impl Layout {
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: Vec::new(),
            y: PAGE_HEIGHT - MARGIN_TOP,
        }
    }

    /// Start a new page if fewer than `height` points remain.
    pub fn ensure_space(&mut self, height: i64) {
        if self.y - height < MARGIN_BOTTOM {
            self.new_page();
        }
    }

    pub fn new_page(&mut self) {
        let finished = std::mem::take(&mut self.current);
        self.pages.push(finished);
        self.y = PAGE_HEIGHT - MARGIN_TOP;
    }

    pub fn skip(&mut self, height: i64) {
        self.y -= height;
        if self.y < MARGIN_BOTTOM {
            self.new_page();
        }
    }

    /// A single line centred horizontally.
    pub fn centered(&mut self, style: Style, text: &str) {
        self.ensure_space(style.leading());
        let x = (PAGE_WIDTH - style.width(text)) / 2;
        self.y -= style.leading();
        self.text_at(style, x, self.y, text);
    }

    /// A wrapped paragraph spanning the content width.
    pub fn paragraph(&mut self, style: Style, text: &str) {
        for line in style.wrap(text, CONTENT_WIDTH) {
            self.ensure_space(style.leading());
            self.y -= style.leading();
            self.text_at(style, MARGIN_X, self.y, &line);
        }
    }

    /// A row of bordered cells with the given column widths. The row is kept
    /// on one page.
    pub fn table_row(&mut self, widths: &[i64], cells: &[Cell]) {
        let height = cells
            .iter()
            .map(|c| c.lines.iter().map(|(s, _)| s.leading()).sum::<i64>())
            .max()
            .unwrap_or(0)
            + 2 * CELL_PADDING;

        self.ensure_space(height);
        let top = self.y;
        let mut x = MARGIN_X;

        for (width, cell) in widths.iter().zip(cells) {
            self.rect(x, top - height, *width, height);
            let mut line_y = top - CELL_PADDING;
            for (style, line) in &cell.lines {
                line_y -= style.leading();
                self.text_at(*style, x + CELL_PADDING, line_y + style.size / 4, line);
            }
            x += width;
        }

        self.y = top - height;
    }

    /// A signature cell: blank space, a rule to sign on, then the detail lines.
    pub fn signature_row(&mut self, columns: &[Vec<(Style, String)>]) {
        const SIGN_SPACE: i64 = 40;
        const COLUMN_GAP: i64 = 24;

        let details = columns
            .iter()
            .map(|c| c.iter().map(|(s, _)| s.leading()).sum::<i64>())
            .max()
            .unwrap_or(0);
        let height = SIGN_SPACE + details + 12;

        self.ensure_space(height);
        let top = self.y;
        let count = columns.len().max(1) as i64;
        let width = (CONTENT_WIDTH - COLUMN_GAP * (count - 1)) / count;

        for (i, column) in columns.iter().enumerate() {
            let x = MARGIN_X + i as i64 * (width + COLUMN_GAP);
            let rule_y = top - SIGN_SPACE;
            self.line(x, rule_y, x + width, rule_y);

            let mut line_y = rule_y;
            for (style, text) in column {
                line_y -= style.leading();
                self.text_at(*style, x, line_y, text);
            }
        }

        self.y = top - height;
    }

    fn text_at(&mut self, style: Style, x: i64, y: i64, text: &str) {
        self.current.extend([
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![
                    Object::Name(style.font.resource_name().to_vec()),
                    Object::Integer(style.size),
                ],
            ),
            Operation::new("Td", vec![Object::Integer(x), Object::Integer(y)]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]);
    }

    fn rect(&mut self, x: i64, y: i64, width: i64, height: i64) {
        self.current.extend([
            Operation::new(
                "re",
                vec![
                    Object::Integer(x),
                    Object::Integer(y),
                    Object::Integer(width),
                    Object::Integer(height),
                ],
            ),
            Operation::new("S", vec![]),
        ]);
    }

    fn line(&mut self, x1: i64, y1: i64, x2: i64, y2: i64) {
        self.current.extend([
            Operation::new("m", vec![Object::Integer(x1), Object::Integer(y1)]),
            Operation::new("l", vec![Object::Integer(x2), Object::Integer(y2)]),
            Operation::new("S", vec![]),
        ]);
    }

    /// Close the last page, stamp page numbers and serialize the document.
    pub fn finish(mut self, title: &str, subject: &str, producer: &str) -> Result<Vec<u8>> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.new_page();
        }

        let total = self.pages.len();
        let footer = Style::regular(8);
        let mut pages = std::mem::take(&mut self.pages);
        for (i, ops) in pages.iter_mut().enumerate() {
            let label = format!("Pagina {} de {}", i + 1, total);
            let x = (PAGE_WIDTH - footer.width(&label)) / 2;
            self.current = std::mem::take(ops);
            self.text_at(footer, x, FOOTER_Y, &label);
            *ops = std::mem::take(&mut self.current);
        }

        write_document(pages, title, subject, producer)
    }
}

fn write_document(
    pages: Vec<Vec<Operation>>,
    title: &str,
    subject: &str,
    producer: &str,
) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut kids = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(title),
        "Subject" => Object::string_literal(subject),
        "Producer" => Object::string_literal(producer),
    });

    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}
