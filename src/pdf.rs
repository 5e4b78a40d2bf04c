use crate::{Block, ProtectError, ProtectResult, ReportDocument, TextStyle};
use chrono::NaiveDateTime;
use printpdf::{BuiltinFont, Color, Mm, PdfDocument, Rgb};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const BOTTOM_LIMIT: f32 = 25.0;
const FOOTER_Y: f32 = 12.0;
const LAYER_NAME: &str = "Layer 1";
const BODY_SIZE: f32 = 10.0;
const BODY_LINE: f32 = 5.0;
const WRAP_COLUMNS: usize = 95;
// Average Helvetica glyph width as a fraction of the font size, in mm per pt.
const GLYPH_WIDTH_MM: f32 = 0.5 * 0.3528;

type Colour = (f32, f32, f32);

const BLACK: Colour = (0.0, 0.0, 0.0);
const PASS_COLOUR: Colour = (0.0, 0.6, 0.0);
const FAIL_COLOUR: Colour = (0.8, 0.0, 0.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FontKind {
    Regular,
    Bold,
    Italic,
}

/// One positioned line of text. Each run carries its own colour so a line
/// wrapped onto a new page keeps it.
#[derive(Debug, Clone, PartialEq)]
struct TextRun {
    text: String,
    size: f32,
    x: f32,
    y: f32,
    font: FontKind,
    colour: Colour,
}

struct PageLayout<'a> {
    title: &'a str,
    pages: Vec<Vec<TextRun>>,
    y: f32,
}

impl<'a> PageLayout<'a> {
    fn new(title: &'a str) -> Self {
        let mut layout = Self {
            title,
            pages: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        };
        layout.start_page();
        layout
    }

    fn start_page(&mut self) {
        self.pages.push(Vec::new());
        self.y = PAGE_HEIGHT - MARGIN;
        let size = 15.0;
        let title = self.title;
        self.push(title.to_string(), size, centered_x(title, size), FontKind::Bold, BLACK);
        self.y -= 15.0;
    }

    fn push(&mut self, text: String, size: f32, x: f32, font: FontKind, colour: Colour) {
        let y = self.y;
        if let Some(page) = self.pages.last_mut() {
            page.push(TextRun {
                text,
                size,
                x,
                y,
                font,
                colour,
            });
        }
    }

    fn ensure_space(&mut self, height: f32) {
        if self.y - height < BOTTOM_LIMIT {
            self.start_page();
        }
    }

    fn section_title(&mut self, title: &str) {
        self.ensure_space(10.0);
        self.push(printable(title), 12.0, MARGIN, FontKind::Bold, BLACK);
        self.y -= 10.0;
    }

    fn text(&mut self, text: &str, style: TextStyle) {
        let (font, size, colour) = match style {
            TextStyle::Normal => (FontKind::Regular, BODY_SIZE, BLACK),
            TextStyle::Bold => (FontKind::Bold, BODY_SIZE + 1.0, BLACK),
            TextStyle::Pass => (FontKind::Bold, BODY_SIZE + 1.0, PASS_COLOUR),
            TextStyle::Fail => (FontKind::Bold, BODY_SIZE + 1.0, FAIL_COLOUR),
        };
        for line in wrap_text(&printable(text), WRAP_COLUMNS) {
            self.ensure_space(BODY_LINE);
            self.push(line, size, MARGIN, font, colour);
            self.y -= BODY_LINE + 1.0;
        }
    }

    fn bullet(&mut self, text: &str) {
        for (index, line) in wrap_text(&printable(text), WRAP_COLUMNS - 4)
            .into_iter()
            .enumerate()
        {
            self.ensure_space(BODY_LINE);
            let prefix = if index == 0 { "- " } else { "  " };
            self.push(
                format!("{prefix}{line}"),
                BODY_SIZE,
                MARGIN + 4.0,
                FontKind::Regular,
                BLACK,
            );
            self.y -= BODY_LINE;
        }
    }

    fn finish(mut self) -> Vec<Vec<TextRun>> {
        let total = self.pages.len();
        for (index, page) in self.pages.iter_mut().enumerate() {
            let label = format!("Page {}/{}", index + 1, total);
            page.push(TextRun {
                x: centered_x(&label, 8.0),
                text: label,
                size: 8.0,
                y: FOOTER_Y,
                font: FontKind::Italic,
                colour: BLACK,
            });
        }
        self.pages
    }
}

/// Positions every line of the document; sections start on a new page.
fn layout(document: &ReportDocument) -> Vec<Vec<TextRun>> {
    let mut layout = PageLayout::new(&document.title);
    for (index, section) in document.sections.iter().enumerate() {
        if index > 0 {
            layout.start_page();
        }
        layout.section_title(&section.title);
        for block in &section.blocks {
            match block {
                Block::Text { text, style } => layout.text(text, *style),
                Block::Bullet(text) => layout.bullet(text),
                Block::Spacer => layout.y -= BODY_LINE,
            }
        }
    }
    layout.finish()
}

/// Lays the document out on A4 pages and serializes it.
pub fn render_pdf(document: &ReportDocument) -> ProtectResult<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(
        document.title.as_str(),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        LAYER_NAME,
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(pdf_error)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_error)?;
    let italic = doc
        .add_builtin_font(BuiltinFont::HelveticaOblique)
        .map_err(pdf_error)?;

    for (index, runs) in layout(document).into_iter().enumerate() {
        let current = if index == 0 {
            doc.get_page(page).get_layer(layer)
        } else {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER_NAME);
            doc.get_page(page).get_layer(layer)
        };
        for run in runs {
            let font = match run.font {
                FontKind::Regular => &regular,
                FontKind::Bold => &bold,
                FontKind::Italic => &italic,
            };
            let (r, g, b) = run.colour;
            current.set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
            current.use_text(run.text, run.size, Mm(run.x), Mm(run.y), font);
        }
    }

    doc.save_to_bytes().map_err(pdf_error)
}

pub fn report_file_name(generated_at: NaiveDateTime) -> String {
    format!(
        "branch_protection_report_{}.pdf",
        generated_at.format("%Y%m%d_%H%M%S")
    )
}

/// Renders the document into `directory` under a timestamped name. An
/// existing file is never replaced; a numeric suffix is added instead.
pub fn write_report(document: &ReportDocument, directory: &Path) -> ProtectResult<PathBuf> {
    std::fs::create_dir_all(directory)?;
    let bytes = render_pdf(document)?;
    let base = report_file_name(document.generated_at);
    let stem = base.trim_end_matches(".pdf");

    let mut attempt = 0usize;
    loop {
        let name = if attempt == 0 {
            base.clone()
        } else {
            format!("{stem}_{attempt}.pdf")
        };
        let path = directory.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                write_or_remove(file, &path, &bytes)?;
                info!(path = %path.display(), "generated protection report");
                return Ok(path);
            }
            Err(error) if error.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(error) => return Err(error.into()),
        }
    }
}

/// Writes `bytes` into the freshly created `path`, deleting the file again if
/// the write fails so no truncated report is left behind.
fn write_or_remove<W: Write>(mut file: W, path: &Path, bytes: &[u8]) -> ProtectResult<()> {
    if let Err(error) = file.write_all(bytes).and_then(|()| file.flush()) {
        drop(file);
        if let Err(remove_error) = std::fs::remove_file(path) {
            warn!(path = %path.display(), %remove_error, "failed to remove partial report");
        }
        return Err(error.into());
    }
    Ok(())
}

fn pdf_error(error: impl std::fmt::Display) -> ProtectError {
    ProtectError::Report(error.to_string())
}

fn centered_x(text: &str, size: f32) -> f32 {
    let width = text.chars().count() as f32 * size * GLYPH_WIDTH_MM;
    ((PAGE_WIDTH - width) / 2.0).max(MARGIN)
}

/// Built-in PDF fonts only cover Latin-1; anything else becomes `?`.
fn printable(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            '\t' => ' ',
            ch if ch.is_ascii() && !ch.is_ascii_control() => ch,
            _ => '?',
        })
        .collect()
}

/// Word-wraps `text` to `columns`, keeping the leading indentation on every
/// line and splitting words longer than a line.
fn wrap_text(text: &str, columns: usize) -> Vec<String> {
    let indent_len = text.len() - text.trim_start().len();
    let indent = &text[..indent_len];
    let width = columns.saturating_sub(indent_len).max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        while word.chars().count() > width {
            if !current.is_empty() {
                lines.push(format!("{indent}{current}"));
                current.clear();
            }
            let split = word
                .char_indices()
                .nth(width)
                .map(|(index, _)| index)
                .unwrap_or(word.len());
            lines.push(format!("{indent}{}", &word[..split]));
            word = &word[split..];
        }
        if word.is_empty() {
            continue;
        }
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(format!("{indent}{current}"));
            current.clear();
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(format!("{indent}{current}"));
    }
    lines
}
