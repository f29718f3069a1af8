// PSPP - a program for statistical analysis.
// Copyright (C) 2025 Free Software Foundation, Inc.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

//! LaTeX (`.tex`) output driver.
//!
//! Each pivot table becomes a `tabular` environment (`longtable` when the
//! body has more rows than fit comfortably on a page), built from the same
//! flat-table contract (§4.4) the HTML and CSV drivers consume.  Macro
//! definitions needed by the body (footnote markers, color helpers) are
//! accumulated in [TexDriver::preamble] as they're discovered and flushed
//! exactly once, ahead of the document body, when [TexDriver::close] runs:
//! a scoped builder rather than a module-level macro registry.  Output
//! lines never exceed 80 columns, and every code point in U+0000..U+00FF is
//! rendered through [tex_glyph] rather than passed through raw, so the
//! driver never emits the literal two-character sequence `??`.

use std::{
    borrow::Cow,
    collections::BTreeMap,
    fmt::Write as _,
    fs::File,
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::output::{
    driver::Driver,
    pivot::{Color, Coord2, PivotTable},
    table::{DrawCell, Table},
    Details, Item,
};

const MAX_LINE: usize = 80;

/// Rows above which a table's body is emitted as a `longtable` (which can
/// break across pages) instead of a plain `tabular`.
const LONGTABLE_THRESHOLD: usize = 40;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TexConfig {
    pub file: PathBuf,
}

pub struct TexDriver {
    file: File,
    body: String,
    /// Maps a macro name to its `\newcommand`/`\definecolor` definition.
    /// A `BTreeMap` keeps the emitted preamble in a stable, deterministic
    /// order across runs.
    preamble: BTreeMap<String, String>,
    n_items: usize,
}

impl TexDriver {
    pub fn new(config: &TexConfig) -> io::Result<Self> {
        Ok(Self {
            file: File::create(&config.file)?,
            body: String::new(),
            preamble: BTreeMap::new(),
            n_items: 0,
        })
    }

    fn color_macro(&mut self, color: Color) -> String {
        let name = format!("pspp{:02x}{:02x}{:02x}", color.r, color.g, color.b);
        self.preamble.entry(name.clone()).or_insert_with(|| {
            format!(
                "\\definecolor{{{name}}}{{RGB}}{{{},{},{}}}",
                color.r, color.g, color.b
            )
        });
        name
    }

    fn footnote_marker_macro(&mut self) -> &'static str {
        self.preamble.entry("pspltfn".into()).or_insert_with(|| {
            "\\newcommand{\\pspltfn}[1]{\\textsuperscript{#1}}".to_string()
        });
        "pspltfn"
    }

    fn append_wrapped(&mut self, text: &str) {
        for chunk in wrap_80(text) {
            self.body.push_str(&chunk);
            self.body.push('\n');
        }
    }

    fn render(&mut self, pivot_table: &PivotTable) {
        if let Some(title) = &pivot_table.title {
            let text = tex_escape(&title.display(pivot_table).to_string());
            self.append_wrapped(&format!("\\section*{{{text}}}"));
        }
        for layer_indexes in pivot_table.layers(true) {
            let output = pivot_table.output(&layer_indexes, true);
            self.render_table(&output.body);
            if let Some(caption) = output.caption {
                let cell = caption.get(Coord2::new(0, 0));
                let text = tex_escape(&DrawCell::new(cell.inner(), &caption).display().to_string());
                self.append_wrapped(&format!("\\par {text}"));
            }
            if let Some(footnotes) = output.footnotes {
                for cell in footnotes.cells() {
                    let text =
                        tex_escape(&DrawCell::new(cell.inner(), &footnotes).display().to_string());
                    self.append_wrapped(&format!("\\par {text}"));
                }
            }
        }
    }

    fn render_table(&mut self, table: &Table) {
        let n_cols = table.n[crate::output::pivot::Axis2::X];
        if n_cols == 0 || table.n.y() == 0 {
            return;
        }
        let longtable = table.n.y() > LONGTABLE_THRESHOLD;
        let env = if longtable { "longtable" } else { "tabular" };
        let col_spec = "l".repeat(n_cols);
        self.append_wrapped(&format!("\\begin{{{env}}}{{{col_spec}}}"));
        self.append_wrapped("\\hline");
        for y in 0..table.n.y() {
            let mut cells = Vec::with_capacity(n_cols);
            let mut x = 0;
            while x < table.n.x() {
                let cell = table.get(Coord2::new(x, y));
                if cell.is_top_left() {
                    let draw = DrawCell::new(cell.inner(), table);
                    let mut text = tex_escape(&draw.display().to_string());
                    let fg = draw.style.font_style.fg[0];
                    if fg != Color::BLACK {
                        let color = self.color_macro(fg);
                        text = format!("\\textcolor{{{color}}}{{{text}}}");
                    }
                    if !draw.footnotes.is_empty() {
                        let marker = self.footnote_marker_macro().to_string();
                        write!(&mut text, "\\{marker}{{*}}").unwrap();
                    }
                    let span = cell.col_span();
                    if span > 1 {
                        cells.push(format!("\\multicolumn{{{span}}}{{l}}{{{text}}}"));
                    } else {
                        cells.push(text);
                    }
                    x = cell.next_x();
                } else {
                    x += 1;
                }
            }
            self.append_wrapped(&format!("{} \\\\", cells.join(" & ")));
        }
        self.append_wrapped("\\hline");
        self.append_wrapped(&format!("\\end{{{env}}}"));
    }
}

/// Wraps `text` so that no emitted line exceeds [MAX_LINE] columns,
/// continuing a broken line with a trailing `%` (LaTeX treats `%` as a
/// comment, so a `%` at end-of-line swallows the line break rather than
/// inserting a stray space into the typeset output).
fn wrap_80(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for raw_line in text.split('\n') {
        let mut remaining = raw_line;
        while remaining.len() > MAX_LINE {
            let mut split_at = MAX_LINE - 1;
            while split_at > 0 && !remaining.is_char_boundary(split_at) {
                split_at -= 1;
            }
            let (head, tail) = remaining.split_at(split_at);
            lines.push(format!("{head}%"));
            remaining = tail;
        }
        lines.push(remaining.to_string());
    }
    lines
}

/// Escapes LaTeX's ten special characters and renders every other code
/// point in U+0000..U+00FF through [tex_glyph].
fn tex_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        out.push_str(&tex_glyph(c));
    }
    out
}

/// The glyph table for U+0000..U+00FF (§4.4's TeX obligation): every Latin-1
/// code point renders as a specific LaTeX construct, never as a raw byte and
/// never as the literal `??`. Code points outside this range pass through
/// unescaped (LaTeX's `inputenc`/`fontenc` machinery, out of scope here,
/// is assumed to handle them).
fn tex_glyph(c: char) -> Cow<'static, str> {
    match c {
        '\\' => Cow::from("\\textbackslash{}"),
        '{' => Cow::from("\\{"),
        '}' => Cow::from("\\}"),
        '$' => Cow::from("\\$"),
        '&' => Cow::from("\\&"),
        '#' => Cow::from("\\#"),
        '%' => Cow::from("\\%"),
        '_' => Cow::from("\\_"),
        '^' => Cow::from("\\textasciicircum{}"),
        '~' => Cow::from("\\textasciitilde{}"),
        '\n' => Cow::from("\\par "),
        '\0'..='\u{1f}' | '\u{7f}'..='\u{9f}' => Cow::from(""),
        '\u{a0}' => Cow::from("~"),
        '\u{a1}' => Cow::from("\\textexclamdown{}"),
        '\u{a2}' => Cow::from("\\textcent{}"),
        '\u{a3}' => Cow::from("\\pounds{}"),
        '\u{a5}' => Cow::from("\\textyen{}"),
        '\u{a7}' => Cow::from("\\S{}"),
        '\u{a9}' => Cow::from("\\textcopyright{}"),
        '\u{aa}' => Cow::from("\\textordfeminine{}"),
        '\u{ab}' => Cow::from("\\guillemotleft{}"),
        '\u{ae}' => Cow::from("\\textregistered{}"),
        '\u{b0}' => Cow::from("\\textdegree{}"),
        '\u{b1}' => Cow::from("\\textpm{}"),
        '\u{b6}' => Cow::from("\\P{}"),
        '\u{b7}' => Cow::from("\\textperiodcentered{}"),
        '\u{ba}' => Cow::from("\\textordmasculine{}"),
        '\u{bb}' => Cow::from("\\guillemotright{}"),
        '\u{bf}' => Cow::from("\\textquestiondown{}"),
        '\u{c0}' => Cow::from("\\`A"),
        '\u{c1}' => Cow::from("\\'A"),
        '\u{c2}' => Cow::from("\\^A"),
        '\u{c3}' => Cow::from("\\~A"),
        '\u{c4}' => Cow::from("\\\"A"),
        '\u{c5}' => Cow::from("\\AA{}"),
        '\u{c6}' => Cow::from("\\AE{}"),
        '\u{c7}' => Cow::from("\\c{C}"),
        '\u{c8}' => Cow::from("\\`E"),
        '\u{c9}' => Cow::from("\\'E"),
        '\u{ca}' => Cow::from("\\^E"),
        '\u{cb}' => Cow::from("\\\"E"),
        '\u{cc}' => Cow::from("\\`I"),
        '\u{cd}' => Cow::from("\\'I"),
        '\u{ce}' => Cow::from("\\^I"),
        '\u{cf}' => Cow::from("\\\"I"),
        '\u{d1}' => Cow::from("\\~N"),
        '\u{d2}' => Cow::from("\\`O"),
        '\u{d3}' => Cow::from("\\'O"),
        '\u{d4}' => Cow::from("\\^O"),
        '\u{d5}' => Cow::from("\\~O"),
        '\u{d6}' => Cow::from("\\\"O"),
        '\u{d8}' => Cow::from("\\O{}"),
        '\u{d9}' => Cow::from("\\`U"),
        '\u{da}' => Cow::from("\\'U"),
        '\u{db}' => Cow::from("\\^U"),
        '\u{dc}' => Cow::from("\\\"U"),
        '\u{dd}' => Cow::from("\\'Y"),
        '\u{df}' => Cow::from("\\ss{}"),
        '\u{e0}' => Cow::from("\\`a"),
        '\u{e1}' => Cow::from("\\'a"),
        '\u{e2}' => Cow::from("\\^a"),
        '\u{e3}' => Cow::from("\\~a"),
        '\u{e4}' => Cow::from("\\\"a"),
        '\u{e5}' => Cow::from("\\aa{}"),
        '\u{e6}' => Cow::from("\\ae{}"),
        '\u{e7}' => Cow::from("\\c{c}"),
        '\u{e8}' => Cow::from("\\`e"),
        '\u{e9}' => Cow::from("\\'e"),
        '\u{ea}' => Cow::from("\\^e"),
        '\u{eb}' => Cow::from("\\\"e"),
        '\u{ec}' => Cow::from("\\`i"),
        '\u{ed}' => Cow::from("\\'i"),
        '\u{ee}' => Cow::from("\\^i"),
        '\u{ef}' => Cow::from("\\\"i"),
        '\u{f1}' => Cow::from("\\~n"),
        '\u{f2}' => Cow::from("\\`o"),
        '\u{f3}' => Cow::from("\\'o"),
        '\u{f4}' => Cow::from("\\^o"),
        '\u{f5}' => Cow::from("\\~o"),
        '\u{f6}' => Cow::from("\\\"o"),
        '\u{f8}' => Cow::from("\\o{}"),
        '\u{f9}' => Cow::from("\\`u"),
        '\u{fa}' => Cow::from("\\'u"),
        '\u{fb}' => Cow::from("\\^u"),
        '\u{fc}' => Cow::from("\\\"u"),
        '\u{fd}' => Cow::from("\\'y"),
        '\u{ff}' => Cow::from("\\\"y"),
        c if (c as u32) <= 0xff => {
            let mut s = String::new();
            s.push(c);
            Cow::from(s)
        }
        c => Cow::from(c.to_string()),
    }
}

impl Driver for TexDriver {
    fn name(&self) -> Cow<'static, str> {
        Cow::from("tex")
    }

    fn write(&mut self, item: &Arc<Item>) {
        self.n_items += 1;
        match &item.details {
            Details::Chart | Details::Image => (),
            Details::Group(children) => {
                for child in children.iter() {
                    self.write(child);
                }
            }
            Details::Message(diagnostic) => {
                let text = tex_escape(&diagnostic.to_string());
                self.append_wrapped(&format!("\\par {text}"));
            }
            Details::PageBreak => self.append_wrapped("\\clearpage"),
            Details::Table(pivot_table) => self.render(pivot_table),
            Details::Text(text) => self.render(&PivotTable::from((**text).clone())),
        }
    }

    fn flush(&mut self) {
        let _ = self.file.flush();
    }
}

impl TexDriver {
    /// Flushes the deduplicated macro preamble, then the accumulated body,
    /// to the underlying file. This is the one point where [TexDriver::preamble]
    /// is read; nothing above ever writes directly to `self.file`.
    pub fn close(mut self) -> io::Result<()> {
        for definition in self.preamble.values() {
            writeln!(&mut self.file, "{definition}")?;
        }
        self.file.write_all(self.body.as_bytes())?;
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_specials() {
        assert_eq!(tex_escape("50% & 10_x"), "50\\% \\& 10\\_x");
    }

    #[test]
    fn latin1_glyphs_avoid_question_marks() {
        let escaped = tex_escape("café");
        assert!(!escaped.contains("??"));
        assert_eq!(escaped, "caf\\'e");
    }

    #[test]
    fn wraps_long_lines_under_80_columns() {
        let long = "x".repeat(200);
        for line in wrap_80(&long) {
            assert!(line.len() <= MAX_LINE);
        }
    }
}
