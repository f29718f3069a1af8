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

//! OpenDocument Text (`.odt`) output driver.
//!
//! An `.odt` file is a ZIP archive (see [crate::zip]) containing a
//! `mimetype` member (stored, uncompressed, first in the archive, per the
//! ODF packaging convention), a `META-INF/manifest.xml` listing the other
//! members, and a `content.xml` holding the actual document body.  Pivot
//! tables become `<table:table>` elements built from the same flat-table
//! contract (§4.4) that the HTML and text drivers consume; cell spans come
//! straight from [Table]'s join rectangles rather than being recomputed.

use std::{
    borrow::Cow,
    fs::File,
    io::{Seek, Write},
    path::PathBuf,
    sync::Arc,
};

use quick_xml::{events::BytesText, writer::Writer as XmlWriter};
use serde::{Deserialize, Serialize};

use crate::{
    output::{
        driver::Driver,
        pivot::{Axis2, Coord2, PivotTable},
        table::{DrawCell, Table},
        Details, Item,
    },
    zip::{FileOptions, Method, ZipWriter},
};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OdtConfig {
    pub file: PathBuf,
}

pub struct OdtDriver<W: Write + Seek> {
    zip: ZipWriter<W>,
    content: Vec<u8>,
    n_tables: usize,
}

impl OdtDriver<File> {
    pub fn new(config: &OdtConfig) -> std::io::Result<Self> {
        Self::for_writer(File::create(&config.file)?)
    }
}

impl<W: Write + Seek> OdtDriver<W> {
    pub fn for_writer(writer: W) -> std::io::Result<Self> {
        let mut zip = ZipWriter::new(writer);

        // The ODF packaging convention requires an uncompressed `mimetype`
        // member first, with no extra field, so that naive tools can
        // identify the document type from the first bytes of the archive.
        zip.start_file(
            "mimetype",
            FileOptions {
                method: Method::Stored,
            },
        )?;
        zip.write_all(b"application/vnd.oasis.opendocument.text")?;

        zip.start_file(
            "META-INF/manifest.xml",
            FileOptions {
                method: Method::Deflate,
            },
        )?;
        zip.write_all(MANIFEST_XML.as_bytes())?;

        // Built by hand rather than through `quick_xml` so that the
        // `office:text` element is guaranteed to have a separate open and
        // close tag (not collapsed to a self-closing `<office:text/>`)
        // for `render`/`write` to splice content in front of.
        let content = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content {}>
<office:body>
<office:text>
</office:text>
</office:body>
</office:document-content>
"#,
            CONTENT_NAMESPACES
        )
        .into_bytes();

        Ok(Self {
            zip,
            content,
            n_tables: 0,
        })
    }

    fn render(&mut self, pivot_table: &PivotTable) -> std::io::Result<()> {
        // Splice each pivot table's markup in just before the closing
        // `</office:text>` tag that `for_writer` left in place.
        let closing = b"</office:text>";
        let pos = find_subslice(&self.content, closing)
            .unwrap_or(self.content.len().saturating_sub(closing.len()));

        let mut body = Vec::new();
        {
            let mut w = XmlWriter::new(&mut body);
            if let Some(title) = &pivot_table.title {
                let text = title.display(pivot_table).to_string();
                write_paragraph(&mut w, "Heading_20_2", &text);
            }
            for layer_indexes in pivot_table.layers(true) {
                let output = pivot_table.output(&layer_indexes, true);
                self.n_tables += 1;
                write_table(&mut w, &output.body, self.n_tables);
                if let Some(caption) = output.caption {
                    let cell = caption.get(Coord2::new(0, 0));
                    let text = DrawCell::new(cell.inner(), &caption)
                        .display()
                        .to_string();
                    write_paragraph(&mut w, "Caption", &text);
                }
                if let Some(footnotes) = output.footnotes {
                    for cell in footnotes.cells() {
                        let text = DrawCell::new(cell.inner(), &footnotes)
                            .display()
                            .to_string();
                        write_paragraph(&mut w, "Footnote", &text);
                    }
                }
            }
        }

        self.content.splice(pos..pos, body);
        Ok(())
    }
}

fn write_paragraph<W: Write>(w: &mut XmlWriter<W>, style: &str, text: &str) {
    w.create_element("text:p")
        .with_attribute(("text:style-name", style))
        .write_text_content(BytesText::new(text))
        .unwrap();
}

fn write_table<W: Write>(w: &mut XmlWriter<W>, table: &Table, table_id: usize) {
    let name = format!("Table{table_id}");
    w.create_element("table:table")
        .with_attribute(("table:name", Cow::from(name)))
        .write_inner_content(|w| {
            for _ in 0..table.n[Axis2::X] {
                w.create_element("table:table-column").write_empty()?;
            }
            for y in 0..table.n.y() {
                w.create_element("table:table-row").write_inner_content(|w| {
                    for x in table.iter_x(y) {
                        let cell = table.get(Coord2::new(x, y));
                        if cell.is_top_left() {
                            let draw = DrawCell::new(cell.inner(), table);
                            let text = draw.display().to_string();
                            let col_span = cell.col_span();
                            let row_span = cell.row_span();
                            let mut elem = w.create_element("table:table-cell");
                            if col_span > 1 {
                                elem = elem.with_attribute((
                                    "table:number-columns-spanned",
                                    Cow::from(col_span.to_string()),
                                ));
                            }
                            if row_span > 1 {
                                elem = elem.with_attribute((
                                    "table:number-rows-spanned",
                                    Cow::from(row_span.to_string()),
                                ));
                            }
                            elem.write_inner_content(|w| {
                                write_paragraph(w, "Table_20_Contents", &text);
                                Ok(())
                            })?;
                            for extra_x in x + 1..cell.next_x().min(table.n.x()) {
                                let _ = extra_x;
                                w.create_element("table:covered-table-cell").write_empty()?;
                            }
                        } else {
                            w.create_element("table:covered-table-cell").write_empty()?;
                        }
                    }
                    Ok(())
                })?;
            }
            Ok(())
        })
        .unwrap();
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

const CONTENT_NAMESPACES: &str = concat!(
    r#"xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" "#,
    r#"xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" "#,
    r#"xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" "#,
    r#"xmlns:style="urn:oasis:names:tc:opendocument:xmlns:style:1.0" "#,
    r#"xmlns:fo="urn:oasis:names:tc:opendocument:xmlns:xsl-fo-compatible:1.0" "#,
    r#"office:version="1.2""#
);

const MANIFEST_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0" manifest:version="1.2">
 <manifest:file-entry manifest:full-path="/" manifest:version="1.2" manifest:media-type="application/vnd.oasis.opendocument.text"/>
 <manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml"/>
</manifest:manifest>
"#;

impl<W: Write + Seek> Driver for OdtDriver<W> {
    fn name(&self) -> Cow<'static, str> {
        Cow::from("odt")
    }

    fn write(&mut self, item: &Arc<Item>) {
        match &item.details {
            Details::Chart | Details::Image => (),
            Details::Group(children) => {
                for child in children.iter() {
                    self.write(child);
                }
            }
            Details::Message(diagnostic) => {
                let closing = b"</office:text>";
                let pos = find_subslice(&self.content, closing)
                    .unwrap_or(self.content.len().saturating_sub(closing.len()));
                let mut body = Vec::new();
                write_paragraph(
                    &mut XmlWriter::new(&mut body),
                    "Log",
                    &diagnostic.to_string(),
                );
                self.content.splice(pos..pos, body);
            }
            Details::PageBreak => (),
            Details::Table(pivot_table) => {
                self.render(pivot_table).unwrap(); // XXX error handling
            }
            Details::Text(text) => {
                self.render(&PivotTable::from((**text).clone())).unwrap(); // XXX
            }
        }
    }

    fn flush(&mut self) {}
}

impl<W: Write + Seek> OdtDriver<W> {
    /// Finalizes the document: writes `content.xml` and closes the archive.
    /// Unlike the SPV driver's manifest, ODT's member list is static, so no
    /// second manifest write is needed here.
    pub fn close(mut self) -> std::io::Result<W> {
        self.zip.start_file(
            "content.xml",
            FileOptions {
                method: Method::Deflate,
            },
        )?;
        self.zip.write_all(&self.content)?;
        self.zip.finish()
    }
}
