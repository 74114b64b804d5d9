//! Appends content to pages of a freshly loaded document.

use std::collections::{BTreeMap, HashSet};

use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::content::encode_commands;
use crate::raster::{inherited, media_box, resolve};
use crate::resources::{EmbeddedFont, FontHandle, FontResource};
use crate::{
    load_document, DocumentWriter, DrawCommand, GraphicsStateParams, PageSize, PdfEngineError,
    Result,
};

pub struct LopdfWriter {
    doc: Document,
    pages: Vec<ObjectId>,
    fonts: Vec<ObjectId>,
    wrapped: HashSet<u32>,
}

impl LopdfWriter {
    pub fn open(bytes: &[u8]) -> Result<Self> {
        let doc = load_document(bytes)?;
        let pages = doc.get_pages().into_values().collect();
        Ok(Self { doc, pages, fonts: Vec::new(), wrapped: HashSet::new() })
    }

    fn page_id(&self, page_index: u32) -> Result<ObjectId> {
        self.pages.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: self.pages.len() as u32,
        })
    }

    /// Add `value` under a fresh `{prefix}{n}` name in the page's
    /// `Resources/<category>` dictionary.
    ///
    /// Inherited or referenced resource dictionaries are copied onto the page
    /// first so other pages sharing them are left untouched.
    fn bind_resource(
        &mut self,
        page_index: u32,
        category: &[u8],
        prefix: &str,
        value: Object,
    ) -> Result<String> {
        let page_id = self.page_id(page_index)?;

        let mut resources = inherited(&self.doc, page_id, b"Resources")
            .and_then(|obj| resolve(&self.doc, obj).as_dict().ok())
            .cloned()
            .unwrap_or_default();
        let mut entries = resources
            .get(category)
            .ok()
            .and_then(|obj| resolve(&self.doc, obj).as_dict().ok())
            .cloned()
            .unwrap_or_default();

        let mut n = 1;
        let name = loop {
            let candidate = format!("{prefix}{n}");
            if !entries.has(candidate.as_bytes()) {
                break candidate;
            }
            n += 1;
        };

        entries.set(name.as_bytes().to_vec(), value);
        resources.set(category.to_vec(), Object::Dictionary(entries));
        self.doc.get_dictionary_mut(page_id)?.set("Resources", Object::Dictionary(resources));
        Ok(name)
    }

    fn existing_contents(&self, page_id: ObjectId) -> Result<Vec<Object>> {
        let page = self.doc.get_dictionary(page_id)?;
        let contents = match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match self.doc.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        Ok(contents)
    }

    fn add_type0_font(&mut self, font: &EmbeddedFont) -> ObjectId {
        let base_font = Object::Name(sanitize_font_name(&font.base_font).into_bytes());
        let metrics = font.metrics;

        let program = Stream::new(
            dictionary! { "Length1" => font.program.len() as i64 },
            font.program.to_vec(),
        );
        let program_id = self.doc.add_object(program);

        let descriptor_id = self.doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => base_font.clone(),
            "Flags" => 32,
            "FontBBox" => metrics.bbox.iter().map(|v| Object::Integer(i64::from(*v))).collect::<Vec<_>>(),
            "ItalicAngle" => 0,
            "Ascent" => metrics.ascent,
            "Descent" => metrics.descent,
            "CapHeight" => metrics.cap_height,
            "StemV" => 80,
            "MissingWidth" => i64::from(metrics.missing_width),
            "FontFile2" => program_id,
        });

        let mut widths = Vec::with_capacity(font.widths.len() * 2);
        for (gid, width) in &font.widths {
            widths.push(Object::Integer(i64::from(*gid)));
            widths.push(Object::Array(vec![Object::Integer(i64::from(*width))]));
        }

        let cid_font_id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => base_font.clone(),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
            "FontDescriptor" => descriptor_id,
            "DW" => i64::from(metrics.missing_width),
            "W" => widths,
            "CIDToGIDMap" => "Identity",
        });

        let to_unicode_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, to_unicode_cmap(&font.to_unicode).into_bytes()));

        self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => base_font,
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Reference(cid_font_id)],
            "ToUnicode" => to_unicode_id,
        })
    }
}

impl DocumentWriter for LopdfWriter {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, page_index: u32) -> Result<PageSize> {
        let [x0, y0, x1, y1] = media_box(&self.doc, self.page_id(page_index)?);
        Ok(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
    }

    fn add_font(&mut self, font: &FontResource) -> Result<FontHandle> {
        let id = match font {
            FontResource::Standard { base_font } => self.doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
                "Encoding" => "WinAnsiEncoding",
            }),
            FontResource::TrueType(embedded) => self.add_type0_font(embedded),
        };
        self.fonts.push(id);
        Ok(FontHandle(self.fonts.len() as u32 - 1))
    }

    fn bind_font(&mut self, page_index: u32, font: FontHandle) -> Result<String> {
        let id = *self.fonts.get(font.0 as usize).ok_or(PdfEngineError::UnknownFont(font.0))?;
        self.bind_resource(page_index, b"Font", "AnF", Object::Reference(id))
    }

    fn bind_graphics_state(
        &mut self,
        page_index: u32,
        state: &GraphicsStateParams,
    ) -> Result<String> {
        let id = self.doc.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => state.fill_alpha,
            "CA" => state.stroke_alpha,
            "BM" => Object::Name(state.blend_mode.pdf_name().to_vec()),
        });
        self.bind_resource(page_index, b"ExtGState", "AnGS", Object::Reference(id))
    }

    fn append_content(&mut self, page_index: u32, commands: &[DrawCommand]) -> Result<()> {
        let page_id = self.page_id(page_index)?;
        let mut data = encode_commands(commands)?;
        let mut contents = self.existing_contents(page_id)?;

        // The first append isolates the original content in q/Q so appended
        // operators start from the default graphics state.
        if self.wrapped.insert(page_index) && !contents.is_empty() {
            let open_id = self.doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
            contents.insert(0, Object::Reference(open_id));
            let mut closed = b"Q\n".to_vec();
            closed.append(&mut data);
            data = closed;
        }

        let stream_id = self.doc.add_object(Stream::new(dictionary! {}, data));
        contents.push(Object::Reference(stream_id));
        self.doc.get_dictionary_mut(page_id)?.set("Contents", Object::Array(contents));
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|err| PdfEngineError::Backend(format!("failed to serialize document: {err}")))?;
        Ok(buffer)
    }
}

fn sanitize_font_name(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '-').collect();
    if cleaned.is_empty() {
        "EmbeddedFont".to_owned()
    } else {
        cleaned
    }
}

fn to_unicode_cmap(map: &BTreeMap<u16, char>) -> String {
    let entries: Vec<(&u16, &char)> = map.iter().collect();

    let mut out = String::new();
    out.push_str("/CIDInit /ProcSet findresource begin\n");
    out.push_str("12 dict begin\n");
    out.push_str("begincmap\n");
    out.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
    out.push_str("/CMapName /Adobe-Identity-UCS def\n");
    out.push_str("/CMapType 2 def\n");
    out.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

    for chunk in entries.chunks(100) {
        out.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (gid, ch) in chunk {
            let mut units = [0u16; 2];
            let hex: String =
                ch.encode_utf16(&mut units).iter().map(|unit| format!("{unit:04X}")).collect();
            out.push_str(&format!("<{gid:04X}> <{hex}>\n"));
        }
        out.push_str("endbfchar\n");
    }

    out.push_str("endcmap\n");
    out.push_str("CMapName currentdict /CMap defineresource pop\n");
    out.push_str("end\nend\n");
    out
}
