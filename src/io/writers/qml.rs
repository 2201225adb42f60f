//! QGIS paletted-renderer style files (`.qml`).
use std::path::Path;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::error::Result;

/// One palette entry of a paletted raster renderer
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteEntry {
    pub value: i64,
    pub color: [u8; 3],
    pub label: String,
    /// Fully transparent entry
    pub transparent: bool,
}

impl PaletteEntry {
    pub fn hex(&self) -> String {
        format!(
            "#{:02x}{:02x}{:02x}",
            self.color[0], self.color[1], self.color[2]
        )
    }
}

/// Serialize a paletted renderer for band 1
pub fn palette_qml(entries: &[PaletteEntry]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::DocType(BytesText::from_escaped(
        "qgis PUBLIC 'http://mrcc.com/qgis.dtd' 'SYSTEM'",
    )))?;
    writer.write_event(Event::Start(BytesStart::new("qgis").with_attributes([
        ("version", "3.22.0"),
        ("minScale", "0"),
        ("maxScale", "1e+08"),
        ("styleCategories", "AllStyleCategories"),
    ])))?;
    writer.write_event(Event::Start(BytesStart::new("pipe")))?;
    writer.write_event(Event::Start(BytesStart::new("rasterrenderer").with_attributes([
        ("opacity", "1"),
        ("type", "paletted"),
        ("band", "1"),
    ])))?;
    writer.write_event(Event::Empty(BytesStart::new("rasterTransparency")))?;
    writer.write_event(Event::Start(BytesStart::new("colorPalette")))?;
    for entry in entries {
        let value = entry.value.to_string();
        let color = entry.hex();
        let mut elem = BytesStart::new("paletteEntry").with_attributes([
            ("value", value.as_str()),
            ("color", color.as_str()),
            ("label", entry.label.as_str()),
        ]);
        if entry.transparent {
            elem.push_attribute(("alpha", "0"));
        }
        writer.write_event(Event::Empty(elem))?;
    }
    writer.write_event(Event::End(BytesEnd::new("colorPalette")))?;
    writer.write_event(Event::End(BytesEnd::new("rasterrenderer")))?;
    writer.write_event(Event::End(BytesEnd::new("pipe")))?;
    writer.write_event(Event::End(BytesEnd::new("qgis")))?;
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

/// Write a paletted renderer style next to a raster
pub fn write_palette_qml(path: &Path, entries: &[PaletteEntry]) -> Result<()> {
    let xml = palette_qml(entries)?;
    std::fs::write(path, xml)?;
    Ok(())
}
