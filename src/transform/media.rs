//! Image optimization.
//!
//! | Format     | Treatment                                         |
//! |------------|---------------------------------------------------|
//! | JPEG       | re-encoded at the configured quality              |
//! | PNG        | re-encoded with the configured compression level  |
//! | SVG        | comments, editor metadata and layout blanks removed |
//! | others     | copied unchanged                                  |
//!
//! The smaller of original and optimized bytes is kept, so running the step
//! on its own output never grows a file.

use std::io::Cursor;

use image::{
    DynamicImage, ImageFormat,
    codecs::{
        jpeg::JpegEncoder,
        png::{CompressionType, FilterType, PngEncoder},
    },
};
use quick_xml::{
    Reader, Writer,
    events::{BytesStart, Event},
};

use super::Transform;
use crate::{asset::Asset, config::ImagesConfig, error::TransformError};

/// SVG elements that only carry editor state.
const EDITOR_ELEMENTS: &[&[u8]] = &[b"metadata", b"sodipodi:namedview"];
/// Elements whose whitespace is rendered.
const TEXT_ELEMENTS: &[&[u8]] = &[b"text", b"tspan", b"textPath", b"title", b"desc", b"style"];
/// Attribute prefixes written by vector editors.
const EDITOR_PREFIXES: &[&[u8]] = &[b"inkscape:", b"sodipodi:", b"xmlns:inkscape", b"xmlns:sodipodi"];

pub struct OptimizeImage {
    jpeg_quality: u8,
    png_level: u8,
}

impl OptimizeImage {
    pub fn new(config: &ImagesConfig) -> Self {
        Self {
            jpeg_quality: config.jpeg_quality,
            png_level: config.png_level,
        }
    }

    fn optimize(&self, ext: &str, bytes: &[u8]) -> Result<Option<Vec<u8>>, TransformError> {
        let optimized = match ext {
            "jpg" | "jpeg" => {
                let img = decode(bytes, ImageFormat::Jpeg)?;
                encode_jpeg(&img, self.jpeg_quality)?
            }
            "png" => {
                let img = decode(bytes, ImageFormat::Png)?;
                encode_png(&img, self.png_level)?
            }
            "svg" => clean_svg(bytes)?,
            _ => return Ok(None),
        };
        Ok(Some(optimized))
    }
}

impl Transform for OptimizeImage {
    fn name(&self) -> &'static str {
        "optimize-image"
    }

    fn apply(&self, mut asset: Asset) -> Result<Asset, TransformError> {
        let Some(ext) = asset.extension() else {
            return Ok(asset);
        };
        if let Some(optimized) = self.optimize(&ext, &asset.contents)?
            && optimized.len() < asset.contents.len()
        {
            asset.contents = optimized;
        }
        Ok(asset)
    }
}

fn decode(bytes: &[u8], format: ImageFormat) -> Result<DynamicImage, TransformError> {
    image::load_from_memory_with_format(bytes, format).map_err(TransformError::image)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, TransformError> {
    let mut buf = Vec::new();
    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    rgb.write_with_encoder(encoder).map_err(TransformError::image)?;
    Ok(buf)
}

fn encode_png(img: &DynamicImage, level: u8) -> Result<Vec<u8>, TransformError> {
    let compression = match level {
        0..=2 => CompressionType::Fast,
        3..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    };
    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buf, compression, FilterType::Adaptive);
    img.write_with_encoder(encoder).map_err(TransformError::image)?;
    Ok(buf)
}

// ============================================================================
// SVG
// ============================================================================

fn is_editor_attr(key: &[u8]) -> bool {
    EDITOR_PREFIXES.iter().any(|p| key.starts_with(p))
}

fn strip_editor_attrs(elem: &BytesStart<'_>) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(elem.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    for attr in elem.attributes().flatten() {
        if !is_editor_attr(attr.key.as_ref()) {
            out.push_attribute(attr);
        }
    }
    out
}

/// Lossless SVG cleanup. Ids and `viewBox` are always kept.
fn clean_svg(bytes: &[u8]) -> Result<Vec<u8>, TransformError> {
    let mut reader = Reader::from_reader(bytes);
    let mut writer = Writer::new(Cursor::new(Vec::with_capacity(bytes.len())));
    let mut buf = Vec::new();
    // depth inside an element that is dropped with its children
    let mut skip = 0usize;
    // depth inside text content, where blank text is significant
    let mut text = 0usize;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(TransformError::image)?;
        match event {
            Event::Eof => break,
            Event::Start(e) if skip > 0 || EDITOR_ELEMENTS.contains(&e.name().as_ref()) => skip += 1,
            Event::End(_) if skip > 0 => skip -= 1,
            _ if skip > 0 => {}
            Event::Empty(e) if EDITOR_ELEMENTS.contains(&e.name().as_ref()) => {}
            Event::Comment(_) | Event::DocType(_) | Event::PI(_) => {}
            Event::Text(t) if text == 0 && t.iter().all(u8::is_ascii_whitespace) => {}
            Event::Start(e) => {
                if TEXT_ELEMENTS.contains(&e.name().as_ref()) {
                    text += 1;
                }
                writer
                    .write_event(Event::Start(strip_editor_attrs(&e)))
                    .map_err(TransformError::image)?
            }
            Event::End(e) => {
                if TEXT_ELEMENTS.contains(&e.name().as_ref()) {
                    text = text.saturating_sub(1);
                }
                writer.write_event(Event::End(e)).map_err(TransformError::image)?
            }
            Event::Empty(e) => writer
                .write_event(Event::Empty(strip_editor_attrs(&e)))
                .map_err(TransformError::image)?,
            other => writer.write_event(other).map_err(TransformError::image)?,
        }
        buf.clear();
    }

    Ok(writer.into_inner().into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn optimizer() -> OptimizeImage {
        OptimizeImage::new(&ImagesConfig::default())
    }

    fn apply(name: &str, bytes: Vec<u8>) -> Asset {
        optimizer().apply(Asset::new(name, format!("/src/{name}"), bytes)).unwrap()
    }

    #[test]
    fn test_svg_cleanup() {
        let svg = br#"<?xml version="1.0"?>
<!-- Generator: editor -->
<svg xmlns="http://www.w3.org/2000/svg" xmlns:inkscape="x" inkscape:version="1" viewBox="0 0 10 10">
  <metadata><rdf>junk</rdf></metadata>
  <sodipodi:namedview id="nv"/>
  <rect id="r" width="10" height="10"/>
</svg>
"#;
        let out = apply("icon.svg", svg.to_vec());
        let text = String::from_utf8(out.contents).unwrap();
        assert!(text.contains(r#"viewBox="0 0 10 10""#));
        assert!(text.contains(r#"<rect id="r" width="10" height="10"/>"#));
        assert!(!text.contains("Generator"));
        assert!(!text.contains("metadata"));
        assert!(!text.contains("inkscape"));
        assert!(!text.contains("namedview"));
    }

    #[test]
    fn test_svg_keeps_spaces_in_text() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg">
  <!-- label -->
  <text x="0"><tspan>Hello</tspan> <tspan>world</tspan></text>
</svg>"#;
        let out = apply("label.svg", svg.to_vec());
        let text = String::from_utf8(out.contents).unwrap();
        assert!(text.contains("<tspan>Hello</tspan> <tspan>world</tspan>"));
        assert!(!text.contains("label"));
    }

    #[test]
    fn test_already_minimal_svg_unchanged() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg"><rect width="1" height="1"/></svg>"#;
        let out = apply("a.svg", svg.to_vec());
        assert_eq!(out.contents, svg.to_vec());
    }

    #[test]
    fn test_png_never_grows() {
        let img = RgbImage::from_pixel(32, 32, Rgb([200, 10, 10]));
        let mut original = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut original), ImageFormat::Png)
            .unwrap();

        let out = apply("red.png", original.clone());
        assert!(out.contents.len() <= original.len());
        // still a decodable png
        image::load_from_memory_with_format(&out.contents, ImageFormat::Png).unwrap();
    }

    #[test]
    fn test_jpeg_reencode() {
        let img = RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 128]));
        let mut original = Vec::new();
        JpegEncoder::new_with_quality(&mut original, 100)
            .encode_image(&img)
            .unwrap();

        let out = apply("photo.jpg", original.clone());
        assert!(out.contents.len() < original.len());
    }

    #[test]
    fn test_other_formats_pass_through() {
        let bytes = b"{\"name\":\"site\"}".to_vec();
        let out = apply("site.webmanifest", bytes.clone());
        assert_eq!(out.contents, bytes);
    }

    #[test]
    fn test_corrupt_png_is_error() {
        let result = optimizer().apply(Asset::new("bad.png", "/src/bad.png", b"not a png".to_vec()));
        assert!(matches!(result, Err(TransformError::Image(_))));
    }
}
