//! App icon set: every iOS size from one source image, with an optional
//! ribbon naming the environment.

use anyhow::{bail, Context as _, Result};
use image::{imageops::FilterType, DynamicImage, ImageFormat, ImageReader, RgbaImage};
use serde_json::json;
use serde_yaml::Value;
use std::{collections::BTreeSet, fs, io::Cursor};
use tracing::debug;

use super::Artifact;
use crate::{
    context::ProjectContext,
    key::{value_to_string, ResolvedMap},
};

const BASE_SIZE: u32 = 1024;
const FILE_PREFIX: &str = "AppIcon";

const RIBBON_FILL: [u8; 4] = [0, 0, 0, 170];
const RIBBON_TEXT: [u8; 4] = [255, 255, 255, 255];

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

#[derive(Debug, Clone, Copy)]
struct Slot {
    idiom: &'static str,
    points: &'static str,
    scale: u32,
    pixels: u32,
}

const fn slot(idiom: &'static str, points: &'static str, scale: u32, pixels: u32) -> Slot {
    Slot {
        idiom,
        points,
        scale,
        pixels,
    }
}

const SLOTS: [Slot; 18] = [
    slot("iphone", "20", 2, 40),
    slot("iphone", "20", 3, 60),
    slot("iphone", "29", 2, 58),
    slot("iphone", "29", 3, 87),
    slot("iphone", "40", 2, 80),
    slot("iphone", "40", 3, 120),
    slot("iphone", "60", 2, 120),
    slot("iphone", "60", 3, 180),
    slot("ipad", "20", 1, 20),
    slot("ipad", "20", 2, 40),
    slot("ipad", "29", 1, 29),
    slot("ipad", "29", 2, 58),
    slot("ipad", "40", 1, 40),
    slot("ipad", "40", 2, 80),
    slot("ipad", "76", 1, 76),
    slot("ipad", "76", 2, 152),
    slot("ipad", "83.5", 2, 167),
    slot("ios-marketing", "1024", 1, 1024),
];

impl Slot {
    fn filename(&self) -> String {
        format!("{FILE_PREFIX}-{}@{}x.png", self.points, self.scale)
    }
}

/// Resize `original` into `appiconset` and write its `Contents.json`.
///
/// An empty mapping emits nothing.
pub fn render(ctx: &ProjectContext, mapping: &ResolvedMap) -> Result<Vec<Artifact>> {
    if mapping.is_empty() {
        return Ok(Vec::new());
    }

    let Some(original) = mapping.effective("original").and_then(Value::as_str) else {
        bail!("app_icon.original must be a path to the source image");
    };
    let Some(appiconset) = mapping.effective("appiconset").and_then(Value::as_str) else {
        bail!("app_icon.appiconset must be a path to the .appiconset directory");
    };
    let ribbon = mapping
        .effective("ribbon")
        .map(value_to_string)
        .filter(|label| !label.trim().is_empty());

    let source = ctx.path(original);
    let data = fs::read(&source).with_context(|| format!("Cannot find {}", source.display()))?;
    let image = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .context("failed to guess image format")?
        .decode()
        .with_context(|| format!("failed to decode {}", source.display()))?;

    let mut base = image
        .resize_exact(BASE_SIZE, BASE_SIZE, FilterType::Lanczos3)
        .to_rgba8();
    if let Some(label) = &ribbon {
        debug!(label = %label, "drawing ribbon");
        draw_ribbon(&mut base, label);
    }
    let base = DynamicImage::ImageRgba8(base);

    let dir = ctx.path(appiconset);
    let mut artifacts = Vec::new();
    let mut written = BTreeSet::new();
    let mut images = Vec::with_capacity(SLOTS.len());

    for slot in SLOTS {
        let filename = slot.filename();
        images.push(json!({
            "filename": filename,
            "idiom": slot.idiom,
            "scale": format!("{}x", slot.scale),
            "size": format!("{0}x{0}", slot.points),
        }));
        if !written.insert(filename.clone()) {
            continue;
        }

        let resized = base.resize_exact(slot.pixels, slot.pixels, FilterType::Lanczos3);
        // App Store icons must not carry an alpha channel.
        let resized = if slot.idiom == "ios-marketing" {
            DynamicImage::ImageRgb8(resized.to_rgb8())
        } else {
            resized
        };

        let mut png = Cursor::new(Vec::new());
        resized
            .write_to(&mut png, ImageFormat::Png)
            .with_context(|| format!("failed to encode {filename}"))?;
        artifacts.push(Artifact::bytes(dir.join(&filename), png.into_inner()));
    }

    let manifest = json!({
        "images": images,
        "info": {
            "author": "natrium",
            "version": 1,
        },
    });
    let mut text = serde_json::to_string_pretty(&manifest)?;
    text.push('\n');
    artifacts.push(Artifact::text(dir.join("Contents.json"), text));

    Ok(artifacts)
}

/// Darken the bottom fifth of the icon and print `label` across it.
fn draw_ribbon(canvas: &mut RgbaImage, label: &str) {
    let (width, height) = canvas.dimensions();
    let band = (height / 5).max(1);
    let top = height - band;

    for y in top..height {
        for x in 0..width {
            blend(canvas, x, y, RIBBON_FILL);
        }
    }

    let chars: Vec<char> = label.trim().chars().collect();
    if chars.is_empty() {
        return;
    }
    let columns = chars.len() as u32 * (GLYPH_WIDTH + 1) - 1;
    let scale = (band * 6 / 10 / GLYPH_HEIGHT).min(width * 9 / 10 / columns);
    if scale == 0 {
        return;
    }

    let x0 = (width - columns * scale) / 2;
    let y0 = top + (band - GLYPH_HEIGHT * scale) / 2;
    for (i, c) in chars.iter().enumerate() {
        let gx = x0 + i as u32 * (GLYPH_WIDTH + 1) * scale;
        for (row, bits) in glyph(*c).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits >> (GLYPH_WIDTH - 1 - col) & 1 == 0 {
                    continue;
                }
                let px = gx + col * scale;
                let py = y0 + row as u32 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        blend(canvas, px + dx, py + dy, RIBBON_TEXT);
                    }
                }
            }
        }
    }
}

fn blend(canvas: &mut RgbaImage, x: u32, y: u32, color: [u8; 4]) {
    if x >= canvas.width() || y >= canvas.height() {
        return;
    }
    let pixel = canvas.get_pixel_mut(x, y);
    let alpha = u32::from(color[3]);
    for i in 0..3 {
        let mixed = u32::from(color[i]) * alpha + u32::from(pixel.0[i]) * (255 - alpha);
        pixel.0[i] = (mixed / 255) as u8;
    }
    pixel.0[3] = pixel.0[3].max(color[3]);
}

/// 5x7 bitmap, one row per byte, most significant of the low five bits on
/// the left. Unknown characters are blank.
fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        _ => [0; 7],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dispatch::Selection, emit::Contents, key::ResolvedKey};
    use image::{GenericImageView, Rgba};
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use tempfile::TempDir;

    fn ctx(dir: &Path) -> ProjectContext {
        ProjectContext::new(dir, Selection::new("dev", "Debug", "App"), "App/Info.plist")
    }

    fn icon_mapping(ribbon: Option<&str>) -> ResolvedMap {
        let mut mapping: ResolvedMap = [
            (ResolvedKey::environment("dev", "original"), Value::from("icons/dev.png")),
            (
                ResolvedKey::global("appiconset"),
                Value::from("App/Assets.xcassets/AppIcon.appiconset"),
            ),
        ]
        .into_iter()
        .collect();
        if let Some(ribbon) = ribbon {
            mapping.insert(ResolvedKey::environment("dev", "ribbon"), Value::from(ribbon));
        }
        mapping
    }

    fn write_source(dir: &Path) {
        let path = dir.join("icons/dev.png");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbaImage::from_pixel(64, 64, Rgba([200, 30, 30, 255]))
            .save(&path)
            .unwrap();
    }

    fn bytes_of<'a>(artifacts: &'a [Artifact], name: &str) -> &'a [u8] {
        artifacts
            .iter()
            .find(|a| a.path.ends_with(name))
            .and_then(|a| match &a.contents {
                Contents::Bytes(bytes) => Some(bytes.as_slice()),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn writes_every_size_and_manifest() {
        let temp = TempDir::new().unwrap();
        write_source(temp.path());

        let artifacts = render(&ctx(temp.path()), &icon_mapping(None)).unwrap();
        // 15 distinct files plus Contents.json.
        assert_eq!(artifacts.len(), 16);

        let icon = image::load_from_memory(bytes_of(&artifacts, "AppIcon-60@3x.png")).unwrap();
        assert_eq!(icon.dimensions(), (180, 180));
        let ipad_pro = image::load_from_memory(bytes_of(&artifacts, "AppIcon-83.5@2x.png")).unwrap();
        assert_eq!(ipad_pro.dimensions(), (167, 167));
        let marketing = image::load_from_memory(bytes_of(&artifacts, "AppIcon-1024@1x.png")).unwrap();
        assert!(!marketing.color().has_alpha());

        let manifest = artifacts.last().unwrap();
        assert!(manifest
            .path
            .ends_with("App/Assets.xcassets/AppIcon.appiconset/Contents.json"));
        let Contents::Text(text) = &manifest.contents else {
            panic!("expected text");
        };
        let manifest: serde_json::Value = serde_json::from_str(text).unwrap();
        let images = manifest["images"].as_array().unwrap();
        assert_eq!(images.len(), 18);
        assert_eq!(images[16]["filename"], "AppIcon-83.5@2x.png");
        assert_eq!(images[16]["size"], "83.5x83.5");
        assert_eq!(images[16]["scale"], "2x");
    }

    #[test]
    fn ribbon_darkens_the_bottom_band() {
        let temp = TempDir::new().unwrap();
        write_source(temp.path());

        let plain = render(&ctx(temp.path()), &icon_mapping(None)).unwrap();
        let ribboned = render(&ctx(temp.path()), &icon_mapping(Some("DEV"))).unwrap();
        let plain = image::load_from_memory(bytes_of(&plain, "AppIcon-60@3x.png")).unwrap();
        let ribboned = image::load_from_memory(bytes_of(&ribboned, "AppIcon-60@3x.png")).unwrap();

        assert_eq!(plain.get_pixel(2, 2), ribboned.get_pixel(2, 2));
        assert!(ribboned.get_pixel(2, 177).0[0] < plain.get_pixel(2, 177).0[0]);
    }

    #[test]
    fn empty_ribbon_is_no_ribbon() {
        let temp = TempDir::new().unwrap();
        write_source(temp.path());

        let plain = render(&ctx(temp.path()), &icon_mapping(None)).unwrap();
        let blank = render(&ctx(temp.path()), &icon_mapping(Some(""))).unwrap();
        assert_eq!(plain, blank);
    }

    #[test]
    fn ribbon_prints_label_in_text_colour() {
        let mut canvas = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 255, 255]));
        draw_ribbon(&mut canvas, "dev");

        let band: Vec<_> = (80..100)
            .flat_map(|y| (0..100).map(move |x| (x, y)))
            .map(|(x, y)| *canvas.get_pixel(x, y))
            .collect();
        assert!(band.contains(&Rgba(RIBBON_TEXT)));
        assert!((0..80).all(|y| *canvas.get_pixel(50, y) == Rgba([0, 0, 255, 255])));
    }

    #[test]
    fn glyphs_ignore_case() {
        assert_eq!(glyph('d'), glyph('D'));
        assert_eq!(glyph('?'), [0; 7]);
    }

    #[test]
    fn empty_mapping_emits_nothing() {
        let temp = TempDir::new().unwrap();
        assert!(render(&ctx(temp.path()), &ResolvedMap::new()).unwrap().is_empty());
    }

    #[test]
    fn missing_source_is_an_error() {
        let temp = TempDir::new().unwrap();
        let err = render(&ctx(temp.path()), &icon_mapping(None)).unwrap_err();
        assert!(err.to_string().contains("Cannot find"));
    }

    #[test]
    fn missing_original_is_an_error() {
        let mapping: ResolvedMap = [(ResolvedKey::global("appiconset"), Value::from("x"))]
            .into_iter()
            .collect();
        assert!(render(&ctx(Path::new("/p")), &mapping).is_err());
    }
}
