use crate::canvas::Canvas;
use crate::error::{FolioError, Result};
use crate::types::{Pt, Rect, Size};
use base64::Engine;
use image::GenericImageView;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageEncoding {
    Jpeg { data: Vec<u8>, gray: bool },
    Raw { rgb: Vec<u8>, alpha: Option<Vec<u8>> },
}

#[derive(Debug, Clone)]
pub struct ImageResource {
    key: u64,
    width_px: u32,
    height_px: u32,
    encoding: ImageEncoding,
}

impl ImageResource {
    pub fn from_bytes(data: &[u8]) -> Result<Arc<Self>> {
        Self::decode(data, None)
    }

    pub fn from_data_uri(uri: &str) -> Result<Arc<Self>> {
        let (mime, data) = parse_data_uri(uri)
            .ok_or_else(|| FolioError::config("malformed image data URI"))?;
        Self::decode(&data, Some(&mime))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|err| {
            FolioError::config(format!("cannot read image {}: {err}", path.display()))
        })?;
        Self::decode(&bytes, None)
    }

    fn decode(data: &[u8], mime: Option<&str>) -> Result<Arc<Self>> {
        let format = match mime {
            Some(mime) if mime.contains("png") => Some(image::ImageFormat::Png),
            Some(mime) if mime.contains("jpeg") || mime.contains("jpg") => {
                Some(image::ImageFormat::Jpeg)
            }
            _ => image::guess_format(data).ok(),
        };
        let decoded = image::load_from_memory(data)
            .map_err(|err| FolioError::config(format!("undecodable image: {err}")))?;
        let (width_px, height_px) = decoded.dimensions();
        if width_px == 0 || height_px == 0 {
            return Err(FolioError::config("image has no pixels"));
        }

        let encoding = if matches!(format, Some(image::ImageFormat::Jpeg)) {
            let gray = matches!(
                decoded.color(),
                image::ColorType::L8 | image::ColorType::La8
            );
            ImageEncoding::Jpeg {
                data: data.to_vec(),
                gray,
            }
        } else {
            let rgba = decoded.to_rgba8();
            let pixels = (width_px as usize) * (height_px as usize);
            let mut rgb = Vec::with_capacity(pixels * 3);
            let mut alpha = Vec::with_capacity(pixels);
            let mut translucent = false;
            for pixel in rgba.pixels() {
                let [r, g, b, a] = pixel.0;
                translucent |= a != 255;
                rgb.extend_from_slice(&[r, g, b]);
                alpha.push(a);
            }
            ImageEncoding::Raw {
                rgb,
                alpha: translucent.then_some(alpha),
            }
        };

        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        data.hash(&mut hasher);
        Ok(Arc::new(Self {
            key: hasher.finish(),
            width_px,
            height_px,
            encoding,
        }))
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn width_px(&self) -> u32 {
        self.width_px
    }

    pub fn height_px(&self) -> u32 {
        self.height_px
    }

    pub fn encoding(&self) -> &ImageEncoding {
        &self.encoding
    }

    pub fn natural_size(&self) -> Size {
        Size::new(
            Pt::from_i32(self.width_px as i32),
            Pt::from_i32(self.height_px as i32),
        )
    }
}

fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|mime| !mime.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains("base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .ok()?
    } else {
        payload.as_bytes().to_vec()
    };
    Some((mime, data))
}

#[derive(Debug, Clone)]
pub struct ImageBlock {
    pub resource: Arc<ImageResource>,
    pub width: Option<Pt>,
    pub height: Option<Pt>,
    size: Size,
}

impl ImageBlock {
    pub fn new(resource: Arc<ImageResource>) -> Self {
        Self {
            resource,
            width: None,
            height: None,
            size: Size::ZERO,
        }
    }

    fn requested(&self) -> Size {
        let natural = self.resource.natural_size();
        let (px_w, px_h) = (
            self.resource.width_px as i64,
            self.resource.height_px as i64,
        );
        match (self.width, self.height) {
            (Some(width), Some(height)) => Size::new(width, height),
            (Some(width), None) => Size::new(width, width.mul_ratio(px_h, px_w)),
            (None, Some(height)) => Size::new(height.mul_ratio(px_w, px_h), height),
            (None, None) => natural,
        }
    }

    pub(crate) fn layout(&mut self, max_width: Pt) {
        let requested = self.requested();
        self.size = if requested.width > max_width && requested.width > Pt::ZERO {
            let max = max_width.max(Pt::ZERO);
            let scaled = requested
                .height
                .mul_ratio(max.to_milli_i64(), requested.width.to_milli_i64());
            Size::new(max, scaled)
        } else {
            requested
        };
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub(crate) fn reset(&mut self) {
        self.size = Size::ZERO;
    }

    pub(crate) fn render(&self, canvas: &mut Canvas, content: Rect) {
        if self.size.width <= Pt::ZERO || self.size.height <= Pt::ZERO {
            return;
        }
        canvas.draw_image(
            Arc::clone(&self.resource),
            content.x,
            content.y,
            self.size.width,
            self.size.height,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::element::Element;
    use crate::element::testing::*;
    use image::{ImageBuffer, Rgba};
    use std::io::Cursor;

    fn png(width: u32, height: u32, alpha: u8) -> Vec<u8> {
        let buffer = ImageBuffer::from_pixel(width, height, Rgba([200u8, 10, 10, alpha]));
        let mut out = Cursor::new(Vec::new());
        buffer
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn decodes_png_into_raw_samples() {
        let resource = ImageResource::from_bytes(&png(4, 2, 255)).unwrap();
        assert_eq!((resource.width_px(), resource.height_px()), (4, 2));
        let ImageEncoding::Raw { rgb, alpha } = resource.encoding() else {
            panic!("raw expected");
        };
        assert_eq!(rgb.len(), 4 * 2 * 3);
        assert!(alpha.is_none());
    }

    #[test]
    fn keeps_alpha_plane_when_translucent() {
        let resource = ImageResource::from_bytes(&png(3, 3, 128)).unwrap();
        let ImageEncoding::Raw { alpha, .. } = resource.encoding() else {
            panic!("raw expected");
        };
        assert_eq!(alpha.as_ref().map(Vec::len), Some(9));
    }

    #[test]
    fn data_uri_round_trip() {
        let bytes = png(2, 2, 255);
        let uri = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&bytes)
        );
        let resource = ImageResource::from_data_uri(&uri).unwrap();
        assert_eq!(resource.key(), ImageResource::from_bytes(&bytes).unwrap().key());
    }

    #[test]
    fn garbage_is_a_configuration_error() {
        let err = ImageResource::from_bytes(b"not an image").unwrap_err();
        assert!(matches!(err, FolioError::Configuration(_)));
        assert!(ImageResource::from_data_uri("data:nocomma").is_err());
    }

    #[test]
    fn wide_images_scale_down_keeping_aspect() {
        let harness = Harness::new();
        let resource = ImageResource::from_bytes(&png(400, 200, 255)).unwrap();
        let mut element = Element::image(resource);
        let prepared = element.prepare(&harness.ctx(), size(100.0, 500.0)).unwrap();
        assert_eq!(prepared, size(100.0, 50.0));
    }

    #[test]
    fn explicit_width_derives_height() {
        let harness = Harness::new();
        let resource = ImageResource::from_bytes(&png(40, 20, 255)).unwrap();
        let mut element = Element::image(resource).with_size(Some(30.0), None);
        let prepared = element.prepare(&harness.ctx(), size(100.0, 500.0)).unwrap();
        assert_eq!(prepared, size(30.0, 15.0));

        let mut canvas = Canvas::new(Size::a4());
        element
            .render(&harness.render_ctx(), &mut canvas, pt(5.0), pt(6.0))
            .unwrap();
        let page = canvas.finish();
        assert!(page.pages[0].commands.iter().any(|cmd| matches!(
            cmd,
            Command::DrawImage { x, y, width, .. } if *x == pt(5.0) && *y == pt(6.0) && *width == pt(30.0)
        )));
    }

    #[test]
    fn images_never_split() {
        let harness = Harness::new();
        let resource = ImageResource::from_bytes(&png(10, 40, 255)).unwrap();
        let mut element = Element::image(resource);
        element.prepare(&harness.ctx(), size(100.0, 500.0)).unwrap();
        let outcome = element.split(&harness.ctx(), size(100.0, 20.0)).unwrap();
        assert!(!outcome.is_split());
    }
}
