//! Local and remote images normalized to bounded PNGs.

use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use reqwest::blocking::Client;
use tracing::debug;

use super::mermaid_ink::{fetch_bytes, http_client};
use super::{ArtifactRenderer, RenderError, RenderFormat};

/// Widest artifact produced; wider images are scaled down.
pub const MAX_WIDTH: u32 = 800;

/// Decodes an image file or URL and re-encodes it as a PNG no wider than
/// [`MAX_WIDTH`].
pub struct ImageRenderer {
    client: Client,
}

impl ImageRenderer {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
        })
    }

    fn load(&self, source: &str) -> Result<Vec<u8>, RenderError> {
        if source.starts_with("http://") || source.starts_with("https://") {
            return fetch_bytes(&self.client, source);
        }
        let path = Path::new(source);
        std::fs::read(path)
            .map_err(|err| RenderError::InvalidSource(format!("{}: {err}", path.display())))
    }
}

impl ArtifactRenderer for ImageRenderer {
    fn version_tag(&self) -> &str {
        "image/1"
    }

    fn render(&self, source: &str, format: RenderFormat) -> Result<Vec<u8>, RenderError> {
        if format != RenderFormat::Png {
            return Err(RenderError::InvalidSource(format!(
                "images are stored as png, not {}",
                format.name()
            )));
        }
        let bytes = self.load(source.trim())?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|err| RenderError::InvalidSource(format!("cannot decode image: {err}")))?;
        debug!(
            source,
            width = decoded.width(),
            height = decoded.height(),
            "normalizing image"
        );
        encode_png(&fit_width(decoded, MAX_WIDTH))
    }
}

/// Scale down to `max_width`, keeping the aspect ratio. Narrower images are
/// returned untouched.
pub fn fit_width(img: DynamicImage, max_width: u32) -> DynamicImage {
    if img.width() <= max_width {
        return img;
    }
    img.resize(max_width, u32::MAX, FilterType::Lanczos3)
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, RenderError> {
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|err| RenderError::InvalidSource(format!("cannot encode png: {err}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageReader, RgbaImage};
    use tempfile::tempdir;

    fn write_png(path: &Path, width: u32, height: u32) {
        RgbaImage::new(width, height).save(path).unwrap();
    }

    fn dimensions(bytes: &[u8]) -> (u32, u32) {
        let img = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .unwrap()
            .decode()
            .unwrap();
        (img.width(), img.height())
    }

    #[test]
    fn test_wide_image_is_scaled_to_max_width() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.png");
        write_png(&path, 1600, 400);

        let renderer = ImageRenderer::new(Duration::from_secs(1)).unwrap();
        let bytes = renderer
            .render(path.to_str().unwrap(), RenderFormat::Png)
            .unwrap();
        assert!(RenderFormat::Png.matches_header(&bytes));
        assert_eq!(dimensions(&bytes), (800, 200));
    }

    #[test]
    fn test_narrow_image_keeps_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("small.png");
        write_png(&path, 40, 30);

        let renderer = ImageRenderer::new(Duration::from_secs(1)).unwrap();
        let bytes = renderer
            .render(path.to_str().unwrap(), RenderFormat::Png)
            .unwrap();
        assert_eq!(dimensions(&bytes), (40, 30));
    }

    #[test]
    fn test_missing_file_is_invalid_source() {
        let dir = tempdir().unwrap();
        let renderer = ImageRenderer::new(Duration::from_secs(1)).unwrap();
        let missing = dir.path().join("nope.png");
        assert!(matches!(
            renderer.render(missing.to_str().unwrap(), RenderFormat::Png),
            Err(RenderError::InvalidSource(_))
        ));
    }

    #[test]
    fn test_undecodable_file_is_invalid_source() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake.png");
        std::fs::write(&path, b"not an image").unwrap();
        let renderer = ImageRenderer::new(Duration::from_secs(1)).unwrap();
        assert!(matches!(
            renderer.render(path.to_str().unwrap(), RenderFormat::Png),
            Err(RenderError::InvalidSource(_))
        ));
    }

    #[test]
    fn test_svg_output_is_rejected() {
        let renderer = ImageRenderer::new(Duration::from_secs(1)).unwrap();
        assert!(matches!(
            renderer.render("/tmp/x.png", RenderFormat::Svg),
            Err(RenderError::InvalidSource(_))
        ));
    }
}
