//! Canvas assembly: background, contact shadow and product

use crate::{
    config::{CanvasConfig, HarmonizeConfig, OutputFormat},
    error::{HarmonizeError, Result},
    services::OutputFormatHandler,
    types::{ScalingInfo, ShadowSpec},
};
use image::{imageops, DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use imageproc::{drawing::draw_filled_ellipse_mut, filter::gaussian_blur_f32};
use tracing::{debug, instrument, warn};

/// Builds the final canvas for one product image
#[derive(Debug, Clone)]
pub struct Compositor {
    canvas: CanvasConfig,
    shadow_opacity: f32,
    output_format: OutputFormat,
    output_quality: u8,
}

impl Compositor {
    #[must_use]
    pub fn new(config: &HarmonizeConfig) -> Self {
        if config.quality_ignored() {
            warn!(
                format = ?config.output_format,
                quality = config.output_quality,
                "Output quality has no effect, this format is encoded losslessly"
            );
        }
        Self {
            canvas: config.canvas,
            shadow_opacity: config.shadow_opacity,
            output_format: config.output_format,
            output_quality: config.output_quality,
        }
    }

    #[must_use]
    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    /// Compose and encode in the configured output format
    ///
    /// # Errors
    /// - `Configuration` when `info` was computed for a different canvas
    /// - Encoder failures
    pub fn compose(
        &self,
        foreground: &RgbaImage,
        info: &ScalingInfo,
        shadow: &ShadowSpec,
    ) -> Result<Vec<u8>> {
        let canvas = self.render(foreground, info, shadow)?;
        OutputFormatHandler::encode(
            &DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8()),
            self.output_format,
            self.output_quality,
        )
    }

    /// Compose the opaque canvas without encoding
    ///
    /// Layers, bottom to top: solid background, blurred shadow ellipse,
    /// product resized into `info.scaled` and centered.
    #[instrument(skip_all, fields(category = %info.category, scaled = %format!("{}x{}", info.scaled.width, info.scaled.height)))]
    pub fn render(
        &self,
        foreground: &RgbaImage,
        info: &ScalingInfo,
        shadow: &ShadowSpec,
    ) -> Result<RgbaImage> {
        if info.canvas.width != self.canvas.width || info.canvas.height != self.canvas.height {
            return Err(HarmonizeError::configuration(format!(
                "Scaling computed for a {} canvas, compositor is {}x{}",
                info.canvas, self.canvas.width, self.canvas.height
            )));
        }

        let [r, g, b] = self.canvas.background_color.rgb();
        let mut canvas = RgbaImage::from_pixel(self.canvas.width, self.canvas.height, Rgba([r, g, b, 255]));

        if self.shadow_opacity > 0.0 {
            let (layer, left, top) = shadow_layer(shadow, self.shadow_opacity);
            imageops::overlay(&mut canvas, &layer, left, top);
        }

        let product = fit_contain(foreground, info.scaled.width, info.scaled.height);
        let (x, y) = info.center_offset();
        imageops::overlay(&mut canvas, &product, i64::from(x), i64::from(y));

        debug!(offset_x = x, offset_y = y, "Composited product onto canvas");
        Ok(canvas)
    }
}

/// Resize into `width`x`height` without cropping, padding with transparency
#[must_use]
pub fn fit_contain(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let mut target = RgbaImage::new(width, height);
    if image.width() == 0 || image.height() == 0 || width == 0 || height == 0 {
        return target;
    }

    let ratio = (f64::from(width) / f64::from(image.width()))
        .min(f64::from(height) / f64::from(image.height()));
    let fitted_width = ((f64::from(image.width()) * ratio).round() as u32).clamp(1, width);
    let fitted_height = ((f64::from(image.height()) * ratio).round() as u32).clamp(1, height);

    let resized = if (fitted_width, fitted_height) == image.dimensions() {
        image.clone()
    } else {
        imageops::resize(image, fitted_width, fitted_height, imageops::FilterType::Lanczos3)
    };

    let x = (width - fitted_width) / 2;
    let y = (height - fitted_height) / 2;
    imageops::overlay(&mut target, &resized, i64::from(x), i64::from(y));
    target
}

/// Blurred black ellipse and the canvas position of its top-left corner
fn shadow_layer(shadow: &ShadowSpec, opacity: f32) -> (RgbaImage, i64, i64) {
    let sigma = (shadow.ry as f32 * 0.5).clamp(2.0, 60.0);
    let pad = (sigma * 3.0).ceil() as u32;

    let mut mask = GrayImage::new(shadow.width + pad * 2, shadow.height + pad * 2);
    draw_filled_ellipse_mut(
        &mut mask,
        ((pad + shadow.rx) as i32, (pad + shadow.ry) as i32),
        shadow.rx as i32,
        shadow.ry as i32,
        Luma([255]),
    );
    let blurred = gaussian_blur_f32(&mask, sigma);

    let opacity = opacity.clamp(0.0, 1.0);
    let layer = RgbaImage::from_fn(blurred.width(), blurred.height(), |x, y| {
        let coverage = f32::from(blurred.get_pixel(x, y)[0]);
        Rgba([0, 0, 0, (coverage * opacity).round() as u8])
    });

    let left = shadow.x - i64::from(pad);
    let top = shadow.y - i64::from(shadow.ry) - i64::from(pad);
    (layer, left, top)
}
