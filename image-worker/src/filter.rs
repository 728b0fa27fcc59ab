//! The transformations a job can ask for

use image::{imageops::FilterType, DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest side accepted for a resize, keeps a single job from eating the worker memory
const MAX_DIMENSION: f64 = 4096.0;
/// Largest blur or sharpen radius, the cost grows with it
const MAX_SIGMA: f64 = 50.0;

/// The panel appended below pictures by [`Filter::Sosad`]
const SOSAD_PANEL: &[u8] = include_bytes!("../assets/sosad.png");
/// Width pictures are scaled to before the panel is appended
const SOSAD_WIDTH: u32 = 1070;

/// A filter and the meaning of its numeric arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
	/// Gaussian blur, `[sigma]`
	Blur,
	/// Unsharp mask, `[sigma, threshold]`
	Sharpen,
	/// Mirror vertically
	Flip,
	/// Mirror horizontally
	Flop,
	/// Rotate by a multiple of 90 degrees, `[degrees]`
	Rotate,
	/// Invert every channel
	Negative,
	/// Drop the colours
	Greyscale,
	/// Add to every channel, `[amount]`
	Brighten,
	/// Change the contrast, `[percent]`
	Contrast,
	/// Rotate the hue, `[degrees]`
	Hue,
	/// Scale to a new size, `[width, height]`, a missing height keeps the ratio
	Resize,
	/// Relief effect
	Emboss,
	/// Edge detection
	Edge,
	/// Over saturated, over sharpened, low quality look
	Deepfry,
	/// Scaled to the panel width with the "so sad" panel appended below
	Sosad,
}

/// Bad arguments for a filter
#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
	/// Only quarter turns are supported
	#[error("cannot rotate by {0} degrees")]
	UnsupportedRotation(f64),
	/// The target size is empty or too large
	#[error("invalid target size {0}x{1}")]
	InvalidSize(f64, f64),
	/// An argument is infinite or not a number
	#[error("arguments must be numbers")]
	NotFinite,
	/// An argument is outside of what the filter accepts
	#[error("{value} is not between {min} and {max}")]
	OutOfRange {
		/// The given argument
		value: f64,
		/// Smallest accepted value
		min: f64,
		/// Largest accepted value
		max: f64,
	},
	/// The bundled panel could not be decoded
	#[error("unreadable panel: {0}")]
	Panel(String),
}

impl Filter {
	/// The wire name of the filter, also used for reply file names
	#[must_use]
	pub const fn name(self) -> &'static str {
		match self {
			Self::Blur => "blur",
			Self::Sharpen => "sharpen",
			Self::Flip => "flip",
			Self::Flop => "flop",
			Self::Rotate => "rotate",
			Self::Negative => "negative",
			Self::Greyscale => "greyscale",
			Self::Brighten => "brighten",
			Self::Contrast => "contrast",
			Self::Hue => "hue",
			Self::Resize => "resize",
			Self::Emboss => "emboss",
			Self::Edge => "edge",
			Self::Deepfry => "deepfry",
			Self::Sosad => "sosad",
		}
	}

	/// The accepted range of each numeric argument, in order
	const fn bounds(self) -> &'static [(f64, f64)] {
		match self {
			Self::Blur => &[(0.1, MAX_SIGMA)],
			Self::Sharpen => &[(0.1, MAX_SIGMA), (0.0, 255.0)],
			Self::Rotate | Self::Hue => &[(-360.0, 360.0)],
			Self::Brighten => &[(-255.0, 255.0)],
			Self::Contrast => &[(-100.0, 100.0)],
			Self::Resize => &[(1.0, MAX_DIMENSION), (1.0, MAX_DIMENSION)],
			Self::Flip
			| Self::Flop
			| Self::Negative
			| Self::Greyscale
			| Self::Emboss
			| Self::Edge
			| Self::Deepfry
			| Self::Sosad => &[],
		}
	}

	/// Check the arguments before any work is done, extra arguments are ignored
	///
	/// # Errors
	/// Returns the first argument that is not a number or out of its range
	pub fn validate(self, input: &[f64]) -> Result<(), FilterError> {
		for (&value, &(min, max)) in input.iter().zip(self.bounds()) {
			if !value.is_finite() {
				return Err(FilterError::NotFinite);
			}

			if !(min..=max).contains(&value) {
				return Err(FilterError::OutOfRange { value, min, max });
			}
		}

		Ok(())
	}

	/// Apply the filter to `image` with the given arguments
	///
	/// Missing arguments fall back to sensible defaults.
	///
	/// # Errors
	/// Returns an error when the arguments cannot be honoured
	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	pub fn apply(self, mut image: DynamicImage, input: &[f64]) -> Result<DynamicImage, FilterError> {
		self.validate(input)?;

		let arg = |index: usize, default: f64| input.get(index).copied().unwrap_or(default);

		Ok(match self {
			Self::Blur => image.blur(arg(0, 5.0) as f32),
			Self::Sharpen => image.unsharpen(arg(0, 2.0) as f32, arg(1, 5.0) as i32),
			Self::Flip => image.flipv(),
			Self::Flop => image.fliph(),
			Self::Rotate => match arg(0, 90.0).rem_euclid(360.0) {
				d if d == 0.0 => image,
				d if d == 90.0 => image.rotate90(),
				d if d == 180.0 => image.rotate180(),
				d if d == 270.0 => image.rotate270(),
				_ => return Err(FilterError::UnsupportedRotation(arg(0, 90.0))),
			},
			Self::Negative => {
				image.invert();
				image
			}
			Self::Greyscale => image.grayscale(),
			Self::Brighten => image.brighten(arg(0, 40.0) as i32),
			Self::Contrast => image.adjust_contrast(arg(0, 30.0) as f32),
			Self::Hue => image.huerotate(arg(0, 180.0) as i32),
			Self::Resize => {
				let width = arg(0, f64::from(image.width()));
				let height = input.get(1).copied().unwrap_or_else(|| {
					width * f64::from(image.height()) / f64::from(image.width().max(1))
				});

				if !(1.0..=MAX_DIMENSION).contains(&width) || !(1.0..=MAX_DIMENSION).contains(&height)
				{
					return Err(FilterError::InvalidSize(width, height));
				}

				image.resize_exact(width as u32, height as u32, FilterType::Triangle)
			}
			Self::Emboss => image.filter3x3(&[-2.0, -1.0, 0.0, -1.0, 1.0, 1.0, 0.0, 1.0, 2.0]),
			Self::Edge => image.filter3x3(&[-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0]),
			Self::Deepfry => image
				.adjust_contrast(80.0)
				.brighten(20)
				.unsharpen(3.0, 1)
				.huerotate(-10),
			Self::Sosad => sosad(&image)?,
		})
	}
}

/// Scale `image` to the panel width and append the panel below it
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sosad(image: &DynamicImage) -> Result<DynamicImage, FilterError> {
	let panel = image::load_from_memory_with_format(SOSAD_PANEL, ImageFormat::Png)
		.map_err(|error| FilterError::Panel(error.to_string()))?
		.to_rgba8();

	let height = (f64::from(image.height()) * f64::from(SOSAD_WIDTH)
		/ f64::from(image.width().max(1)))
	.round()
	.max(1.0);
	if height > MAX_DIMENSION {
		return Err(FilterError::InvalidSize(f64::from(SOSAD_WIDTH), height));
	}

	let picture = image
		.resize_exact(SOSAD_WIDTH, height as u32, FilterType::Triangle)
		.to_rgba8();

	let mut canvas = RgbaImage::new(SOSAD_WIDTH, picture.height() + panel.height());
	image::imageops::overlay(&mut canvas, &picture, 0, 0);
	image::imageops::overlay(&mut canvas, &panel, 0, i64::from(picture.height()));

	Ok(DynamicImage::ImageRgba8(canvas))
}

#[cfg(test)]
mod tests {
	use super::*;
	use image::{Rgba, RgbaImage};

	fn sample() -> DynamicImage {
		let mut image = RgbaImage::from_pixel(3, 2, Rgba([0, 0, 0, 255]));
		image.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
		DynamicImage::ImageRgba8(image)
	}

	#[test]
	fn quarter_rotations_swap_dimensions() {
		let rotated = Filter::Rotate.apply(sample(), &[-90.0]).expect("rotation");

		assert_eq!((rotated.width(), rotated.height()), (2, 3));
	}

	#[test]
	fn refuses_odd_rotations() {
		assert_eq!(
			Filter::Rotate.apply(sample(), &[45.0]).err(),
			Some(FilterError::UnsupportedRotation(45.0))
		);
	}

	#[test]
	fn flop_mirrors_horizontally() {
		let flopped = Filter::Flop.apply(sample(), &[]).expect("flop").to_rgba8();

		assert_eq!(flopped.get_pixel(2, 0), &Rgba([255, 255, 255, 255]));
	}

	#[test]
	fn negative_inverts_colours() {
		let inverted = Filter::Negative.apply(sample(), &[]).expect("negative").to_rgba8();

		assert_eq!(inverted.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
		assert_eq!(inverted.get_pixel(1, 1), &Rgba([255, 255, 255, 255]));
	}

	#[test]
	fn rejects_unsafe_arguments() {
		assert_eq!(
			Filter::Blur.apply(sample(), &[-3.0]).err(),
			Some(FilterError::OutOfRange {
				value: -3.0,
				min: 0.1,
				max: MAX_SIGMA
			})
		);
		assert_eq!(
			Filter::Blur.apply(sample(), &[f64::NAN]).err(),
			Some(FilterError::NotFinite)
		);
		assert!(Filter::Blur.apply(sample(), &[0.0]).is_err());
		assert!(Filter::Blur.apply(sample(), &[1e7]).is_err());
		assert!(Filter::Sharpen.apply(sample(), &[1e7, 1.0]).is_err());
		assert!(Filter::Sharpen.apply(sample(), &[2.0, f64::INFINITY]).is_err());
		assert!(Filter::Brighten.apply(sample(), &[-1e9]).is_err());
	}

	#[test]
	fn defaults_and_bounds_are_accepted() {
		assert!(Filter::Blur.apply(sample(), &[]).is_ok());
		assert!(Filter::Blur.apply(sample(), &[MAX_SIGMA]).is_ok());
		assert!(Filter::Sharpen.apply(sample(), &[0.1, 255.0]).is_ok());
		// Filters without arguments ignore them
		assert_eq!(Filter::Flip.validate(&[f64::NAN]), Ok(()));
	}

	#[test]
	fn sosad_appends_the_panel() {
		let panel = image::load_from_memory(SOSAD_PANEL).expect("bundled panel");
		assert_eq!(panel.width(), SOSAD_WIDTH);

		let meme = Filter::Sosad.apply(sample(), &[]).expect("sosad");

		// 3x2 scaled to the panel width is 1070x713
		assert_eq!(meme.width(), SOSAD_WIDTH);
		assert_eq!(meme.height(), 713 + panel.height());
		assert_eq!(
			meme.to_rgba8().get_pixel(0, meme.height() - 1),
			panel.to_rgba8().get_pixel(0, panel.height() - 1)
		);
	}

	#[test]
	fn resize_keeps_ratio_without_height() {
		let resized = Filter::Resize.apply(sample(), &[30.0]).expect("resize");

		assert_eq!((resized.width(), resized.height()), (30, 20));
		assert!(Filter::Resize.apply(sample(), &[0.0]).is_err());
	}
}
