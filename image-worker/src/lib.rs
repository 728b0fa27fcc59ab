//! Image filter jobs exchanged between the bot and the worker
//!
//! The bot publishes an [`ImageJob`] on [`SUBJECT`] and waits for an [`ImageReply`] on the
//! request's reply subject.

mod filter;

pub use filter::{Filter, FilterError};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{
	codecs::gif::{GifDecoder, GifEncoder, Repeat},
	AnimationDecoder, DynamicImage, Frame, ImageDecoder, ImageFormat, ImageReader, Limits,
};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use thiserror::Error;

/// The subject the workers listen on
pub const SUBJECT: &str = "imageFilter";
/// The queue group shared by every worker so that a job is handled once
pub const QUEUE_GROUP: &str = "image-workers";

/// Reply sent when the downloaded file is not an image
pub const NOT_AN_IMAGE: &str = "Not a valid image type";
/// Reply sent when the image could not be decoded, filtered or encoded
pub const BUFFER_ERROR: &str = "Error creating buffer";
/// Reply sent when the source file is larger than [`MAX_DOWNLOAD_BYTES`]
pub const TOO_LARGE: &str = "Image too large";

/// Largest source file downloaded
pub const MAX_DOWNLOAD_BYTES: usize = 8 * 1024 * 1024;
/// Largest side of a decoded image
const MAX_DECODED_SIDE: u32 = 8192;
/// Most memory a decoder may allocate
const MAX_DECODED_BYTES: u64 = 512 * 1024 * 1024;

/// The encoding of the filtered image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputFormat {
	/// Portable Network Graphics
	Png,
	/// JPEG, without alpha channel
	Jpeg,
	/// GIF, animated when the source was animated
	Gif,
}

impl OutputFormat {
	/// The file extension used in the reply name
	#[must_use]
	pub const fn extension(self) -> &'static str {
		match self {
			Self::Png => "png",
			Self::Jpeg => "jpeg",
			Self::Gif => "gif",
		}
	}

	/// Resolve the format to encode to given the source content type
	///
	/// Gifs stay gifs unless a `JPEG` was explicitly asked for.
	#[must_use]
	pub fn resolve(self, content_type: Option<&str>) -> Self {
		match content_type {
			Some(content_type)
				if self != Self::Jpeg && content_type.eq_ignore_ascii_case("image/gif") =>
			{
				Self::Gif
			}
			_ => self,
		}
	}

	/// The matching [`image`] crate format
	const fn image_format(self) -> ImageFormat {
		match self {
			Self::Png => ImageFormat::Png,
			Self::Jpeg => ImageFormat::Jpeg,
			Self::Gif => ImageFormat::Gif,
		}
	}
}

/// A request to filter the image at `url`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageJob {
	/// Where to download the source image from
	pub url: String,
	/// The requested output format
	pub format: OutputFormat,
	/// The filter to apply
	pub filter: Filter,
	/// The numeric arguments of the filter
	#[serde(default)]
	pub input: Vec<f64>,
}

/// The answer of a worker to an [`ImageJob`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageReply {
	/// The filtered image
	Image {
		/// Base64 encoded image bytes
		image: String,
		/// File name to upload the image with
		name: String,
	},
	/// The job failed
	Error {
		/// A human readable reason
		err: String,
	},
}

impl ImageReply {
	/// Build an error reply
	pub fn error(reason: impl Into<String>) -> Self {
		Self::Error { err: reason.into() }
	}

	/// Decode the image bytes of a successful reply
	///
	/// # Errors
	/// Returns the worker message for error replies or a decoding error
	pub fn into_image(self) -> Result<(Vec<u8>, String), String> {
		match self {
			Self::Image { image, name } => BASE64
				.decode(image)
				.map(|bytes| (bytes, name))
				.map_err(|error| error.to_string()),
			Self::Error { err } => Err(err),
		}
	}
}

/// The download went past its size limit
#[derive(Debug, Error, PartialEq, Eq)]
#[error("the file is larger than {0} bytes")]
pub struct TooLarge(pub usize);

/// A download buffer that refuses to grow past a limit
///
/// The announced content length is not trusted, every chunk is counted.
#[derive(Debug)]
pub struct LimitedBuffer {
	/// What was received so far
	bytes: Vec<u8>,
	/// Most bytes accepted
	limit: usize,
}

impl LimitedBuffer {
	/// An empty buffer accepting up to `limit` bytes
	#[must_use]
	pub const fn new(limit: usize) -> Self {
		Self {
			bytes: Vec::new(),
			limit,
		}
	}

	/// Append a received chunk
	///
	/// # Errors
	/// Returns an error once the total goes past the limit
	pub fn extend(&mut self, chunk: &[u8]) -> Result<(), TooLarge> {
		if self.bytes.len() + chunk.len() > self.limit {
			return Err(TooLarge(self.limit));
		}

		self.bytes.extend_from_slice(chunk);
		Ok(())
	}

	/// The received bytes
	#[must_use]
	pub fn into_inner(self) -> Vec<u8> {
		self.bytes
	}
}

/// Errors while transforming an image
#[derive(Debug, Error)]
pub enum ProcessError {
	/// The format could not be guessed
	#[error("could not read image: {0}")]
	Io(#[from] std::io::Error),
	/// Decoding or encoding failed
	#[error(transparent)]
	Image(#[from] image::ImageError),
	/// The filter refused its arguments
	#[error(transparent)]
	Filter(#[from] FilterError),
}

/// Whether the given content type designates something we can process
///
/// A missing content type is given the benefit of the doubt.
#[must_use]
pub fn is_image_content_type(content_type: Option<&str>) -> bool {
	content_type.map_or(true, |content_type| content_type.contains("image"))
}

/// Name of the uploaded file, keeping the spoiler marker of the source
#[must_use]
pub fn reply_name(job: &ImageJob, format: OutputFormat) -> String {
	let name = format!("{}.{}", job.filter.name(), format.extension());

	if job.url.contains("SPOILER_") {
		format!("SPOILER_{name}")
	} else {
		name
	}
}

/// Run a job against already downloaded bytes and build the reply
#[must_use]
pub fn process(job: &ImageJob, content_type: Option<&str>, bytes: &[u8]) -> ImageReply {
	if !is_image_content_type(content_type) {
		return ImageReply::error(NOT_AN_IMAGE);
	}

	let format = job.format.resolve(content_type);

	match render(job, format, bytes) {
		Ok(buffer) => ImageReply::Image {
			image: BASE64.encode(buffer),
			name: reply_name(job, format),
		},
		Err(ProcessError::Filter(error)) => ImageReply::error(error.to_string()),
		Err(error) => {
			tracing::warn!(error = %error, filter = job.filter.name(), "could not render image");
			ImageReply::error(BUFFER_ERROR)
		}
	}
}

/// Bounds for decoders, a small file can still describe a huge image
fn decoding_limits() -> Limits {
	let mut limits = Limits::default();
	limits.max_image_width = Some(MAX_DECODED_SIDE);
	limits.max_image_height = Some(MAX_DECODED_SIDE);
	limits.max_alloc = Some(MAX_DECODED_BYTES);
	limits
}

/// Decode, orient, filter and encode
fn render(job: &ImageJob, format: OutputFormat, bytes: &[u8]) -> Result<Vec<u8>, ProcessError> {
	job.filter.validate(&job.input)?;

	let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
	reader.limits(decoding_limits());

	if format == OutputFormat::Gif && reader.format() == Some(ImageFormat::Gif) {
		return render_animation(job, bytes);
	}

	let mut decoder = reader.into_decoder()?;
	let orientation = decoder.orientation()?;
	let mut image = DynamicImage::from_decoder(decoder)?;
	image.apply_orientation(orientation);

	let image = job.filter.apply(image, &job.input)?;
	let image = match format {
		OutputFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
		_ => image,
	};

	let mut buffer = Vec::new();
	image.write_to(&mut Cursor::new(&mut buffer), format.image_format())?;

	Ok(buffer)
}

/// Apply the filter to every frame of an animated gif
fn render_animation(job: &ImageJob, bytes: &[u8]) -> Result<Vec<u8>, ProcessError> {
	let mut decoder = GifDecoder::new(Cursor::new(bytes))?;
	decoder.set_limits(decoding_limits())?;
	let frames = decoder.into_frames().collect_frames()?;

	let mut buffer = Vec::new();
	{
		let mut encoder = GifEncoder::new(&mut buffer);
		encoder.set_repeat(Repeat::Infinite)?;

		for frame in frames {
			let delay = frame.delay();
			let (left, top) = (frame.left(), frame.top());
			let filtered = job
				.filter
				.apply(DynamicImage::ImageRgba8(frame.into_buffer()), &job.input)?;

			encoder.encode_frame(Frame::from_parts(filtered.to_rgba8(), left, top, delay))?;
		}
	}

	Ok(buffer)
}

#[cfg(test)]
mod tests {
	use super::*;
	use image::{Rgba, RgbaImage};

	fn png_bytes() -> Vec<u8> {
		png_of_size(4, 2)
	}

	fn png_of_size(width: u32, height: u32) -> Vec<u8> {
		let image = RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, 255]));
		let mut buffer = Vec::new();
		DynamicImage::ImageRgba8(image)
			.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
			.expect("encode png");
		buffer
	}

	fn job(url: &str, format: OutputFormat) -> ImageJob {
		ImageJob {
			url: url.into(),
			format,
			filter: Filter::Flop,
			input: vec![],
		}
	}

	#[test]
	fn rejects_non_image_content() {
		let reply = process(
			&job("https://a.b/c", OutputFormat::Png),
			Some("text/html; charset=utf-8"),
			b"<html>",
		);

		assert_eq!(reply, ImageReply::error(NOT_AN_IMAGE));
	}

	#[test]
	fn gif_content_type_switches_format_unless_jpeg() {
		assert_eq!(
			OutputFormat::Png.resolve(Some("IMAGE/GIF")),
			OutputFormat::Gif
		);
		assert_eq!(
			OutputFormat::Jpeg.resolve(Some("image/gif")),
			OutputFormat::Jpeg
		);
		assert_eq!(OutputFormat::Png.resolve(None), OutputFormat::Png);
	}

	#[test]
	fn keeps_spoiler_marker() {
		let name = reply_name(
			&job("https://cdn/attachments/SPOILER_cat.png", OutputFormat::Png),
			OutputFormat::Png,
		);

		assert_eq!(name, "SPOILER_flop.png");
	}

	#[test]
	fn filters_a_png() {
		let reply = process(
			&job("https://a.b/cat.png", OutputFormat::Png),
			Some("image/png"),
			&png_bytes(),
		);

		let (bytes, name) = reply.into_image().expect("image reply");
		let image = image::load_from_memory(&bytes).expect("decodable output");

		assert_eq!(name, "flop.png");
		assert_eq!((image.width(), image.height()), (4, 2));
	}

	#[test]
	fn encodes_jpeg_without_alpha() {
		let reply = process(
			&job("https://a.b/cat.png", OutputFormat::Jpeg),
			None,
			&png_bytes(),
		);

		assert!(matches!(reply, ImageReply::Image { ref name, .. } if name == "flop.jpeg"));
	}

	#[test]
	fn garbage_bytes_fail_to_buffer() {
		let reply = process(
			&job("https://a.b/cat.png", OutputFormat::Png),
			Some("image/png"),
			b"definitely not a png",
		);

		assert_eq!(reply, ImageReply::error(BUFFER_ERROR));
	}

	#[test]
	fn bad_arguments_are_reported_without_decoding() {
		let mut blur = job("https://a.b/cat.png", OutputFormat::Png);
		blur.filter = Filter::Blur;
		blur.input = vec![-3.0];

		let reply = process(&blur, Some("image/png"), b"never decoded");

		assert_eq!(
			reply,
			ImageReply::error(
				FilterError::OutOfRange {
					value: -3.0,
					min: 0.1,
					max: 50.0
				}
				.to_string()
			)
		);
	}

	#[test]
	fn oversized_images_are_not_decoded() {
		let reply = process(
			&job("https://a.b/wide.png", OutputFormat::Png),
			Some("image/png"),
			&png_of_size(MAX_DECODED_SIDE + 1, 1),
		);

		assert_eq!(reply, ImageReply::error(BUFFER_ERROR));
	}

	#[test]
	fn download_buffer_stops_at_its_limit() {
		let mut buffer = LimitedBuffer::new(8);

		assert_eq!(buffer.extend(b"12345"), Ok(()));
		assert_eq!(buffer.extend(b"6789"), Err(TooLarge(8)));
		assert_eq!(buffer.extend(b"678"), Ok(()));
		assert_eq!(buffer.into_inner(), b"12345678");
	}

	#[test]
	fn reply_wire_format() {
		let error: ImageReply = serde_json::from_str(r#"{"err":"nope"}"#).expect("error reply");
		assert_eq!(error, ImageReply::error("nope"));

		let job: ImageJob = serde_json::from_str(
			r#"{"url":"https://x/y.png","format":"PNG","filter":"blur","input":[3]}"#,
		)
		.expect("job");
		assert_eq!(job.filter, Filter::Blur);
		assert_eq!(job.input, vec![3.0]);
	}
}
