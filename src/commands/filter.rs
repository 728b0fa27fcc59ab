//! Apply image filters through the image workers

use crate::{
	images::{self, FilterOutcome},
	states::{Context, ContextPolyfill, InteractionResult},
	translation::Translate,
};
use fluent::fluent_args;
use image_worker::{Filter, ImageJob, OutputFormat};
use poise::{
	command,
	serenity_prelude::{Attachment, CreateAttachment},
	CreateReply,
};

/// The filters offered to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub(crate) enum FilterChoice {
	/// Gaussian blur
	#[name = "blur"]
	Blur,
	/// Unsharp mask
	#[name = "sharpen"]
	Sharpen,
	/// Upside down
	#[name = "flip"]
	Flip,
	/// Mirrored
	#[name = "flop"]
	Flop,
	/// Quarter turns
	#[name = "rotate"]
	Rotate,
	/// Inverted colours
	#[name = "negative"]
	Negative,
	/// No colours
	#[name = "greyscale"]
	Greyscale,
	/// Lighter
	#[name = "brighten"]
	Brighten,
	/// More contrast
	#[name = "contrast"]
	Contrast,
	/// Shifted hue
	#[name = "hue"]
	Hue,
	/// Another size
	#[name = "resize"]
	Resize,
	/// Relief
	#[name = "emboss"]
	Emboss,
	/// Edges only
	#[name = "edge"]
	Edge,
	/// Deep fried
	#[name = "deepfry"]
	Deepfry,
}

impl From<FilterChoice> for Filter {
	fn from(choice: FilterChoice) -> Self {
		match choice {
			FilterChoice::Blur => Self::Blur,
			FilterChoice::Sharpen => Self::Sharpen,
			FilterChoice::Flip => Self::Flip,
			FilterChoice::Flop => Self::Flop,
			FilterChoice::Rotate => Self::Rotate,
			FilterChoice::Negative => Self::Negative,
			FilterChoice::Greyscale => Self::Greyscale,
			FilterChoice::Brighten => Self::Brighten,
			FilterChoice::Contrast => Self::Contrast,
			FilterChoice::Hue => Self::Hue,
			FilterChoice::Resize => Self::Resize,
			FilterChoice::Emboss => Self::Emboss,
			FilterChoice::Edge => Self::Edge,
			FilterChoice::Deepfry => Self::Deepfry,
		}
	}
}

/// The output format that suits a filter
const fn output_format(filter: Filter) -> OutputFormat {
	match filter {
		// The artifacts are the point
		Filter::Deepfry => OutputFormat::Jpeg,
		_ => OutputFormat::Png,
	}
}

/// Find the image, run `filter` on a worker and post the result
async fn run_filter(
	ctx: Context<'_>,
	filter: Filter,
	input: Vec<f64>,
	url: Option<String>,
	image: Option<Attachment>,
) -> InteractionResult {
	if let Err(error) = filter.validate(&input) {
		ctx.shout(ctx.translate(
			"FILTER_INVALID_ARGUMENT",
			Some(fluent_args!["reason" => error.to_string()]),
		))
		.await?;
		return Ok(());
	}

	let Some(url) =
		images::find_image_url(ctx.serenity_context(), ctx.channel_id(), url, image.as_ref())
			.await?
	else {
		ctx.shout(ctx.translate("FILTER_NO_IMAGE", None)).await?;
		return Ok(());
	};

	// Workers can take a while on large images
	ctx.defer().await?;

	let job = ImageJob {
		url,
		format: output_format(filter),
		filter,
		input,
	};

	match ctx.data().images.filter(&job).await? {
		FilterOutcome::Image { bytes, name } => {
			ctx.send(CreateReply::default().attachment(CreateAttachment::bytes(bytes, name)))
				.await?;
		}
		FilterOutcome::Rejected(reason) => {
			ctx.shout(ctx.translate(
				"FILTER_REJECTED",
				Some(fluent_args!["reason" => reason]),
			))
			.await?;
		}
		FilterOutcome::TimedOut => {
			ctx.shout(ctx.translate("FILTER_TIMED_OUT", None)).await?;
		}
	}

	Ok(())
}

/// Apply a filter to an image, the latest image of the channel is used by default
#[command(
	prefix_command,
	slash_command,
	aliases("image", "img"),
	user_cooldown = 10
)]
#[tracing::instrument(skip(ctx, image), fields(caller_id = %ctx.author().id))]
pub(crate) async fn filter(
	ctx: Context<'_>,
	filter: FilterChoice,
	amount: Option<f64>,
	second_amount: Option<f64>,
	url: Option<String>,
	image: Option<Attachment>,
) -> InteractionResult {
	let input = amount.into_iter().chain(second_amount).collect();

	run_filter(ctx, Filter::from(filter), input, url, image).await
}

/// Put an image above the "so sad" panel
#[command(
	prefix_command,
	slash_command,
	aliases("beatmywife", "bmw"),
	user_cooldown = 10
)]
#[tracing::instrument(skip(ctx, image), fields(caller_id = %ctx.author().id))]
pub(crate) async fn sosad(
	ctx: Context<'_>,
	url: Option<String>,
	image: Option<Attachment>,
) -> InteractionResult {
	run_filter(ctx, Filter::Sosad, Vec::new(), url, image).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use poise::ChoiceParameter;

	#[test]
	fn choices_match_worker_filters() {
		for listed in FilterChoice::list() {
			let choice = FilterChoice::from_name(&listed.name).expect("listed choice");
			assert_eq!(Filter::from(choice).name(), listed.name);
		}
	}

	#[test]
	fn out_of_range_amounts_are_refused_before_sending() {
		assert!(Filter::from(FilterChoice::Blur).validate(&[-3.0]).is_err());
		assert!(Filter::from(FilterChoice::Blur).validate(&[f64::NAN]).is_err());
		assert!(Filter::from(FilterChoice::Sharpen)
			.validate(&[1e7, 1.0])
			.is_err());
		assert!(Filter::from(FilterChoice::Resize)
			.validate(&[640.0, 480.0])
			.is_ok());
	}

	#[test]
	fn formats() {
		assert_eq!(output_format(Filter::Deepfry), OutputFormat::Jpeg);
		assert_eq!(output_format(Filter::Blur), OutputFormat::Png);
		assert_eq!(output_format(Filter::Sosad), OutputFormat::Png);
	}
}
