use std::str::FromStr;

use clap::Parser;
use serde::Serialize;
use tokio::fs;
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::{
    ocr::{OcrClient, OcrConfig, OcrError},
    prelude::*,
    prompt::Language,
    ui::Ui,
};

mod data_url;
mod drivers;
mod ocr;
mod prelude;
mod prompt;
mod ui;

/// Largest image we accept, in bytes.
const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

/// Image formats we accept.
const ACCEPTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Extract the text in an image using a vision-capable LLM.
#[derive(Debug, Parser)]
#[clap(
    version,
    after_help = r#"
Environment Variables:
  - OPENAI_API_BASE (optional): Override the server URL.
  - OPENAI_API_KEY: The OpenAI key to use.

  These variables may be set in a standard `.env` file.
"#
)]
struct Opts {
    /// The image to transcribe. PNG, JPG, JPEG and WEBP files of up to 5 MB
    /// are accepted.
    image: PathBuf,

    /// The language to prioritize during recognition.
    #[clap(long, value_enum, default_value_t = Language::default())]
    language: Language,

    /// Write the extracted text to a file instead of stdout.
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Print a JSON record instead of plain text.
    #[clap(long)]
    json: bool,
}

/// The record printed by `--json`.
#[derive(Debug, Serialize)]
struct TranscriptionRecord<'a> {
    /// The extracted text, exactly as the model returned it.
    text: &'a str,
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    let ui = Ui::init();

    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);

    // We can stack multiple layers here if we need to.
    tracing_subscriber::registry().with(subscriber).init();

    // Call our real `main` function now that logging is set up.
    real_main(ui).await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<()> {
    // Load environment variables from a `.env` file, if it exists.
    dotenvy::dotenv().ok();

    // Parse command-line arguments.
    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    // Hide the spinner if we're using stdout for output.
    if opts.output.is_none() {
        ui.hide_progress_bars();
    }

    // Check the file before we go anywhere near the network.
    let image_data = load_image(&opts.image).await?;
    let extension = image_extension(&opts.image)?;

    // Run our single OCR request under a spinner.
    let spinner = ui.transcription_spinner();
    let client = OcrClient::new(OcrConfig::from_env());
    let result = client
        .submit(&image_data, extension, &opts.language.to_string())
        .await;
    spinner.finish_using_style();

    let text = match result {
        Ok(text) => text,
        Err(err @ OcrError::Configuration(_)) => return Err(anyhow!("⚠️ {err}")),
        Err(err @ OcrError::Timeout(_)) => return Err(anyhow!("⏱️ {err}")),
        Err(err @ OcrError::Execution(_)) => return Err(anyhow!("❌ {err}")),
    };

    // Render the result.
    let rendered = if opts.json {
        let mut record = serde_json::to_string(&TranscriptionRecord { text: &text })
            .context("error serializing result")?;
        record.push('\n');
        record
    } else {
        text
    };
    match &opts.output {
        Some(path) => {
            fs::write(path, &rendered)
                .await
                .with_context(|| format!("error writing {}", path.display()))?;
        }
        None => {
            print!("{rendered}");
            if !rendered.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}

/// Read an image, enforcing our size limit.
async fn load_image(path: &Path) -> Result<Vec<u8>> {
    let metadata = fs::metadata(path)
        .await
        .with_context(|| format!("error reading {}", path.display()))?;
    if metadata.len() > MAX_IMAGE_BYTES {
        let size_mb = metadata.len() as f64 / (1024.0 * 1024.0);
        return Err(anyhow!(
            "image is too large ({size_mb:.1} MB); images of up to 5 MB are accepted"
        ));
    }
    let image_data = fs::read(path)
        .await
        .with_context(|| format!("error reading {}", path.display()))?;
    if image_data.is_empty() {
        return Err(anyhow!("image file {} is empty", path.display()));
    }
    Ok(image_data)
}

/// Get the image's file extension, rejecting formats we don't support.
fn image_extension(path: &Path) -> Result<&str> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    if ACCEPTED_EXTENSIONS
        .iter()
        .any(|accepted| accepted.eq_ignore_ascii_case(extension))
    {
        Ok(extension)
    } else {
        Err(anyhow!(
            "unsupported image format {extension:?}; expected one of: png, jpg, jpeg, webp"
        ))
    }
}
