// onnxkit-cli - manual smoke-test front end over the onnxkit library

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use onnxkit::backend::{Backend, OrtBackend};
use onnxkit::config::{GenerationConfig, SessionConfig};
use onnxkit::generation::GenerationLoop;
use onnxkit::model_source::ModelSourceLayout;
use onnxkit::session::{DecoderOnlySession, GenerativeSession};
use onnxkit::tensor::Tensor;
use onnxkit::tokenizers::wordpiece::WordPieceTokenizer;
use onnxkit::vision::{letterbox, yolo};

#[derive(Parser, Debug)]
#[command(name = "onnxkit-cli")]
#[command(about = "Run a model directory through the onnxkit generation or detection core", version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser, Debug)]
enum Command {
    /// Greedy/sampled text generation over a decoder-only model directory.
    Generate {
        /// Path to a model directory containing model.onnx (+ vocab.txt)
        model_dir: String,
        /// Prompt text
        prompt: String,
        #[arg(long, default_value_t = 64)]
        max_new_tokens: usize,
        #[arg(long)]
        eos_token_id: Vec<i64>,
    },
    /// Report the input/output names and shapes a model directory declares.
    Inspect {
        model_dir: String,
    },
    /// Letterbox + backend + YOLO-v8 decode over a raw f32 pixel buffer.
    Detect {
        #[arg(long = "model-dir")]
        model_dir: String,
        /// Path to a raw little-endian f32 pixel buffer, already resized to
        /// the model's expected input (CHW, channel-first, no normalization
        /// beyond what the export already bakes in).
        #[arg(long)]
        pixels: String,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        #[arg(long, default_value_t = 0.25)]
        conf_threshold: f32,
        #[arg(long, default_value_t = 0.45)]
        iou_threshold: f32,
    },
}

fn main() -> Result<()> {
    onnxkit::logging::init();
    let args = Args::parse();

    match args.command {
        Command::Generate {
            model_dir,
            prompt,
            max_new_tokens,
            eos_token_id,
        } => run_generate(&model_dir, &prompt, max_new_tokens, eos_token_id),
        Command::Inspect { model_dir } => run_inspect(&model_dir),
        Command::Detect {
            model_dir,
            pixels,
            width,
            height,
            conf_threshold,
            iou_threshold,
        } => run_detect(&model_dir, &pixels, width, height, conf_threshold, iou_threshold),
    }
}

fn run_generate(model_dir: &str, prompt: &str, max_new_tokens: usize, eos_token_ids: Vec<i64>) -> Result<()> {
    let layout = ModelSourceLayout::scan(model_dir).context("scanning model directory")?;
    let vocab_path = layout
        .wordpiece_vocab
        .as_ref()
        .context("model directory has no vocab.txt; only WordPiece generation is wired into the CLI")?;
    let tokenizer = WordPieceTokenizer::from_vocab_file(vocab_path).context("loading tokenizer")?;

    let backend = OrtBackend::load(&layout.onnx_model, &SessionConfig::default()).context("loading ONNX model")?;
    let decoder_session = DecoderOnlySession::new(&backend, 32, 64);
    let mut session = GenerativeSession::DecoderOnly(decoder_session);

    let eos: BTreeSet<i64> = if eos_token_ids.is_empty() { BTreeSet::from([0]) } else { eos_token_ids.into_iter().collect() };
    let config = GenerationConfig::new(max_new_tokens, eos)?;
    let mut gen_loop = GenerationLoop::new(&mut session, config);

    let mut rng = StdRng::from_entropy();
    let start = std::time::Instant::now();
    let result = gen_loop.run(
        prompt,
        None,
        &|text| tokenizer.encode(text, 512).input_ids,
        &|_token_id| String::new(), // real token->text decoding belongs to a model-specific wrapper
        &mut rng,
        |fragment| print!("{fragment}"),
        || start.elapsed(),
    )?;

    println!();
    eprintln!(
        "prompt_tokens={} generated_tokens={} duration={:?}",
        result.prompt_tokens, result.generated_tokens, result.duration
    );
    Ok(())
}

fn run_inspect(model_dir: &str) -> Result<()> {
    let layout = ModelSourceLayout::scan(model_dir).context("scanning model directory")?;
    let backend = OrtBackend::load(&layout.onnx_model, &SessionConfig::default()).context("loading ONNX model")?;

    println!("inputs:");
    for name in backend.input_names() {
        let shape = backend.input_shape(&name);
        println!("  {name}: {shape:?}");
    }
    println!("outputs:");
    for name in backend.output_names() {
        println!("  {name}");
    }
    Ok(())
}

/// Interprets a file as a little-endian `f32` buffer.
fn read_f32_buffer(path: &str) -> Result<Vec<f32>> {
    let bytes = std::fs::read(path).with_context(|| format!("reading pixel buffer {path}"))?;
    if bytes.len() % 4 != 0 {
        anyhow::bail!("{path} is {} bytes, not a multiple of 4 (f32)", bytes.len());
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn run_detect(
    model_dir: &str,
    pixels_path: &str,
    width: u32,
    height: u32,
    conf_threshold: f32,
    iou_threshold: f32,
) -> Result<()> {
    let layout = ModelSourceLayout::scan(model_dir).context("scanning model directory")?;
    let backend = OrtBackend::load(&layout.onnx_model, &SessionConfig::default()).context("loading ONNX model")?;

    let input_name = backend
        .input_names()
        .into_iter()
        .next()
        .context("model declares no inputs")?;
    let target = backend
        .input_shape(&input_name)
        .and_then(|shape| shape.last().copied())
        .filter(|&v| v > 0)
        .unwrap_or(640) as u32;

    let lb = letterbox(width, height, target);
    let pixel_data = read_f32_buffer(pixels_path)?;
    let input = Tensor::from_f32(pixel_data, vec![1, 3, target as usize, target as usize])
        .context("pixel buffer does not match the model's expected [1,3,target,target] layout")?;

    let outputs = backend.run(vec![(input_name, input)]).context("running detection model")?;
    let (output_name, output_tensor) = outputs.into_iter().next().context("model produced no outputs")?;
    let shape = output_tensor.shape();
    let num_classes = shape
        .get(1)
        .copied()
        .and_then(|c| c.checked_sub(4))
        .with_context(|| format!("output {output_name} has unexpected shape {shape:?}"))?;
    let num_candidates = *shape.get(2).with_context(|| format!("output {output_name} has unexpected shape {shape:?}"))?;

    let labels = layout.read_labels().context("reading labels.txt")?;
    let detections = yolo::decode(
        &output_tensor.to_f32()?,
        num_classes,
        num_candidates,
        &lb,
        width,
        height,
        conf_threshold,
        iou_threshold,
    );

    for d in &detections {
        let label = labels
            .as_ref()
            .and_then(|l| l.get(d.class_index))
            .map(String::as_str)
            .unwrap_or("<unlabeled>");
        println!(
            "{label} ({}) conf={:.3} box=[{:.1}, {:.1}, {:.1}, {:.1}]",
            d.class_index, d.confidence, d.box_xyxy[0], d.box_xyxy[1], d.box_xyxy[2], d.box_xyxy[3]
        );
    }
    eprintln!("detections={}", detections.len());
    Ok(())
}
