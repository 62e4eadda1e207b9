//! Feed a WAV file through the bridge adapter chunk by chunk and print
//! per-chunk verdicts.
//!
//! Usage:
//!   cargo run -p limen-core --bin wavscan -- \
//!     --wav <file.wav> [--hop <samples>] [--threshold <p>] [--chunk-ms <n>]
//!
//! With the `onnx` feature, `--model <silero_vad.onnx>` selects the
//! Silero backend instead of the default energy backend.

fn main() {
    if let Err(e) = run() {
        eprintln!("wavscan failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    use limen_core::{pcm, BridgeAdapter, EnergyBackend, VadBackend};
    use std::path::PathBuf;

    struct Args {
        wav: PathBuf,
        hop: usize,
        threshold: f32,
        chunk_ms: usize,
        model: Option<PathBuf>,
    }

    fn parse_args() -> Result<Args, String> {
        let mut wav: Option<PathBuf> = None;
        let mut hop: usize = 256;
        let mut threshold: f32 = 0.5;
        let mut chunk_ms: usize = 100;
        let mut model: Option<PathBuf> = None;

        let mut it = std::env::args().skip(1);
        while let Some(arg) = it.next() {
            match arg.as_str() {
                "--wav" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --wav".into());
                    };
                    wav = Some(PathBuf::from(v));
                }
                "--hop" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --hop".into());
                    };
                    hop = v
                        .parse::<usize>()
                        .map_err(|_| "invalid value for --hop".to_string())?;
                }
                "--threshold" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --threshold".into());
                    };
                    threshold = v
                        .parse::<f32>()
                        .map_err(|_| "invalid value for --threshold".to_string())?;
                }
                "--chunk-ms" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --chunk-ms".into());
                    };
                    chunk_ms = v
                        .parse::<usize>()
                        .map_err(|_| "invalid value for --chunk-ms".to_string())?
                        .max(1);
                }
                "--model" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --model".into());
                    };
                    model = Some(PathBuf::from(v));
                }
                "--help" | "-h" => {
                    println!(
                        "Usage: cargo run -p limen-core --bin wavscan -- \\
  --wav <file.wav> [--hop <samples>] [--threshold <p>] [--chunk-ms <n>]"
                    );
                    std::process::exit(0);
                }
                other => {
                    return Err(format!("unknown argument: {other}"));
                }
            }
        }

        let Some(wav) = wav else {
            return Err("--wav is required".into());
        };
        Ok(Args {
            wav,
            hop,
            threshold,
            chunk_ms,
            model,
        })
    }

    fn read_wav_mono_i16(path: &std::path::Path) -> Result<(Vec<i16>, u32), String> {
        let mut reader = hound::WavReader::open(path).map_err(|e| e.to_string())?;
        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample > 16 {
            return Err(format!(
                "expected 16-bit integer PCM, got {:?} at {} bits",
                spec.sample_format, spec.bits_per_sample
            ));
        }
        let channels = usize::from(spec.channels.max(1));

        let interleaved: Vec<i16> = reader
            .samples::<i16>()
            .map(|s| s.map_err(|e| e.to_string()))
            .collect::<Result<Vec<_>, _>>()?;

        if channels == 1 {
            return Ok((interleaved, spec.sample_rate));
        }

        let mut mono = Vec::with_capacity(interleaved.len() / channels);
        for frame in interleaved.chunks(channels) {
            let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
            mono.push((sum / channels as i32) as i16);
        }
        Ok((mono, spec.sample_rate))
    }

    let args = parse_args()?;

    #[cfg(not(feature = "onnx"))]
    if args.model.is_some() {
        return Err("--model requires the 'onnx' feature".into());
    }

    let backend: Box<dyn VadBackend> = match args.model {
        #[cfg(feature = "onnx")]
        Some(path) => Box::new(limen_core::SileroBackend::new(path)),
        _ => Box::new(EnergyBackend),
    };

    let (samples, sample_rate) = read_wav_mono_i16(&args.wav)?;
    let chunk_samples = (sample_rate as usize * args.chunk_ms / 1000).max(args.hop);

    let mut adapter = BridgeAdapter::new(backend);
    let version = adapter
        .initialize(args.hop, args.threshold)
        .map_err(|e| e.to_string())?;

    println!(
        "{}: {} samples @ {} Hz, hop={}, threshold={}, backend={version}",
        args.wav.display(),
        samples.len(),
        sample_rate,
        args.hop,
        args.threshold
    );

    let mut speech_chunks = 0usize;
    let mut peak = 0.0f32;
    let mut chunk_count = 0usize;

    for (index, chunk) in samples.chunks(chunk_samples).enumerate() {
        let bytes = pcm::encode_i16le(chunk);
        let verdict = adapter.process_pcm(&bytes).map_err(|e| e.to_string())?;
        let at_secs = (index * chunk_samples) as f64 / sample_rate as f64;
        println!(
            "t={at_secs:6.2}s speech={} probability={:.3}",
            verdict.speech, verdict.probability
        );
        chunk_count += 1;
        if verdict.speech {
            speech_chunks += 1;
        }
        if verdict.probability > peak {
            peak = verdict.probability;
        }
    }

    adapter.release().map_err(|e| e.to_string())?;
    println!("done: {speech_chunks}/{chunk_count} chunks with speech, peak probability {peak:.3}");
    Ok(())
}
