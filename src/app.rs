use crate::cli::{Cli, Commands, EncodeArgs, RunArgs};
use ffjob::config::{self, Config, DefaultsConfig};
use ffjob::engine::{
    self, CompressOptions, EffectsOptions, EncodeOptions, EventState, JobOptions, JobRequest,
    JobRunner, ProgressEvent, TrimOptions, probe,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

pub fn run(cli: Cli) {
    // Before loading: load() would write the default file itself
    if let Commands::InitConfig = cli.command {
        handle_init_config();
        return;
    }

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: {:#}. Using built-in defaults.", e);
        Config::default()
    });

    match engine::init_logging(cli.verbose, config.logging.debug_file) {
        Ok(Some(path)) => tracing::debug!(path = %path.display(), "debug log enabled"),
        Ok(None) => {}
        Err(e) => eprintln!("Warning: logging disabled: {:#}", e),
    }

    let configured = cli.ffmpeg.as_deref().or(config.transcoder.path.as_deref());
    let transcoder = engine::resolve_transcoder(configured);
    tracing::debug!(?transcoder, "resolved transcoder");

    match cli.command {
        Commands::CheckFfmpeg => handle_check_ffmpeg(transcoder.as_deref()),
        Commands::Probe { file, json } => handle_probe(transcoder.as_deref(), &file, json),
        Commands::Compress {
            file,
            target_size,
            bitrate,
            max_width,
            max_height,
            max_fps,
            container,
            encode,
            run,
        } => {
            let options = JobOptions::Compress(CompressOptions {
                encode: encode_options(&config.defaults, &encode),
                target_size_bytes: target_size,
                video_bitrate: bitrate,
                max_width,
                max_height,
                max_fps,
                container,
            });
            handle_job(&config, transcoder, file, options, &run);
        }
        Commands::Effects {
            file,
            speed,
            hflip,
            vflip,
            rotate,
            brightness,
            contrast,
            saturation,
            gamma,
            grayscale,
            sepia,
            blur,
            noise,
            sharpen,
            vintage,
            reverse,
            encode,
            run,
        } => {
            let options = JobOptions::Effects(EffectsOptions {
                encode: encode_options(&config.defaults, &encode),
                speed,
                flip_horizontal: hflip,
                flip_vertical: vflip,
                rotate,
                brightness,
                contrast,
                saturation,
                gamma,
                grayscale,
                sepia,
                blur,
                noise,
                sharpen,
                vintage,
                reverse,
            });
            handle_job(&config, transcoder, file, options, &run);
        }
        Commands::Trim {
            file,
            mode,
            ranges,
            encode,
            run,
        } => {
            let options = JobOptions::Trim(TrimOptions {
                mode,
                ranges,
                encode: encode_options(&config.defaults, &encode),
            });
            handle_job(&config, transcoder, file, options, &run);
        }
        Commands::InitConfig => handle_init_config(),
    }
}

/// Configured defaults with the command-line overrides applied
fn encode_options(defaults: &DefaultsConfig, args: &EncodeArgs) -> EncodeOptions {
    let mut encode = defaults.encode_options();
    if let Some(codec) = args.codec {
        encode.codec = codec;
    }
    if args.crf.is_some() {
        encode.crf = args.crf;
    }
    if args.preset.is_some() {
        encode.preset = args.preset.clone();
    }
    if args.hw {
        encode.hardware_acceleration = true;
    }
    if args.no_audio {
        encode.keep_audio = false;
    }
    encode
}

fn handle_check_ffmpeg(transcoder: Option<&Path>) {
    let Some(path) = transcoder else {
        eprintln!("Error: {}", engine::EngineError::TranscoderUnavailable);
        process::exit(1);
    };
    match engine::transcoder_version(path) {
        Ok(version) => {
            println!("ffmpeg found: {} ({})", version, path.display());
            process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {} ({})", e, path.display());
            process::exit(1);
        }
    }
}

fn handle_probe(transcoder: Option<&Path>, file: &Path, json: bool) {
    let Some(path) = transcoder else {
        eprintln!("Error: {}", engine::EngineError::TranscoderUnavailable);
        process::exit(1);
    };
    let meta = match probe::probe(path, file) {
        Ok(meta) => meta,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if json {
        match serde_json::to_string_pretty(&meta) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    println!("File:       {}", file.display());
    println!("Duration:   {}", format_duration(meta.duration_seconds));
    println!("Resolution: {}x{}", meta.width, meta.height);
    println!("Codec:      {}", meta.codec_name);
    println!("Frame rate: {:.2} fps", meta.frame_rate);
    let audio = match meta.has_audio {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unknown",
    };
    println!("Audio:      {}", audio);
    if let Some(kbps) = meta.bitrate_kbps {
        println!("Bitrate:    {:.0} kb/s", kbps);
    }
    println!("Size:       {}", format_bytes(meta.file_size_bytes));
}

fn handle_job(
    config: &Config,
    transcoder: Option<PathBuf>,
    file: PathBuf,
    options: JobOptions,
    run: &RunArgs,
) {
    let runner = JobRunner::new(config.engine_settings(transcoder));
    let mut request = JobRequest::new(file, options);
    if let Some(output) = &run.output {
        request = request.with_output(output);
    }

    if run.dry_run {
        handle_dry_run(&runner, request);
        return;
    }

    let ticket = match runner.submit(request) {
        Ok(ticket) => ticket,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    for event in ticket.events.iter() {
        if run.json {
            print_json_event(&event);
        } else {
            print_event(&event);
        }
        if event.is_terminal() {
            let code = if event.state == EventState::Completed { 0 } else { 1 };
            process::exit(code);
        }
    }

    eprintln!("Error: job {} ended without a result", ticket.id);
    process::exit(1);
}

fn handle_dry_run(runner: &JobRunner, request: JobRequest) {
    let program = match runner.transcoder() {
        Ok(path) => path.to_path_buf(),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    match runner.plan(request) {
        Ok((job, invocations)) => {
            println!("# {} -> {} invocation(s)", job.source_path.display(), invocations.len());
            for invocation in &invocations {
                println!("{}", engine::format_invocation(&program, invocation));
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn print_json_event(event: &ProgressEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{}", line),
        Err(e) => eprintln!("Error: failed to serialize event: {}", e),
    }
}

fn print_event(event: &ProgressEvent) {
    let mut stderr = std::io::stderr();
    match event.state {
        EventState::Analyzing => {
            let _ = writeln!(stderr, "Analyzing input...");
        }
        EventState::Processing => {
            let mut line = format!("\r{:5.1}%", event.percent);
            if let Some(speed) = event.speed_multiplier {
                line.push_str(&format!("  {:.2}x", speed));
            }
            if let Some(eta) = event.eta_seconds {
                line.push_str(&format!("  ETA {}", format_duration(eta)));
            }
            if let Some(bytes) = event.current_output_bytes {
                line.push_str(&format!("  {}", format_bytes(bytes)));
            }
            let _ = write!(stderr, "{}   ", line);
            let _ = stderr.flush();
        }
        EventState::Completed => {
            let _ = writeln!(stderr, "\r100.0%");
            let outputs: Vec<&PathBuf> = if event.output_files.is_empty() {
                event.output_path.iter().collect()
            } else {
                event.output_files.iter().collect()
            };
            for path in outputs {
                println!("{}", path.display());
            }
            if let Some(bytes) = event.current_output_bytes {
                let _ = writeln!(stderr, "Done: {}", format_bytes(bytes));
            }
        }
        EventState::Failed => {
            let _ = writeln!(stderr);
            let _ = writeln!(
                stderr,
                "Error: {}",
                event.error_message.as_deref().unwrap_or("job failed")
            );
        }
        EventState::Cancelled => {
            let _ = writeln!(stderr, "\nCancelled at {:.1}%", event.percent);
        }
    }
}

fn handle_init_config() {
    if config::Config::exists() {
        match config::Config::load() {
            Ok(cfg) => {
                match config::Config::config_path() {
                    Ok(path) => println!("Config loaded successfully from {}", path.display()),
                    Err(e) => println!("Config loaded, but config path unknown: {:#}", e),
                }
                println!("{:#?}", cfg);
                return;
            }
            Err(e) => {
                println!("Config invalid: {:#}", e);
                println!("Leaving the existing file untouched.");
                process::exit(1);
            }
        }
    }

    println!("Creating default config...");
    if let Err(err) = config::Config::default().save() {
        eprintln!("Failed to save default config: {:#}", err);
        process::exit(1);
    }
    match config::Config::config_path() {
        Ok(path) => println!("Default config saved to {}", path.display()),
        Err(e) => println!("Default config saved (path unknown): {:#}", e),
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
