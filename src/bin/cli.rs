use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use vidcap::config::VidcapConfig;
use vidcap::provider::CaptureProvider;
use vidcap::testing::{MockDevice, MockProvider};
use vidcap::{ControlKind, ControlMode, FormatSpec, FrameEncoding, Subsystem};

const USAGE: &str = "\
Usage: vidcap-cli <command> [args] [--json] [--mock] [--config <path>]

Commands:
  info
  list-devices
  list-formats <index>
  list-controls <index>
  get-control <index> <KIND>
  set-control <index> <KIND> <value> [--auto]
  step-control <index> <KIND>
  capture <index> [--format WxH@FPS:ENC] [--frames N] [--out DIR]
  stream <index> [--format WxH@FPS:ENC]";

struct Options {
    json: bool,
    mock: bool,
    auto: bool,
    config: Option<PathBuf>,
    format: Option<FormatSpec>,
    frames: Option<u32>,
    out: Option<PathBuf>,
    positional: Vec<String>,
}

fn parse_options(args: &[String]) -> Result<Options> {
    let mut options = Options {
        json: false,
        mock: false,
        auto: false,
        config: None,
        format: None,
        frames: None,
        out: None,
        positional: Vec::new(),
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .with_context(|| format!("{} needs a value", flag))
        };
        match arg.as_str() {
            "--json" => options.json = true,
            "--mock" => options.mock = true,
            "--auto" => options.auto = true,
            "--config" => options.config = Some(PathBuf::from(value("--config")?)),
            "--out" => options.out = Some(PathBuf::from(value("--out")?)),
            "--frames" => options.frames = Some(value("--frames")?.parse()?),
            "--format" => {
                let spec = value("--format")?;
                options.format = Some(spec.parse().map_err(anyhow::Error::msg)?);
            }
            _ => options.positional.push(arg.clone()),
        }
    }
    Ok(options)
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    };

    let options = parse_options(rest)?;
    if command == "info" || command == "--version" {
        return cmd_info(&options);
    }
    let config = match &options.config {
        Some(path) => VidcapConfig::load_from_file(path)?,
        None => VidcapConfig::load_or_default(),
    };
    config.validate()?;

    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", &config.logging.filter);
    }
    vidcap::init_logging();

    if options.mock {
        let provider = MockProvider::new().with_device(MockDevice::usb_camera());
        return run(provider, command, &options, &config);
    }
    run_native(command, &options, &config)
}

#[cfg(any(target_os = "windows", all(target_os = "linux", feature = "v4l2")))]
fn run_native(command: &str, options: &Options, config: &VidcapConfig) -> Result<()> {
    run(vidcap::platform::default_provider(), command, options, config)
}

#[cfg(not(any(target_os = "windows", all(target_os = "linux", feature = "v4l2"))))]
fn run_native(_command: &str, _options: &Options, _config: &VidcapConfig) -> Result<()> {
    bail!(
        "no capture provider for {} in this build; rerun with --mock",
        vidcap::Platform::current().as_str()
    )
}

fn run<P: CaptureProvider>(
    provider: P,
    command: &str,
    options: &Options,
    config: &VidcapConfig,
) -> Result<()> {
    let subsystem = Subsystem::startup(provider)?;

    match command {
        "list-devices" => cmd_list_devices(&subsystem, options),
        "list-formats" => cmd_list_formats(&subsystem, options, config),
        "list-controls" => cmd_list_controls(&subsystem, options, config),
        "get-control" => cmd_get_control(&subsystem, options, config),
        "set-control" => cmd_set_control(&subsystem, options, config),
        "step-control" => cmd_step_control(&subsystem, options, config),
        "capture" => cmd_capture(&subsystem, options, config),
        "stream" => cmd_stream(&subsystem, options, config),
        other => {
            eprintln!("Unknown command: {}\n{}", other, USAGE);
            std::process::exit(1);
        }
    }
}

fn device_index(options: &Options, config: &VidcapConfig) -> Result<usize> {
    match options.positional.first() {
        Some(index) => index
            .parse()
            .with_context(|| format!("invalid device index: {}", index)),
        None => Ok(config.capture.device_index),
    }
}

fn positional<'a>(options: &'a Options, position: usize, name: &str) -> Result<&'a str> {
    match options.positional.get(position) {
        Some(value) => Ok(value),
        None => bail!("missing <{}>\n{}", name, USAGE),
    }
}

fn control_kind(options: &Options) -> Result<ControlKind> {
    positional(options, 1, "KIND")?
        .parse()
        .map_err(anyhow::Error::msg)
}

fn cmd_info(options: &Options) -> Result<()> {
    let info = vidcap::get_info();
    if options.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("{} {}", info.name, info.version);
        println!("{}", info.description);
        println!(
            "platform: {}, native provider: {}",
            info.platform.as_str(),
            if info.native_provider { "yes" } else { "no (use --mock)" }
        );
    }
    Ok(())
}

fn cmd_list_devices<P: CaptureProvider>(subsystem: &Subsystem<P>, options: &Options) -> Result<()> {
    let devices = subsystem.enumerate()?;
    if options.json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
    } else if devices.is_empty() {
        println!("No capture devices found");
    } else {
        for d in devices {
            println!("{}: {} ({})", d.index, d.name, d.symbolic_reference);
        }
    }
    Ok(())
}

fn cmd_list_formats<P: CaptureProvider>(
    subsystem: &Subsystem<P>,
    options: &Options,
    config: &VidcapConfig,
) -> Result<()> {
    let mut device = subsystem.device(device_index(options, config)?);
    device.init(None)?;
    let formats = device.enumerate_native_formats()?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&formats)?);
        return Ok(());
    }
    for encoding in device.compatible_encodings()? {
        println!("{}:", encoding);
        for (resolution, rates) in device.formats_by_resolution(encoding)? {
            let rates: Vec<String> = rates.iter().map(u32::to_string).collect();
            println!("  {} @ {} fps", resolution, rates.join(", "));
        }
    }
    Ok(())
}

fn cmd_list_controls<P: CaptureProvider>(
    subsystem: &Subsystem<P>,
    options: &Options,
    config: &VidcapConfig,
) -> Result<()> {
    let mut device = subsystem.device(device_index(options, config)?);
    device.init(None)?;
    let controls = device.supported_controls()?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&controls)?);
    } else {
        for c in controls {
            println!(
                "{:<15} {:>7} [{}..{} step {}] default {} {:?}",
                c.kind, c.current, c.min, c.max, c.step, c.default, c.mode
            );
        }
    }
    Ok(())
}

fn cmd_get_control<P: CaptureProvider>(
    subsystem: &Subsystem<P>,
    options: &Options,
    config: &VidcapConfig,
) -> Result<()> {
    let kind = control_kind(options)?;
    let mut device = subsystem.device(device_index(options, config)?);
    device.init(None)?;
    let state = device.get_control(kind)?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        println!("{}: {} ({:?})", state.kind, state.current, state.mode);
    }
    Ok(())
}

fn cmd_set_control<P: CaptureProvider>(
    subsystem: &Subsystem<P>,
    options: &Options,
    config: &VidcapConfig,
) -> Result<()> {
    let kind = control_kind(options)?;
    let value: i32 = positional(options, 2, "value")?
        .parse()
        .context("control value must be an integer")?;
    let mode = if options.auto {
        ControlMode::Auto
    } else {
        ControlMode::Manual
    };

    let mut device = subsystem.device(device_index(options, config)?);
    device.init(None)?;
    device.set_control(kind, value, mode)?;
    let state = device.get_control(kind)?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        println!("OK {}: {} ({:?})", state.kind, state.current, state.mode);
    }
    Ok(())
}

fn cmd_step_control<P: CaptureProvider>(
    subsystem: &Subsystem<P>,
    options: &Options,
    config: &VidcapConfig,
) -> Result<()> {
    let kind = control_kind(options)?;
    let mut device = subsystem.device(device_index(options, config)?);
    device.init(None)?;

    let state = device.get_control(kind)?;
    let Some(next) = state.next_step() else {
        bail!("{} is already at its maximum ({})", kind, state.max);
    };
    device.set_control(kind, next, ControlMode::Manual)?;
    let state = device.get_control(kind)?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        println!("OK {}: {} ({:?})", state.kind, state.current, state.mode);
    }
    Ok(())
}

fn file_extension(encoding: FrameEncoding) -> &'static str {
    match encoding {
        FrameEncoding::Mjpeg => "jpg",
        FrameEncoding::Yuy2 => "yuy2",
        FrameEncoding::Nv12 => "nv12",
    }
}

fn cmd_capture<P: CaptureProvider>(
    subsystem: &Subsystem<P>,
    options: &Options,
    config: &VidcapConfig,
) -> Result<()> {
    let format = options.format.unwrap_or_else(|| config.preferred_format());
    let frames = options.frames.unwrap_or(config.capture.frames);

    let mut device = subsystem.device(device_index(options, config)?);
    device.init(Some(format))?;
    device.open_stream()?;

    if let Some(out) = &options.out {
        fs::create_dir_all(out)
            .with_context(|| format!("failed to create {}", out.display()))?;
    }

    for _ in 0..frames {
        let frame = device.read_frame()?;
        if let Some(out) = &options.out {
            let path = out.join(format!(
                "frame_{:04}.{}",
                frame.sequence,
                file_extension(frame.format.encoding)
            ));
            fs::write(&path, frame.as_bytes())
                .with_context(|| format!("failed to write {}", path.display()))?;
        }

        if options.json {
            println!("{}", serde_json::to_string(&frame)?);
        } else {
            println!(
                "Frame {}: {} bytes {} t={}us",
                frame.sequence,
                frame.len(),
                frame.format,
                frame.timestamp_us
            );
        }
    }

    device.close_stream();
    Ok(())
}

fn cmd_stream<P: CaptureProvider>(
    subsystem: &Subsystem<P>,
    options: &Options,
    config: &VidcapConfig,
) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || handler_stop.store(true, Ordering::SeqCst))
        .context("failed to install Ctrl-C handler")?;

    let format = options.format.unwrap_or_else(|| config.preferred_format());
    let mut device = subsystem.device(device_index(options, config)?);
    device.init(Some(format))?;
    device.open_stream()?;
    println!("Streaming {} (Ctrl-C to stop)", device.get_format());

    let started = Instant::now();
    let mut window = Instant::now();
    let (mut frames, mut bytes, mut window_frames) = (0u64, 0u64, 0u64);

    while !stop.load(Ordering::SeqCst) {
        if options.frames.is_some_and(|limit| frames >= limit as u64) {
            break;
        }
        let frame = device.read_frame()?;
        frames += 1;
        window_frames += 1;
        bytes += frame.len() as u64;

        let elapsed = window.elapsed();
        if elapsed.as_secs() >= 1 {
            let fps = window_frames as f64 / elapsed.as_secs_f64();
            if options.json {
                println!(
                    "{}",
                    serde_json::json!({ "frames": frames, "bytes": bytes, "fps": fps })
                );
            } else {
                println!("{} frames, {:.1} fps, {} KiB total", frames, fps, bytes / 1024);
            }
            window = Instant::now();
            window_frames = 0;
        }
    }

    device.close_stream();
    println!(
        "Stopped after {} frames ({} bytes) in {:.1}s",
        frames,
        bytes,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
