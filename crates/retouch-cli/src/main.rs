use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use retouch_contracts::chat::{parse_intent, CHAT_HELP_COMMANDS};
use retouch_contracts::events::EventWriter;
use retouch_contracts::models::ModelCatalog;
use retouch_contracts::ImagePayload;
use retouch_engine::{backend_for_model, EditSession, GeminiConfig, GenerationClient};
use serde_json::Value;

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Parser)]
#[command(name = "retouch", version, about = "Conversational image editing")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Edit(EditArgs),
    Chat(ChatArgs),
}

#[derive(Debug, Parser)]
struct EditArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    high_quality: bool,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    events: Option<PathBuf>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("retouch error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Edit(args) => run_edit(args),
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
    }
}

fn run_edit(args: EditArgs) -> Result<i32> {
    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create {}", args.out.display()))?;
    let client = build_client(args.model.as_deref())?;
    let mut session = open_session(&args.out, args.events.as_deref());

    let (bytes, mime) = read_image(&args.image)?;
    if let Err(err) = session.upload_source(&bytes, &mime) {
        eprintln!("Upload failed: {err}");
        return Ok(1);
    }
    let record = match session.request_edit(&client, &args.prompt, args.high_quality) {
        Ok(record) => record,
        Err(err) => {
            eprintln!("Edit failed: {err}");
            return Ok(1);
        }
    };

    let path = args.out.join(format!(
        "edit-{}.{}",
        record.id(),
        record.image().file_extension()
    ));
    write_image(record.image(), &path)?;
    println!("{}", path.display());
    Ok(0)
}

fn run_chat(args: ChatArgs) -> Result<()> {
    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create {}", args.out.display()))?;
    let mut client = build_client(args.model.as_deref())?;
    let mut session = open_session(&args.out, args.events.as_deref());
    if let Some(path) = &args.image {
        upload_from_path(&mut session, path);
    }

    let stdin = io::stdin();
    let mut line = String::new();

    println!(
        "Retouch chat started ({}:{}). Type /help for commands.",
        client.backend_name(),
        client.model()
    );

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        let intent = parse_intent(input);

        match intent.action.as_str() {
            "noop" => continue,
            "quit" => break,
            "help" => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
                println!("Any other text is sent as a fast edit instruction.");
            }
            "upload_source" => {
                match value_as_non_empty_string(intent.command_args.get("path")) {
                    Some(path) => upload_from_path(&mut session, Path::new(&path)),
                    None => println!("/upload requires a path"),
                }
            }
            "edit" => {
                let prompt = intent.prompt.clone().unwrap_or_default();
                let high_quality = intent.high_quality();
                match session.request_edit(&client, &prompt, high_quality) {
                    Ok(record) => {
                        let mode = if high_quality { "high quality" } else { "fast" };
                        println!("Edit complete ({mode}): {}", record.id());
                    }
                    Err(err) => println!("Edit failed: {err}"),
                }
            }
            "history" => print_history(&session),
            "select_history_item" => {
                let Some(id) = value_as_non_empty_string(intent.command_args.get("id")) else {
                    println!("/select requires an id");
                    continue;
                };
                match session.select_history_item(&id) {
                    Ok(_) => println!("Active image set to {id}"),
                    Err(err) => println!("{err}"),
                }
            }
            "revert_to_source" => match session.revert_to_source() {
                Ok(_) => println!("Reverted to the source image."),
                Err(err) => println!("{err}"),
            },
            "save" => {
                let requested = value_as_non_empty_string(intent.command_args.get("path"));
                match save_active(&session, &args.out, requested.map(PathBuf::from)) {
                    Ok(Some(path)) => println!("Saved {}", path.display()),
                    Ok(None) => println!("Nothing to save; /upload an image first."),
                    Err(err) => println!("Save failed: {err:#}"),
                }
            }
            "status" => print_status(&session, &client),
            "set_model" => {
                let Some(model) = value_as_non_empty_string(intent.command_args.get("model"))
                else {
                    println!("Image model: {}", client.model());
                    continue;
                };
                match build_client(Some(&model)) {
                    Ok(next) => {
                        client = next;
                        println!("Image model set to {}", client.model());
                    }
                    Err(err) => println!("Model change failed: {err:#}"),
                }
            }
            "unknown" => {
                let command = value_as_non_empty_string(intent.command_args.get("command"))
                    .unwrap_or_else(|| "unknown".to_string());
                println!("Unknown command: /{command}");
            }
            other => println!("Unknown command: {other}"),
        }
    }

    Ok(())
}

/// Resolves `requested` (or the configured default) against the model
/// catalog and builds its transport. Gemini credentials are only required
/// when the resolved model is hosted.
fn build_client(requested: Option<&str>) -> Result<GenerationClient> {
    let config = GeminiConfig::from_env();
    let requested = requested
        .map(str::to_string)
        .or_else(|| config.as_ref().ok().map(|config| config.model.clone()));
    let Some(model) = ModelCatalog::new().resolve(requested.as_deref()) else {
        bail!("no image edit models are configured");
    };

    let config = match config {
        Ok(config) => Some(config),
        Err(err) if model.provider.is_hosted() => {
            return Err(err.context(format!(
                "model '{}' needs an API key (or pass --model dryrun-image-1)",
                model.name
            )));
        }
        Err(_) => None,
    };
    let backend = backend_for_model(&model, config)?;
    Ok(GenerationClient::new(backend))
}

fn open_session(out_dir: &Path, events: Option<&Path>) -> EditSession {
    let events_path = events
        .map(Path::to_path_buf)
        .unwrap_or_else(|| out_dir.join("events.jsonl"));
    EditSession::new().with_events(EventWriter::new(events_path, session_id_for(out_dir)))
}

fn session_id_for(out_dir: &Path) -> String {
    out_dir
        .file_name()
        .and_then(|value| value.to_str())
        .filter(|value| !value.is_empty())
        .unwrap_or("session-rs")
        .to_string()
}

fn upload_from_path(session: &mut EditSession, path: &Path) {
    let (bytes, mime) = match read_image(path) {
        Ok(read) => read,
        Err(err) => {
            println!("Upload failed: {err:#}");
            return;
        }
    };
    match session.upload_source(&bytes, &mime) {
        Ok(image) => println!(
            "Source image set to {} ({}, {} bytes)",
            path.display(),
            image.mime_type(),
            image.byte_len()
        ),
        Err(err) => println!("Upload failed: {err}"),
    }
}

fn read_image(path: &Path) -> Result<(Vec<u8>, String)> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mime = mime_for_path(path, &bytes);
    Ok((bytes, mime))
}

fn mime_for_path(path: &Path, bytes: &[u8]) -> String {
    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let by_extension = match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    };
    if let Some(mime) = by_extension {
        return mime.to_string();
    }
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

fn write_image(image: &ImagePayload, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, image.to_bytes())
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Writes the active image to `requested`, or to a name derived from the
/// history entry it came from. Returns `None` when there is nothing to save.
fn save_active(
    session: &EditSession,
    out_dir: &Path,
    requested: Option<PathBuf>,
) -> Result<Option<PathBuf>> {
    let Some(active) = session.active_image() else {
        return Ok(None);
    };
    let path = requested.unwrap_or_else(|| {
        let stem = session
            .history()
            .iter()
            .find(|record| record.image() == active)
            .map(|record| format!("edit-{}", record.id()))
            .unwrap_or_else(|| "source".to_string());
        out_dir.join(format!("{stem}.{}", active.file_extension()))
    });
    write_image(active, &path)?;
    Ok(Some(path))
}

fn print_history(session: &EditSession) {
    if session.history().is_empty() {
        println!("No edits yet.");
        return;
    }
    let active = session.active_image();
    for record in session.history().iter() {
        let marker = if Some(record.image()) == active { "*" } else { " " };
        let quality = if record.high_quality() { " [hq]" } else { "" };
        println!(
            "{marker} {} {}{quality} {}",
            record.id(),
            record.created_at().format("%Y-%m-%d %H:%M:%S"),
            record.instruction()
        );
    }
}

fn print_status(session: &EditSession, client: &GenerationClient) {
    println!("Model: {}:{}", client.backend_name(), client.model());
    println!("Phase: {}", session.phase());
    match session.active_image() {
        Some(active) => {
            let origin = if session.source_image() == Some(active) {
                "source"
            } else {
                "edit"
            };
            println!(
                "Active image: {origin} ({}, {} bytes)",
                active.mime_type(),
                active.byte_len()
            );
        }
        None => println!("Active image: none"),
    }
    println!("History: {} edit(s)", session.history().len());
    if let Some(err) = session.last_error() {
        println!("Last error: {err}");
    }
}

fn value_as_non_empty_string(value: Option<&Value>) -> Option<String> {
    let raw = value
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}
