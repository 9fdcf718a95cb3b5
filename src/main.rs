use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Args, Parser, Subcommand};
use notedeck::config::ROOT_ENV;
use notedeck::models::{
    CreateLabelRequest, CreateNoteRequest, CreateTaskRequest, Label, NewUpload, StoredFile,
    UpdateLabelRequest, UpdateNoteRequest, UpdateTaskRequest,
};
use notedeck::user_models::{LoginRequest, SignupRequest, UserProfile};
use notedeck::{App, LabelFamily, StorageConfig};
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "notedeck")]
#[command(about = "Notes, tasks and labels stored as local JSON", long_about = None)]
struct Cli {
    #[arg(long, global = true, env = ROOT_ENV, help = "Storage root directory")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create a new account")]
    Signup {
        #[arg(short, long, help = "Email address")]
        email: String,

        #[arg(short, long, help = "Password (at least 6 characters)")]
        password: String,

        #[arg(short, long, help = "Display name")]
        name: String,
    },

    #[command(about = "Log in to your account")]
    Login {
        #[arg(short, long, help = "Email address")]
        email: String,

        #[arg(short, long, help = "Password")]
        password: String,
    },

    #[command(about = "Log out of your account")]
    Logout,

    #[command(about = "Show current user")]
    Whoami,

    #[command(subcommand, about = "Manage notes")]
    Note(NoteCommand),

    #[command(subcommand, about = "Manage tasks")]
    Task(TaskCommand),

    #[command(subcommand, about = "Manage labels")]
    Label(LabelCommand),
}

#[derive(Subcommand)]
enum NoteCommand {
    #[command(about = "List your notes")]
    List,
    #[command(about = "Show one note")]
    Show { id: String },
    #[command(about = "Create a note")]
    Create {
        #[arg(short, long)]
        title: String,
        #[arg(short, long, default_value = "")]
        content: String,
        #[arg(short, long, help = "Label IDs (comma-separated)")]
        labels: Option<String>,
    },
    #[command(about = "Edit a note")]
    Edit {
        id: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        content: Option<String>,
        #[arg(short, long, help = "Replace labels (comma-separated IDs, empty to clear)")]
        labels: Option<String>,
    },
    #[command(about = "Delete a note and its attachments")]
    Delete { id: String },
    #[command(about = "Attach a file to a note")]
    Attach(AttachArgs),
    #[command(about = "Remove an attachment from a note")]
    Detach { id: String, file_id: String },
    #[command(about = "Copy an attachment out of storage")]
    Export(ExportArgs),
}

#[derive(Subcommand)]
enum TaskCommand {
    #[command(about = "List your tasks")]
    List {
        #[arg(short, long, help = "Only tasks with this status")]
        status: Option<String>,
    },
    #[command(about = "Show one task")]
    Show { id: String },
    #[command(about = "Create a task")]
    Create {
        #[arg(short, long)]
        title: String,
        #[arg(short, long, default_value = "")]
        content: String,
        #[arg(short, long, help = "Todo, In Progress or Done")]
        status: Option<String>,
        #[arg(short, long, help = "Due date (ISO 8601 or YYYY-MM-DD), defaults to two days from now")]
        due: Option<String>,
        #[arg(short, long, help = "Label IDs (comma-separated)")]
        labels: Option<String>,
    },
    #[command(about = "Edit a task")]
    Edit {
        id: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        content: Option<String>,
        #[arg(short, long)]
        status: Option<String>,
        #[arg(short, long)]
        due: Option<String>,
        #[arg(short, long, help = "Replace labels (comma-separated IDs, empty to clear)")]
        labels: Option<String>,
    },
    #[command(about = "Delete a task and its attachments")]
    Delete { id: String },
    #[command(about = "Delete every task with the given status (Done only)")]
    Clear {
        #[arg(short, long)]
        status: String,
    },
    #[command(about = "Attach a file to a task")]
    Attach(AttachArgs),
    #[command(about = "Remove an attachment from a task")]
    Detach { id: String, file_id: String },
    #[command(about = "Copy an attachment out of storage")]
    Export(ExportArgs),
}

#[derive(Subcommand)]
enum LabelCommand {
    #[command(about = "List labels")]
    List(FamilyArg),
    #[command(about = "Create a label")]
    Create {
        #[arg(short, long)]
        name: String,
        #[arg(short, long, help = "Hex color, e.g. #3b82f6")]
        color: String,
        #[command(flatten)]
        family: FamilyArg,
    },
    #[command(about = "Edit a label")]
    Edit {
        id: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        color: Option<String>,
        #[command(flatten)]
        family: FamilyArg,
    },
    #[command(about = "Delete a label and strip it from everything using it")]
    Delete {
        id: String,
        #[command(flatten)]
        family: FamilyArg,
    },
}

#[derive(Args)]
struct FamilyArg {
    #[arg(long, help = "Operate on task labels instead of note labels")]
    tasks: bool,
}

impl FamilyArg {
    fn family(&self) -> LabelFamily {
        if self.tasks {
            LabelFamily::Tasks
        } else {
            LabelFamily::Notes
        }
    }
}

#[derive(Args)]
struct AttachArgs {
    id: String,
    #[arg(short, long, help = "Path to the file")]
    file: PathBuf,
    #[arg(short, long, help = "MIME type, guessed from the extension if omitted")]
    mime: Option<String>,
}

#[derive(Args)]
struct ExportArgs {
    id: String,
    file_id: String,
    #[arg(short, long, help = "Destination path")]
    out: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct Session {
    user_id: String,
    email: String,
    name: String,
}

impl Session {
    fn save(&self, config: &StorageConfig) -> Result<()> {
        fs::create_dir_all(config.root()).context("Failed to create storage root")?;
        let json = serde_json::to_string(self)?;
        fs::write(config.session_file(), json).context("Failed to write session")?;
        Ok(())
    }

    fn load(config: &StorageConfig) -> Option<Self> {
        let data = fs::read_to_string(config.session_file()).ok()?;
        serde_json::from_str(&data).ok()
    }

    fn clear(config: &StorageConfig) -> Result<()> {
        let path = config.session_file();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = match cli.root {
        Some(root) => StorageConfig::new(root),
        None => StorageConfig::from_env(),
    };
    let app = App::open(&config);

    match cli.command {
        Commands::Signup { email, password, name } => {
            let profile = app.signup(SignupRequest { email, password, name }).await?;
            println!("✅ Account created successfully!");
            print_profile(&profile);
            println!("\n💡 You can now log in using: notedeck login -e {} -p <password>", profile.email);
        }
        Commands::Login { email, password } => {
            let profile = app.login(LoginRequest { email, password }).await?;
            Session {
                user_id: profile.id.clone(),
                email: profile.email.clone(),
                name: profile.name.clone(),
            }
            .save(&config)?;
            println!("✅ Login successful!");
            println!("👤 Welcome back, {}!", profile.name);
        }
        Commands::Logout => {
            Session::clear(&config)?;
            println!("✅ Logged out successfully!");
        }
        Commands::Whoami => match Session::load(&config) {
            Some(session) => {
                let profile = app.profile(&session.user_id).await?;
                println!("👤 Logged in as: {} <{}>", session.name, session.email);
                print_profile(&profile);
            }
            None => {
                println!("❌ Not logged in");
                println!("💡 Use 'notedeck login -e <email> -p <password>' to log in");
            }
        },
        Commands::Note(command) => {
            let session = require_login(&config)?;
            run_note(&app, &session, command).await?;
        }
        Commands::Task(command) => {
            let session = require_login(&config)?;
            run_task(&app, &session, command).await?;
        }
        Commands::Label(command) => {
            require_login(&config)?;
            run_label(&app, command).await?;
        }
    }

    Ok(())
}

async fn run_note(app: &App, session: &Session, command: NoteCommand) -> Result<()> {
    let user = session.user_id.as_str();
    match command {
        NoteCommand::List => {
            let mut notes = app.list_notes(user).await;
            if notes.is_empty() {
                println!("📭 No notes yet.");
                println!("💡 Use 'notedeck note create -t <title>' to write one");
                return Ok(());
            }
            notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

            println!("\n📝 Notes ({})\n", notes.len());
            let mut table = Table::new();
            table.add_row(header(&["ID", "Title", "Labels", "Files", "Updated"]));
            for note in &notes {
                table.add_row(Row::new(vec![
                    Cell::new(&note.id),
                    Cell::new(&note.title),
                    Cell::new(&label_names(&note.labels)),
                    Cell::new(&note.files.len().to_string()),
                    Cell::new(&local(note.updated_at)),
                ]));
            }
            table.printstd();
            println!();
        }
        NoteCommand::Show { id } => {
            let note = app.get_note(user, &id).await?;
            println!("📝 {}", note.title);
            println!("   🆔 ID: {}", note.id);
            if !note.labels.is_empty() {
                println!("   🏷️  Labels: {}", label_names(&note.labels));
            }
            println!("   ⏰ Created: {}", local(note.created_at));
            println!("   ⏰ Updated: {}", local(note.updated_at));
            print_files(&note.files);
            if !note.content.is_empty() {
                println!("\n{}", note.content);
            }
        }
        NoteCommand::Create { title, content, labels } => {
            let note = app
                .create_note(
                    user,
                    CreateNoteRequest {
                        title,
                        content,
                        label_ids: labels.as_deref().map(split_ids).unwrap_or_default(),
                    },
                )
                .await?;
            println!("✅ Note created!");
            println!("🆔 Note ID: {}", note.id);
        }
        NoteCommand::Edit { id, title, content, labels } => {
            let note = app
                .update_note(
                    user,
                    &id,
                    UpdateNoteRequest {
                        title,
                        content,
                        label_ids: labels.as_deref().map(split_ids),
                    },
                )
                .await?;
            println!("✅ Note '{}' updated!", note.title);
        }
        NoteCommand::Delete { id } => {
            app.delete_note(user, &id).await?;
            println!("✅ Note deleted");
        }
        NoteCommand::Attach(args) => {
            let upload = read_upload(&args)?;
            let stored = app.attach_to_note(user, &args.id, upload).await?;
            print_attached(&stored);
        }
        NoteCommand::Detach { id, file_id } => {
            app.detach_from_note(user, &id, &file_id).await?;
            println!("✅ Attachment removed");
        }
        NoteCommand::Export(args) => {
            let (file, path) = app.note_file(user, &args.id, &args.file_id).await?;
            export(&file, &path, &args.out).await?;
        }
    }
    Ok(())
}

async fn run_task(app: &App, session: &Session, command: TaskCommand) -> Result<()> {
    let user = session.user_id.as_str();
    match command {
        TaskCommand::List { status } => {
            let mut tasks = app.list_tasks(user, status.as_deref()).await?;
            if tasks.is_empty() {
                println!("📭 No tasks found.");
                println!("💡 Use 'notedeck task create -t <title>' to add one");
                return Ok(());
            }
            tasks.sort_by(|a, b| a.due_date.cmp(&b.due_date));

            println!("\n📋 Tasks ({})\n", tasks.len());
            let mut table = Table::new();
            table.add_row(header(&["ID", "Title", "Status", "Due", "Labels", "Files"]));
            for task in &tasks {
                table.add_row(Row::new(vec![
                    Cell::new(&task.id),
                    Cell::new(&task.title),
                    Cell::new(task.status.as_str()),
                    Cell::new(&local(task.due_date)),
                    Cell::new(&label_names(&task.labels)),
                    Cell::new(&task.files.len().to_string()),
                ]));
            }
            table.printstd();
            println!();
        }
        TaskCommand::Show { id } => {
            let task = app.get_task(user, &id).await?;
            println!("📌 {}", task.title);
            println!("   🆔 ID: {}", task.id);
            println!("   📊 Status: {}", task.status);
            println!("   📅 Due: {}", local(task.due_date));
            if !task.labels.is_empty() {
                println!("   🏷️  Labels: {}", label_names(&task.labels));
            }
            println!("   ⏰ Updated: {}", local(task.updated_at));
            print_files(&task.files);
            if !task.content.is_empty() {
                println!("\n{}", task.content);
            }
        }
        TaskCommand::Create { title, content, status, due, labels } => {
            let task = app
                .create_task(
                    user,
                    CreateTaskRequest {
                        title,
                        content,
                        status,
                        due_date: due,
                        label_ids: labels.as_deref().map(split_ids).unwrap_or_default(),
                    },
                )
                .await?;
            println!("✅ Task created!");
            println!("🆔 Task ID: {}", task.id);
            println!("📅 Due: {}", local(task.due_date));
        }
        TaskCommand::Edit { id, title, content, status, due, labels } => {
            let task = app
                .update_task(
                    user,
                    &id,
                    UpdateTaskRequest {
                        title,
                        content,
                        status,
                        due_date: due,
                        label_ids: labels.as_deref().map(split_ids),
                    },
                )
                .await?;
            println!("✅ Task '{}' updated ({})", task.title, task.status);
        }
        TaskCommand::Delete { id } => {
            app.delete_task(user, &id).await?;
            println!("✅ Task deleted");
        }
        TaskCommand::Clear { status } => {
            let count = app.delete_tasks_by_status(user, &status).await?;
            println!("✅ Deleted {} finished task(s)", count);
        }
        TaskCommand::Attach(args) => {
            let upload = read_upload(&args)?;
            let stored = app.attach_to_task(user, &args.id, upload).await?;
            print_attached(&stored);
        }
        TaskCommand::Detach { id, file_id } => {
            app.detach_from_task(user, &id, &file_id).await?;
            println!("✅ Attachment removed");
        }
        TaskCommand::Export(args) => {
            let (file, path) = app.task_file(user, &args.id, &args.file_id).await?;
            export(&file, &path, &args.out).await?;
        }
    }
    Ok(())
}

async fn run_label(app: &App, command: LabelCommand) -> Result<()> {
    match command {
        LabelCommand::List(family) => {
            let labels = app.list_labels(family.family()).await;
            if labels.is_empty() {
                println!("📭 No labels yet.");
                return Ok(());
            }
            let mut table = Table::new();
            table.add_row(header(&["ID", "Name", "Color"]));
            for label in &labels {
                table.add_row(Row::new(vec![
                    Cell::new(&label.id),
                    Cell::new(&label.name),
                    Cell::new(&label.color),
                ]));
            }
            table.printstd();
        }
        LabelCommand::Create { name, color, family } => {
            let label = app
                .create_label(family.family(), CreateLabelRequest { name, color })
                .await?;
            println!("✅ Label '{}' created", label.name);
            println!("🆔 Label ID: {}", label.id);
        }
        LabelCommand::Edit { id, name, color, family } => {
            let label = app
                .update_label(family.family(), &id, UpdateLabelRequest { name, color })
                .await?;
            println!("✅ Label '{}' updated ({})", label.name, label.color);
        }
        LabelCommand::Delete { id, family } => {
            app.delete_label(family.family(), &id).await?;
            println!("✅ Label deleted");
        }
    }
    Ok(())
}

fn require_login(config: &StorageConfig) -> Result<Session> {
    Session::load(config)
        .ok_or_else(|| anyhow::anyhow!("You must be logged in. Use: notedeck login -e <email> -p <password>"))
}

fn read_upload(args: &AttachArgs) -> Result<NewUpload> {
    if !args.file.exists() {
        bail!("File not found: {}", args.file.display());
    }
    let bytes = fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    if bytes.len() > MAX_UPLOAD_BYTES {
        bail!("File is too large ({} bytes, limit {} bytes)", bytes.len(), MAX_UPLOAD_BYTES);
    }

    let name = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    let mime_type = args
        .mime
        .clone()
        .unwrap_or_else(|| guess_mime(&args.file));

    Ok(NewUpload { name, mime_type, bytes })
}

fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path).first_or_octet_stream().to_string()
}

async fn export(file: &StoredFile, source: &Path, out: &Path) -> Result<()> {
    tokio::fs::copy(source, out)
        .await
        .with_context(|| format!("Failed to copy '{}' to {}", file.name, out.display()))?;
    println!("✅ Exported '{}' to {}", file.name, out.display());
    Ok(())
}

fn split_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn header(titles: &[&str]) -> Row {
    Row::new(titles.iter().map(|t| Cell::new(t)).collect())
}

fn label_names(labels: &[Label]) -> String {
    if labels.is_empty() {
        return "-".to_string();
    }
    labels
        .iter()
        .map(|l| l.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn local(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn print_profile(profile: &UserProfile) {
    println!("👤 Name: {}", profile.name);
    println!("📧 Email: {}", profile.email);
    println!("🆔 User ID: {}", profile.id);
}

fn print_files(files: &[StoredFile]) {
    if files.is_empty() {
        return;
    }
    println!("   📎 Files:");
    for file in files {
        println!(
            "      {} {} ({} bytes, {}) uploaded {}",
            file.id,
            file.name,
            file.size,
            file.mime_type,
            local(file.uploaded_at)
        );
    }
}

fn print_attached(file: &StoredFile) {
    println!("✅ File attached!");
    println!("📄 Filename: {}", file.name);
    println!("🆔 File ID: {}", file.id);
    println!("📊 Size: {} bytes", file.size);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_is_guessed_from_the_extension() {
        assert_eq!(guess_mime(Path::new("page.html")), "text/html");
        assert_eq!(guess_mime(Path::new("logo.svg")), "image/svg+xml");
        assert_eq!(guess_mime(Path::new("song.mp3")), "audio/mpeg");
        assert_eq!(guess_mime(Path::new("README")), "application/octet-stream");
    }

    #[test]
    fn attach_without_explicit_mime_uses_the_guess() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = dir.path().join("minutes.pdf");
        fs::write(&file, b"%PDF").expect("seed file");

        let upload = read_upload(&AttachArgs {
            id: "note_1".to_string(),
            file,
            mime: None,
        })
        .expect("upload");
        assert_eq!(upload.name, "minutes.pdf");
        assert_eq!(upload.mime_type, "application/pdf");
        assert_eq!(upload.bytes, b"%PDF");
    }
}
