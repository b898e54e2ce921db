mod clipboard;
mod db;
mod engine;
mod error;
mod notify;
mod page;
mod prompt;
mod session;
mod settings;
mod store;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;

use clipboard::{StdoutClipboard, SystemClipboard};
use db::SqliteStorage;
use error::Error;
use notify::Notification;
use page::{ActivePage, HttpPage, StaticPage};
use prompt::TerminalPrompter;
use session::Popup;
use settings::Settings;
use store::Templates;

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser)]
#[command(
    name = "snippet_scraper",
    about = "Fill text templates with values scraped from web pages"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current selection and store totals
    Status,
    /// List folders
    Folders,
    /// Create, delete or select a folder
    #[command(subcommand)]
    Folder(FolderCommand),
    /// List templates in the selected folder
    Templates,
    /// Create, edit, delete or select a template in the selected folder
    #[command(subcommand)]
    Template(TemplateCommand),
    /// Scrape the page, fill the selected template and copy the result
    ///
    /// On Linux the command stays running after copying until another program
    /// takes the clipboard or SNIPPETS_CLIPBOARD_HOLD_SECS (default 30) pass.
    /// Use --print to pipe the result instead.
    Build {
        /// Page address (must be http or https)
        #[arg(long)]
        url: String,
        /// Read the page markup from a file instead of fetching it
        #[arg(long)]
        html: Option<PathBuf>,
        /// Write the result to stdout instead of the clipboard
        #[arg(long)]
        print: bool,
        /// Show the extracted fields and the result without copying
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum FolderCommand {
    /// Create a folder (prompts for the name if omitted)
    New { name: Option<String> },
    /// Delete the selected folder and all its templates
    Delete {
        #[arg(short, long)]
        yes: bool,
    },
    /// Select a folder
    Select { name: String },
}

#[derive(Subcommand)]
enum TemplateCommand {
    /// Create an empty template (prompts for the name if omitted)
    New { name: Option<String> },
    /// Select a template
    Select { name: String },
    /// Print the selected template
    Show,
    /// Edit the selected template and save it
    Save(SaveArgs),
    /// Delete the selected template
    Delete {
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Args)]
struct SaveArgs {
    /// New name (renames the template in place)
    #[arg(long)]
    name: Option<String>,
    /// Template text with {{placeholders}}
    #[arg(long, conflicts_with = "content_file")]
    content: Option<String>,
    /// Read the template text from a file
    #[arg(long)]
    content_file: Option<PathBuf>,
    /// Map a placeholder to a CSS selector, e.g. --selector price=.price
    #[arg(long = "selector", value_name = "KEY=CSS", value_parser = parse_selector)]
    selectors: Vec<(String, String)>,
    /// Remove a placeholder's selector
    #[arg(long = "remove-selector", value_name = "KEY")]
    remove: Vec<String>,
}

fn parse_selector(raw: &str) -> Result<(String, String), String> {
    let (key, css) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=CSS, got {:?}", raw))?;
    if key.trim().is_empty() {
        return Err("placeholder name must not be empty".into());
    }
    Ok((key.trim().to_string(), css.trim().to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load()?;
    let storage = SqliteStorage::open(&settings.db_path)
        .with_context(|| format!("Failed to open {:?}", settings.db_path))?;
    let mut popup = Popup::open(&storage)?;

    let notification = match cli.command {
        Commands::Status => {
            print_status(&popup);
            None
        }
        Commands::Folders => {
            print_folders(&popup, &storage)?;
            None
        }
        Commands::Templates => {
            print_templates(&popup, &storage)?;
            None
        }
        Commands::Folder(cmd) => match cmd {
            FolderCommand::New { name } => popup.new_folder(&TerminalPrompter {
                preset: name,
                assume_yes: false,
            }),
            FolderCommand::Delete { yes } => popup.delete_folder(&TerminalPrompter {
                preset: None,
                assume_yes: yes,
            }),
            FolderCommand::Select { name } => Some(popup.select_folder(&name)),
        },
        Commands::Template(cmd) => match cmd {
            TemplateCommand::New { name } => popup.new_template(&TerminalPrompter {
                preset: name,
                assume_yes: false,
            }),
            TemplateCommand::Select { name } => Some(popup.select_template(&name)),
            TemplateCommand::Show => {
                print_template(&popup);
                None
            }
            TemplateCommand::Save(args) => {
                apply_edits(&mut popup, args)?;
                Some(popup.save_template())
            }
            TemplateCommand::Delete { yes } => popup.delete_template(&TerminalPrompter {
                preset: None,
                assume_yes: yes,
            }),
        },
        Commands::Build {
            url,
            html,
            print,
            dry_run,
        } => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
            pb.set_message(format!("Scraping {}", url));
            pb.enable_steady_tick(Duration::from_millis(100));

            let n = match html {
                Some(path) => {
                    let markup = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {:?}", path))?;
                    let page = StaticPage::new(&url, markup);
                    run_build(&popup, &page, &settings, print, dry_run, &pb).await
                }
                None => {
                    let page = HttpPage::new(&settings, &url)?;
                    run_build(&popup, &page, &settings, print, dry_run, &pb).await
                }
            };
            Some(n)
        }
    };

    if let Some(n) = notification {
        if n.is_error() {
            eprintln!("{}", n);
            std::process::exit(1);
        }
        println!("{}", n);
    }
    Ok(())
}

fn apply_edits(popup: &mut Popup<'_, SqliteStorage>, args: SaveArgs) -> anyhow::Result<()> {
    if let Some(name) = args.name {
        popup.set_name(&name);
    }
    if let Some(path) = args.content_file {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        popup.set_content(&content);
    } else if let Some(content) = args.content {
        popup.set_content(&content);
    }
    for key in &args.remove {
        popup.remove_selector(key);
    }
    for (key, css) in &args.selectors {
        popup.add_selector(key, css);
    }
    Ok(())
}

async fn run_build(
    popup: &Popup<'_, SqliteStorage>,
    page: &impl ActivePage,
    settings: &Settings,
    print: bool,
    dry_run: bool,
    pb: &ProgressBar,
) -> Notification {
    if dry_run {
        let result = popup.extract(page).await;
        pb.finish_and_clear();
        return match result {
            Ok((template, values)) => {
                for (key, value) in &values {
                    println!("{:<16} {}", key, value.as_display());
                }
                let out = engine::substitute(&template.content, &values);
                println!("\n{}", out.text);
                if out.found_any {
                    Notification::success("Dry run, nothing copied")
                } else {
                    Notification::error(&Error::Extraction)
                }
            }
            Err(e) => Notification::error(&e),
        };
    }

    pb.finish_and_clear();
    if print {
        popup.auto_build(page, &StdoutClipboard).await
    } else {
        popup.auto_build(page, &SystemClipboard::new(settings)).await
    }
}

// ── Output ──

fn print_status(popup: &Popup<'_, SqliteStorage>) {
    let state = popup.state();
    println!("Folder:    {}", state.selected_folder.as_deref().unwrap_or("-"));
    println!("Template:  {}", state.selected_template.as_deref().unwrap_or("-"));
    println!("Folders:   {}", popup.folders().len());
    println!("In folder: {}", popup.templates().len());
}

fn print_folders(popup: &Popup<'_, SqliteStorage>, storage: &SqliteStorage) -> anyhow::Result<()> {
    let folders = Templates::new(storage).list_folders()?;
    if folders.is_empty() {
        println!("No folders. Create one with 'folder new'.");
        return Ok(());
    }
    let selected = popup.state().selected_folder.as_deref();
    for f in &folders {
        let mark = if Some(f.name.as_str()) == selected { '*' } else { ' ' };
        println!("{} {:<28} {:>3} templates", mark, truncate(&f.name, 28), f.templates.len());
    }
    Ok(())
}

fn print_templates(popup: &Popup<'_, SqliteStorage>, storage: &SqliteStorage) -> anyhow::Result<()> {
    let Some(folder) = popup.state().selected_folder.as_deref() else {
        println!("No folder selected.");
        return Ok(());
    };
    if popup.templates().is_empty() {
        println!("No templates in \"{}\". Create one with 'template new'.", folder);
        return Ok(());
    }
    let store = Templates::new(storage).load()?;
    let selected = popup.state().selected_template.as_deref();
    for name in popup.templates() {
        let mark = if Some(name.as_str()) == selected { '*' } else { ' ' };
        let preview = store
            .template(folder, name)
            .and_then(|t| t.content.lines().next())
            .unwrap_or("");
        println!("{} {:<24} | {}", mark, truncate(name, 24), truncate(preview, 48));
    }
    Ok(())
}

fn print_template(popup: &Popup<'_, SqliteStorage>) {
    let editor = popup.editor();
    if editor.current.is_none() {
        println!("No template selected.");
        return;
    }
    println!("Name: {}", editor.name);
    println!("---\n{}\n---", editor.content);
    for (key, css) in &editor.selectors {
        println!("  {:<16} {}", key, css);
    }
    let unmapped = engine::placeholders(&editor.content)
        .into_iter()
        .filter(|p| !editor.selectors.iter().any(|(k, _)| engine::same_placeholder(k, p)))
        .join(", ");
    if !unmapped.is_empty() {
        println!("Placeholders without a selector: {}", unmapped);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

// ── Tests ──
