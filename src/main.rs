//! gett CLI - Interact with Ge.tt shares and files.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glob::glob;
use tracing_subscriber::EnvFilter;

use gett::url_parser::validate_file_id;
use gett::{extract_share_ref, ClientConfig, GettClient, ShareRef};

/// CLI tool for interacting with Ge.tt.
#[derive(Parser)]
#[command(name = "gett")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Ge.tt application API key.
    #[arg(long, env = "GETT_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Account email.
    #[arg(long, env = "GETT_EMAIL")]
    email: String,

    /// Account password.
    #[arg(long, env = "GETT_PASSWORD", hide_env_values = true)]
    password: String,

    /// API origin (defaults to the public Ge.tt endpoint).
    #[arg(long, env = "GETT_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show account information and storage usage.
    Me,

    /// List all shares.
    Shares,

    /// Manage a single share.
    Share {
        #[command(subcommand)]
        action: ShareAction,
    },

    /// Manage a single file.
    File {
        #[command(subcommand)]
        action: FileAction,
    },

    /// Upload files (supports glob patterns like *.jpg, img_{1,2,3}.png).
    Upload {
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Destination share URL or name. A new share is created if omitted.
        #[arg(long, short = 't')]
        to: Option<String>,

        /// Remote file name (only valid when uploading a single file).
        #[arg(long)]
        name: Option<String>,
    },

    /// Download a file to local filesystem.
    Download {
        /// Share URL or name (a file URL also carries the file id).
        share: String,

        /// File id, unless given by the URL.
        file_id: Option<String>,

        /// Local destination path (file or directory).
        #[arg(long, short = 't', default_value = ".")]
        to: PathBuf,
    },
}

#[derive(Subcommand)]
enum ShareAction {
    /// Create a new share.
    Create {
        #[arg(long)]
        title: Option<String>,
    },
    /// Show a share and its files.
    Get { share: String },
    /// Change (or clear, when --title is omitted) the title of a share.
    Update {
        share: String,
        #[arg(long)]
        title: Option<String>,
    },
    /// Destroy a share.
    Destroy { share: String },
}

#[derive(Subcommand)]
enum FileAction {
    /// Show a file.
    Get {
        share: String,
        file_id: Option<String>,
    },
    /// Destroy a file.
    Destroy {
        share: String,
        file_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("GETT_LOG")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::default();
    if let Some(base_url) = cli.base_url {
        config = config.base_url(base_url);
    }
    let mut client = GettClient::with_config(config).context("Failed to build HTTP client")?;

    client
        .authenticate(&cli.api_key, &cli.email, &cli.password)
        .await
        .with_context(|| format!("Failed to authenticate {}", cli.email))?;

    match cli.command {
        Commands::Me => {
            let me = client.get_user_information().await?;
            println!("{}", me);
        }

        Commands::Shares => {
            let shares = client.get_shares().await.context("Failed to list shares")?;
            if shares.is_empty() {
                println!("No shares found.");
            } else {
                println!("{:<12} {:<10} {:<10} {}", "SHARE", "STATE", "FILES", "TITLE");
                println!("{}", "-".repeat(60));
                for share in shares {
                    println!("{}", share);
                }
            }
        }

        Commands::Share { action } => match action {
            ShareAction::Create { title } => {
                let share = client.create_share(title.as_deref()).await?;
                println!("{}", share);
                if let Some(url) = &share.url {
                    println!("{}", url);
                }
            }
            ShareAction::Get { share } => {
                let name = extract_share_ref(&share)?.share_name;
                let share = client
                    .get_share(&name)
                    .await
                    .with_context(|| format!("Failed to fetch share {}", name))?;
                println!("{}", share);
                for file in &share.files {
                    println!("  {}", file);
                }
            }
            ShareAction::Update { share, title } => {
                let name = extract_share_ref(&share)?.share_name;
                let current = client.get_share(&name).await?;
                let updated = client.update_share(&current, title.as_deref()).await?;
                println!("{}", updated);
            }
            ShareAction::Destroy { share } => {
                let name = extract_share_ref(&share)?.share_name;
                let current = client.get_share(&name).await?;
                client.destroy_share(&current).await?;
                println!("Destroyed {}", name);
            }
        },

        Commands::File { action } => match action {
            FileAction::Get { share, file_id } => {
                let target = resolve_file(&share, file_id)?;
                let share = client.get_share(&target.share_name).await?;
                let file = client.get_file(&share, &file_id_of(&target)?).await?;
                println!("{}", file);
                if let Some(url) = &file.url {
                    println!("{}", url);
                }
            }
            FileAction::Destroy { share, file_id } => {
                let target = resolve_file(&share, file_id)?;
                let share = client.get_share(&target.share_name).await?;
                let file = client.get_file(&share, &file_id_of(&target)?).await?;
                client.destroy_file(&file).await?;
                println!("Destroyed {}/{}", file.share_name, file.file_id);
            }
        },

        Commands::Upload { patterns, to, name } => {
            // Expand glob patterns
            let mut files_to_upload: Vec<PathBuf> = Vec::new();

            for pattern in &patterns {
                // Handle brace expansion manually for patterns like file_{1,2,3}.txt
                for expanded_pattern in expand_braces(pattern) {
                    let matches: Vec<PathBuf> = glob(&expanded_pattern)
                        .with_context(|| format!("Invalid glob pattern: {}", expanded_pattern))?
                        .filter_map(|r| r.ok())
                        .filter(|p| p.is_file())
                        .collect();

                    if matches.is_empty() {
                        // If no glob matches, treat as literal path
                        let path = PathBuf::from(&expanded_pattern);
                        if path.is_file() {
                            files_to_upload.push(path);
                        } else {
                            eprintln!("Warning: No files matched pattern: {}", expanded_pattern);
                        }
                    } else {
                        files_to_upload.extend(matches);
                    }
                }
            }

            files_to_upload.sort();
            files_to_upload.dedup();

            if files_to_upload.is_empty() {
                anyhow::bail!("No files to upload");
            }
            if name.is_some() && files_to_upload.len() > 1 {
                anyhow::bail!("--name can only be used when uploading a single file");
            }

            // All files go to the same share, created on demand.
            let share = match to {
                Some(to) => {
                    let share_name = extract_share_ref(&to)?.share_name;
                    client.get_share(&share_name).await?
                }
                None => client.create_share(None).await?,
            };

            println!(
                "Uploading {} file(s) to {}...",
                files_to_upload.len(),
                share.share_name
            );

            for (idx, file_path) in files_to_upload.iter().enumerate() {
                let filename = file_path.file_name().unwrap_or_default().to_string_lossy();
                print!("[{}/{}] Uploading {}... ", idx + 1, files_to_upload.len(), filename);

                match client
                    .upload_file(file_path, Some(&share), name.as_deref())
                    .await
                {
                    Ok(file) => {
                        println!("OK ({})", file.file_id);
                        if let Some(url) = &file.url {
                            println!("  {}", url);
                        }
                    }
                    Err(e) => {
                        println!("FAILED");
                        eprintln!("  Error: {}", e);
                    }
                }
            }

            println!("Done.");
        }

        Commands::Download { share, file_id, to } => {
            let target = resolve_file(&share, file_id)?;
            let share = client.get_share(&target.share_name).await?;
            let file = client.get_file(&share, &file_id_of(&target)?).await?;

            print!("Downloading {}... ", file.file_name);
            let path = client
                .download_file(&file, &to)
                .await
                .with_context(|| format!("Failed to download file: {}", file.file_id))?;

            println!("OK");
            println!("Saved to: {:?}", path);
        }
    }

    Ok(())
}

/// Combine a share argument with an optional explicit file id. An explicit
/// id wins over one embedded in a file URL.
fn resolve_file(share: &str, file_id: Option<String>) -> Result<ShareRef> {
    let mut target = extract_share_ref(share)
        .with_context(|| format!("Invalid share URL or name: {}", share))?;
    if let Some(id) = file_id {
        target.file_id = Some(validate_file_id(&id)?);
    }
    Ok(target)
}

fn file_id_of(target: &ShareRef) -> Result<String> {
    target
        .file_id
        .clone()
        .with_context(|| format!("No file id given for share {}", target.share_name))
}

/// Expand brace patterns like file_{1,2,3}.txt into multiple patterns.
fn expand_braces(pattern: &str) -> Vec<String> {
    if let Some(start) = pattern.find('{') {
        if let Some(end) = pattern[start..].find('}') {
            let end = start + end;
            let prefix = &pattern[..start];
            let suffix = &pattern[end + 1..];
            let alternatives = &pattern[start + 1..end];

            return alternatives
                .split(',')
                .flat_map(|alt| {
                    let expanded = format!("{}{}{}", prefix, alt.trim(), suffix);
                    expand_braces(&expanded)
                })
                .collect();
        }
    }

    vec![pattern.to_string()]
}
