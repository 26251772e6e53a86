use clap::{Parser, Subcommand};
use std::path::Path;

use epub_parser_core::config::{config_path, load_config, parse_options_from_config, AppConfig};
use epub_parser_core::toc::TocNode;
use epub_parser_core::{parse_epub, Epub, InputKind, ParseOptions};

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "epub-parser")]
#[command(about = "Inspect EPUB metadata, navigation and segmented content")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show book metadata and counts
    Info {
        /// Input file
        input: String,
    },

    /// Print the table of contents
    Toc {
        /// Input file
        input: String,
    },

    /// List spine sections
    Sections {
        /// Input file
        input: String,

        /// Print each section's markdown
        #[arg(long)]
        markdown: bool,
    },

    /// Print the content of one table-of-contents entry
    Show {
        /// Input file
        input: String,

        /// Play order of the entry
        play_order: u32,

        /// Print the HTML slice instead of markdown
        #[arg(long)]
        html: bool,
    },

    /// Dump the whole parsed book as JSON
    Dump {
        /// Input file
        input: String,

        /// Include expanded HTML node trees for every section
        #[arg(long)]
        expand: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Initialize default config file
    Init,
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Key (dot-separated path)
        key: String,
        /// Value
        value: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Info { input } => run_info(input, cli.json).await,
        Commands::Toc { input } => run_toc(input, cli.json).await,
        Commands::Sections { input, markdown } => run_sections(input, *markdown, cli.json).await,
        Commands::Show { input, play_order, html } => run_show(input, *play_order, *html, cli.json).await,
        Commands::Dump { input, expand } => run_dump(input, *expand).await,
        Commands::Config { action } => run_config(action, cli.json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn open(input: &str, opts: ParseOptions) -> Result<Epub, Box<dyn std::error::Error + Send + Sync>> {
    let path = Path::new(input);
    if !path.is_file() {
        return Err(format!("Input file not found: {}", path.display()).into());
    }
    let opts = ParseOptions {
        kind: Some(InputKind::Path),
        ..opts
    };
    tracing::debug!(input = %path.display(), expand = opts.expand, "Parsing book");
    let epub = parse_epub(path, &opts).await?;
    tracing::debug!(
        sections = epub.sections().len(),
        has_toc = epub.structure().is_some(),
        "Parsed book"
    );
    Ok(epub)
}

fn configured_options() -> ParseOptions {
    parse_options_from_config(&load_config())
}

async fn run_info(input: &str, json: bool) -> CliResult {
    let epub = open(input, configured_options()).await?;
    let toc_entries = epub.structure().map(|s| s.iter().map(TocNode::count).sum::<usize>());

    if json {
        let info = serde_json::json!({
            "info": epub.info(),
            "version": epub.package().version,
            "sections": epub.sections().len(),
            "tocEntries": toc_entries,
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        let info = epub.info();
        if let Some(t) = &info.title {
            println!("Title: {}", t);
        }
        if let Some(a) = &info.author {
            println!("Author: {}", a);
        }
        if let Some(p) = &info.publisher {
            println!("Publisher: {}", p);
        }
        if let Some(v) = epub.package().version {
            println!("Version: {}", v);
        }
        println!("Sections: {}", epub.sections().len());
        match toc_entries {
            Some(n) => println!("TOC entries: {}", n),
            None => println!("TOC entries: none"),
        }
    }
    Ok(())
}

async fn run_toc(input: &str, json: bool) -> CliResult {
    let epub = open(input, configured_options()).await?;
    let Some(structure) = epub.structure() else {
        if json {
            println!("null");
        } else {
            println!("No table of contents");
        }
        return Ok(());
    };

    if json {
        let outline: Vec<_> = structure.iter().map(outline).collect();
        println!("{}", serde_json::to_string_pretty(&outline)?);
    } else {
        print_tree(structure, 0);
    }
    Ok(())
}

/// Navigation fields only; content slices are left to `show` and `dump`.
fn outline(node: &TocNode) -> serde_json::Value {
    serde_json::json!({
        "name": node.name,
        "playOrder": node.play_order,
        "sectionId": node.section_id,
        "nodeId": node.node_id,
        "path": node.path,
        "children": node.children.iter().map(outline).collect::<Vec<_>>(),
    })
}

fn print_tree(nodes: &[TocNode], depth: usize) {
    for node in nodes {
        let order = node.play_order.map(|o| o.to_string()).unwrap_or_default();
        let section = node.section_id.as_deref().unwrap_or("?");
        println!("{}{}. {} [{}]", "  ".repeat(depth), order, node.name, section);
        print_tree(&node.children, depth + 1);
    }
}

async fn run_sections(input: &str, markdown: bool, json: bool) -> CliResult {
    let epub = open(input, configured_options()).await?;

    if json {
        let list: Vec<_> = epub
            .sections()
            .iter()
            .map(|s| {
                let mut entry = serde_json::json!({
                    "id": s.id(),
                    "filePath": s.file_path(),
                    "bytes": s.html_string().len(),
                });
                if markdown {
                    entry["markdown"] = serde_json::Value::from(s.markdown());
                }
                entry
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else if markdown {
        for s in epub.sections() {
            println!("<!-- {} -->\n{}\n", s.id(), s.markdown());
        }
    } else {
        for s in epub.sections() {
            println!("{}\t{}\t{} bytes", s.id(), s.file_path(), s.html_string().len());
        }
    }
    Ok(())
}

async fn run_show(input: &str, play_order: u32, html: bool, json: bool) -> CliResult {
    let epub = open(input, configured_options()).await?;
    let node = epub
        .find_node(play_order)
        .ok_or_else(|| format!("No TOC entry with play order {}", play_order))?;

    if json {
        println!("{}", serde_json::to_string_pretty(node)?);
        return Ok(());
    }

    let body = if html {
        node.content.as_deref()
    } else {
        node.markdown_content.as_deref()
    };
    let body = body.ok_or_else(|| format!("TOC entry {} ({}) has no content", play_order, node.name))?;
    println!("{}", body);
    Ok(())
}

async fn run_dump(input: &str, expand: bool) -> CliResult {
    let opts = configured_options();
    let opts = ParseOptions {
        expand: expand || opts.expand,
        ..opts
    };
    let epub = open(input, opts).await?;

    let mut value = serde_json::to_value(&epub)?;
    if expand {
        if let Some(sections) = value.get_mut("sections").and_then(|s| s.as_array_mut()) {
            for (entry, section) in sections.iter_mut().zip(epub.sections()) {
                entry["htmlNodes"] = serde_json::to_value(section.html_nodes())?;
            }
        }
    }
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn run_config(action: &ConfigAction, json: bool) -> CliResult {
    match action {
        ConfigAction::Init => {
            let path = config_path().ok_or("Could not determine config directory")?;
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let toml = toml::to_string_pretty(&AppConfig::default())?;
            std::fs::write(&path, toml)?;
            println!("Wrote default config to {}", path.display());
        }
        ConfigAction::Show => {
            let cfg = load_config();
            if json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else {
                println!("{}", toml::to_string_pretty(&cfg)?);
            }
        }
        ConfigAction::Set { key, value } => {
            let path = config_path().ok_or("Could not determine config directory")?;
            let mut cfg: AppConfig = if path.exists() {
                let s = std::fs::read_to_string(&path)?;
                toml::from_str(&s).unwrap_or_default()
            } else {
                AppConfig::default()
            };

            set_config_key(&mut cfg, key, value)?;
            tracing::debug!(key = %key, value = %value, path = %path.display(), "Writing config");

            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::write(&path, toml::to_string_pretty(&cfg)?)?;
            if !json {
                println!("Updated {}", key);
            }
        }
    }
    Ok(())
}

fn set_config_key(cfg: &mut AppConfig, key: &str, value: &str) -> CliResult {
    let invalid = || format!("Invalid value for {}: {}", key, value);
    let parts: Vec<&str> = key.splitn(2, '.').collect();
    match parts.as_slice() {
        ["parse", sub] => match *sub {
            "expand" => cfg.parse.expand = value.parse().map_err(|_| invalid())?,
            "inline_images" => cfg.parse.inline_images = value.parse().map_err(|_| invalid())?,
            _ => return Err(format!("Unknown key: {}", key).into()),
        },
        ["security", sub] => {
            let n = Some(value.parse::<u64>().map_err(|_| invalid())?);
            match *sub {
                "max_file_size_mb" => cfg.security.max_file_size_mb = n,
                "max_file_count" => cfg.security.max_file_count = n,
                "max_compression_ratio" => cfg.security.max_compression_ratio = n,
                _ => return Err(format!("Unknown key: {}", key).into()),
            }
        }
        _ => return Err(format!("Unknown key: {}", key).into()),
    }
    Ok(())
}
