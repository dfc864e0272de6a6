//! Modelworks CLI
//!
//! Creates, inspects and edits project documents against the model schemas
//! found in the configured models directory.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use modelworks::{ItemId, ItemStore, JsonPath, SchemaNode, SchemaRegistry, Workbench, WorkbenchConfig};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "modelworks")]
#[command(about = "Create and edit schema-driven project documents")]
struct Cli {
    /// Config file layered over the default locations
    #[arg(short, long)]
    config: Option<String>,

    /// Directory holding *.model.json schemas
    #[arg(long)]
    models: Option<PathBuf>,

    /// Directory new project documents are created in
    #[arg(long)]
    projects: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the root schemas a project can be created from
    Models,

    /// Create a project document from a root schema
    New {
        /// Root schema $id
        schema: String,
        /// Project name (also the file name)
        name: String,
    },

    /// Print a document's tree
    Tree {
        file: PathBuf,
        /// Include hidden (property editor) nodes
        #[arg(long)]
        hidden: bool,
    },

    /// List the child objects a node can receive
    Options {
        file: PathBuf,
        #[arg(default_value = "/")]
        parent: JsonPath,
    },

    /// Create a child object
    Add {
        file: PathBuf,
        parent: JsonPath,
        /// Option title, as listed by `options`
        option: String,
        name: String,
    },

    /// Remove a node and every reference to it
    Remove { file: PathBuf, path: JsonPath },

    /// Set a leaf value (JSON, or a plain string)
    Set {
        file: PathBuf,
        path: JsonPath,
        value: String,
    },

    /// Print the $links registry
    Links { file: PathBuf },

    /// Write the effective configuration to a TOML file
    InitConfig {
        #[arg(default_value = "modelworks.toml")]
        path: String,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = WorkbenchConfig::load_from(cli.config.as_deref()).context("loading config")?;
    if let Some(models) = cli.models {
        config.paths.models = models;
    }
    if let Some(projects) = cli.projects {
        config.paths.projects = projects;
    }

    let command = match cli.command {
        Commands::InitConfig { path, force } => return init_config(&config, &path, force),
        command => command,
    };

    let registry = load_models(&config.models_dir())?;
    let format = config.output.format;
    let mut bench = Workbench::new(registry, config);

    match command {
        Commands::Models => {
            for schema in bench.registry().root_schemas() {
                let node = SchemaNode::new(schema);
                println!(
                    "{}\t{}",
                    node.id().unwrap_or_default(),
                    node.title().unwrap_or_default()
                );
            }
        }

        Commands::New { schema, name } => {
            let path = bench.create_root(&schema, &name)?;
            println!("Created {}", path.display());
        }

        Commands::Tree { file, hidden } => {
            report(&bench.open(&file)?);
            let document = bench
                .document(&file)
                .context("document did not open")?;
            let store = document.store();
            if let Some(root) = store.root() {
                print_tree(store, root, 0, hidden);
            }
        }

        Commands::Options { file, parent } => {
            bench.open(&file)?;
            for option in bench.child_options(&file, &parent)? {
                println!("{}\t{}", option.title, option.insertion_path);
            }
        }

        Commands::Add {
            file,
            parent,
            option,
            name,
        } => {
            bench.open(&file)?;
            let options = bench.child_options(&file, &parent)?;
            let Some(chosen) = options.iter().find(|o| o.title == option) else {
                let titles: Vec<&str> = options.iter().map(|o| o.title.as_str()).collect();
                bail!("no option '{}' under {} (available: {})", option, parent, titles.join(", "));
            };
            let path = bench.create_child(&file, &parent, chosen, &name)?;
            println!("Created {}", path);
        }

        Commands::Remove { file, path } => {
            bench.open(&file)?;
            let removed = bench.remove_node(&file, &path)?;
            println!("Removed {} value(s)", removed);
        }

        Commands::Set { file, path, value } => {
            bench.open(&file)?;
            let value = serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
            bench.edit_leaf(&file, &path, value)?;
            println!("Set {}", path);
        }

        Commands::Links { file } => {
            bench.open(&file)?;
            let links = bench.links(&file)?;
            println!("{}", format.render(&serde_json::to_value(links)?)?);
        }

        // written before models are loaded
        Commands::InitConfig { .. } => {}
    }

    Ok(())
}

fn init_config(config: &WorkbenchConfig, path: &str, force: bool) -> anyhow::Result<()> {
    if Path::new(path).exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path);
    }
    config.save(path).with_context(|| format!("writing {}", path))?;
    println!("Wrote {}", path);
    Ok(())
}

/// Load every `*.model.json` below `dir`. Files that fail to load are
/// skipped with a warning.
fn load_models(dir: &Path) -> anyhow::Result<SchemaRegistry> {
    if !dir.is_dir() {
        bail!("models directory {} does not exist", dir.display());
    }

    let mut loader = SchemaRegistry::load();
    for entry in WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if !path.to_string_lossy().ends_with(".model.json") {
            continue;
        }
        if let Err(e) = loader.add_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "skipping model");
        }
    }
    Ok(loader.freeze())
}

fn report(diagnostics: &modelworks::Diagnostics) {
    for diagnostic in diagnostics.iter() {
        eprintln!("{}", diagnostic);
    }
}

fn print_tree(store: &ItemStore, id: ItemId, depth: usize, hidden: bool) {
    let Some(item) = store.get(id) else { return };
    let indent = "  ".repeat(depth);
    match item.description() {
        Some(title) => println!("{}{} ({})", indent, item.label, title),
        None => println!("{}{}", indent, item.label),
    }

    if hidden {
        for child in &item.hidden_children {
            if let Some(leaf) = store.get(*child) {
                println!("{}  . {} = {}", indent, leaf.label, leaf.value);
            }
        }
    }
    for child in &item.children {
        print_tree(store, *child, depth + 1, hidden);
    }
}
