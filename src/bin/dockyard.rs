use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dockyard::common::config::{Config, config_file, layout_file};
use dockyard::common::geometry::Rect;
use dockyard::common::log;
use dockyard::factory::Factory;
use dockyard::layout_engine::{Edge, Orientation};
use dockyard::model::{DockModel, Dockable};
use dockyard::persistence::{self, LayoutSnapshot};

#[derive(Parser)]
#[command(version, about = "Inspect and arrange saved docking layouts")]
struct Cli {
    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Layout file to operate on (overrides default).
    #[arg(long, value_name = "PATH")]
    layout: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the configuration and the saved layout.
    Validate,
    /// Print the layout tree.
    Print {
        /// Dump the snapshot as JSON instead of drawing the tree.
        #[arg(long)]
        json: bool,
    },
    /// Arrange the main root into a frame and print every rectangle.
    Arrange {
        #[arg(long, default_value_t = 1280.0)]
        width: f64,
        #[arg(long, default_value_t = 800.0)]
        height: f64,
    },
    /// Write a starter layout.
    Init {
        /// Overwrite an existing layout file.
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let opt = Cli::parse();
    log::init_logging();

    let config_path = opt.config.clone().unwrap_or_else(config_file);
    let layout_path = opt.layout.clone().unwrap_or_else(layout_file);
    if let Err(err) = run(&opt.command, &config_path, &layout_path) {
        eprintln!("{err:#}");
        process::exit(1);
    }
}

fn run(command: &Commands, config_path: &Path, layout_path: &Path) -> anyhow::Result<()> {
    let config = Config::load_or_default(config_path)?;
    match command {
        Commands::Validate => {
            let mut issues = config.validate();
            let model = load(layout_path)?;
            issues.extend(model.violations());
            if issues.is_empty() {
                println!("Config and layout validation passed");
            } else {
                for issue in issues {
                    eprintln!("{issue}");
                }
                process::exit(1);
            }
        }
        Commands::Print { json } => {
            let model = load(layout_path)?;
            if *json {
                let snapshot = persistence::capture(&model);
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print!("{}", model.draw_tree(model.root()));
                for (_, window) in model.windows() {
                    println!("window {} {:?}", window.id, window.frame);
                    print!("{}", model.draw_tree(window.layout));
                }
            }
        }
        Commands::Arrange { width, height } => {
            let model = load(layout_path)?;
            let root = model.root();
            let mut factory = Factory::new(model, config);
            let layout = factory.arrange(root, Rect::new(0.0, 0.0, *width, *height));
            for (node, rect) in layout.iter().filter(|(_, r)| !r.is_empty()) {
                let Some(d) = factory.model().get(node) else { continue };
                println!(
                    "{:<24} {:>12} {:>8.1} {:>8.1} {:>8.1} {:>8.1}",
                    d.id,
                    d.kind.tag().to_string(),
                    rect.x,
                    rect.y,
                    rect.width,
                    rect.height
                );
            }
        }
        Commands::Init { force } => {
            if layout_path.exists() && !force {
                anyhow::bail!("{} already exists, pass --force to overwrite", layout_path.display());
            }
            persistence::save_ron(&starter_layout(), layout_path)?;
            println!("Wrote {}", layout_path.display());
        }
    }
    Ok(())
}

fn load(path: &Path) -> anyhow::Result<DockModel> {
    let snapshot = persistence::load_ron(path)?;
    persistence::restore(&snapshot).with_context(|| format!("restoring layout from {}", path.display()))
}

/// Tools on the left, documents filling the rest.
fn starter_layout() -> LayoutSnapshot {
    let mut model = DockModel::new("root");
    let main = model.insert(model.root(), Dockable::proportional("main", Orientation::Horizontal));
    let tools = model.insert(main, Dockable::tool_dock("tools", Edge::Left).with_proportion(0.25));
    model.insert(tools, Dockable::tool("explorer", "Explorer"));
    model.insert(main, Dockable::splitter("main-splitter"));
    let docs = model.insert(main, Dockable::document_dock("documents").with_proportion(0.75));
    model.insert(docs, Dockable::document("welcome", "Welcome"));
    persistence::capture(&model)
}
