//! yamlgraph command line interface.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use serde_yaml::Value;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use yamlgraph::catalog::{builtin_registry, load_catalog};
use yamlgraph::config::Settings;
use yamlgraph::convert::{
    convert_with_prepare, escape_label, ConversionHooks, ConversionResult, EmittedNode, NoHooks,
};
use yamlgraph::document::{self, ParsedDocument};
use yamlgraph::registry::{GraphType, GraphTypeRegistry};
use yamlgraph::schema::ValidationError;
use yamlgraph::selection::NodeEditorController;
use yamlgraph::tree::{build_tree, TreeNode};
use yamlgraph::version::resolve_graph_type;

#[derive(Parser)]
#[command(name = "yamlgraph")]
#[command(author, version, about = "Typed YAML graph documents rendered as Mermaid flowcharts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Directory of *.graphtype.{yaml,yml,json} definitions loaded on top of the built-ins
    #[arg(long, global = true)]
    types: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a graph document to Mermaid flowchart text
    Convert {
        /// Graph document (use - for stdin together with --name)
        input: String,

        /// File name used to match graph types when reading stdin
        #[arg(long)]
        name: Option<String>,

        /// Emit click directives that call back into the host
        #[arg(long)]
        interactive: bool,

        /// Print the full result (source, errors, node and edge maps) as JSON
        #[arg(long)]
        json: bool,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Print the display tree of a graph document
    Tree {
        input: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Validate a graph document against its graph type schema
    Validate {
        input: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Print the editor field schemas for elements under a source path
    Fields {
        input: String,

        /// Element collection path, e.g. nodes or nodes.*.connections
        #[arg(long, default_value = "nodes")]
        source_path: String,

        #[arg(long)]
        name: Option<String>,
    },

    /// Replace the value at a dotted path
    Set {
        file: PathBuf,
        path: String,
        /// New value, parsed as YAML
        value: String,
        /// Write the result back to the file instead of stdout
        #[arg(short, long)]
        in_place: bool,
    },

    /// Add a key to the mapping at a dotted path ("" for the root)
    Add {
        file: PathBuf,
        parent: String,
        key: String,
        value: String,
        #[arg(short, long)]
        in_place: bool,
    },

    /// Append an item to the sequence at a dotted path
    Append {
        file: PathBuf,
        path: String,
        value: String,
        #[arg(short, long)]
        in_place: bool,
    },

    /// Remove the map entry or sequence item at a dotted path
    Delete {
        file: PathBuf,
        path: String,
        #[arg(short, long)]
        in_place: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Convert {
            input,
            name,
            interactive,
            json,
            output,
        } => cmd_convert(
            cli.types.as_deref(),
            &input,
            name.as_deref(),
            interactive,
            json,
            output.as_deref(),
        ),
        Commands::Tree { input, name, json } => {
            cmd_tree(cli.types.as_deref(), &input, name.as_deref(), json)
        }
        Commands::Validate { input, name, json } => {
            cmd_validate(cli.types.as_deref(), &input, name.as_deref(), json)
        }
        Commands::Fields {
            input,
            source_path,
            name,
        } => cmd_fields(cli.types.as_deref(), &input, name.as_deref(), &source_path),
        Commands::Set {
            file,
            path,
            value,
            in_place,
        } => cmd_edit(&file, in_place, |doc| {
            Ok(doc.edit_value(&path, &parse_value(&value)?)?)
        }),
        Commands::Add {
            file,
            parent,
            key,
            value,
            in_place,
        } => cmd_edit(&file, in_place, |doc| {
            Ok(doc.add_map_entry(&parent, &key, &parse_value(&value)?)?)
        }),
        Commands::Append {
            file,
            path,
            value,
            in_place,
        } => cmd_edit(&file, in_place, |doc| {
            Ok(doc.append_to_sequence(&path, &parse_value(&value)?)?)
        }),
        Commands::Delete {
            file,
            path,
            in_place,
        } => cmd_edit(&file, in_place, |doc| Ok(doc.delete_entry(&path)?)),
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

// ============================================================================
// Loading
// ============================================================================

/// A graph document together with everything needed to interpret it.
struct Loaded {
    text: String,
    settings: Settings,
    graph_type: Arc<GraphType>,
}

fn load_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read file: {input}"))
    }
}

fn write_output(output: Option<&str>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("Failed to write: {path}"))?;
            info!("Wrote output to: {path}");
        }
        None => println!("{content}"),
    }
    Ok(())
}

fn load_registry(types: Option<&Path>) -> Result<GraphTypeRegistry> {
    let Some(dir) = types else {
        return builtin_registry();
    };

    let catalog = load_catalog(dir)
        .with_context(|| format!("Failed to load graph types from {}", dir.display()))?;
    for failure in &catalog.failures {
        warn!(path = %failure.path.display(), "skipped graph type: {:#}", failure.error);
    }
    Ok(catalog.registry)
}

fn load_settings(input: &str) -> Settings {
    let root = if input == "-" {
        PathBuf::from(".")
    } else {
        match Path::new(input).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    };

    Settings::new(&root).unwrap_or_else(|err| {
        warn!("Failed to load settings from {}: {err:#}", root.display());
        Settings::default()
    })
}

fn load(types: Option<&Path>, input: &str, name: Option<&str>) -> Result<Loaded> {
    let file_name = match (name, input) {
        (Some(name), _) => name,
        (None, "-") => bail!("--name is required when reading from stdin"),
        (None, path) => path,
    };

    let text = load_input(input)?;
    let settings = load_settings(input);
    let registry = load_registry(types)?;
    let graph_type = resolve_graph_type(&registry, file_name, &text, &settings)
        .with_context(|| format!("Failed to resolve graph type for {file_name}"))?;
    debug!(key = graph_type.version_key(), "using graph type");

    Ok(Loaded {
        text,
        settings,
        graph_type,
    })
}

fn parse_value(raw: &str) -> Result<Value> {
    serde_yaml::from_str(raw).with_context(|| format!("Invalid YAML value: {raw}"))
}

fn parse_data(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str(text).context("Failed to parse document")
}

// ============================================================================
// Commands
// ============================================================================

/// Adds `click` directives so a rendered diagram can report node clicks.
struct ClickDirectives {
    callback: String,
}

impl ConversionHooks for ClickDirectives {
    fn on_node_emit(&mut self, node: &EmittedNode<'_>) -> Vec<String> {
        vec![format!(
            "click {} call {}(\"{}\")",
            node.mermaid_id,
            self.callback,
            escape_label(node.id)
        )]
    }
}

fn run_conversion(loaded: &Loaded, interactive: bool) -> ConversionResult {
    let context = loaded.settings.conversion_context();
    if interactive {
        let mut hooks = ClickDirectives {
            callback: loaded.settings.click_callback.clone(),
        };
        convert_with_prepare(&loaded.text, &loaded.graph_type, &context, &mut hooks)
    } else {
        convert_with_prepare(&loaded.text, &loaded.graph_type, &context, &mut NoHooks)
    }
}

fn cmd_convert(
    types: Option<&Path>,
    input: &str,
    name: Option<&str>,
    interactive: bool,
    json: bool,
    output: Option<&str>,
) -> Result<()> {
    let loaded = load(types, input, name)?;
    let result = run_conversion(&loaded, interactive);

    for error in &result.errors {
        warn!("{}", describe(error));
    }

    if json {
        write_output(output, &serde_json::to_string_pretty(&result)?)
    } else {
        write_output(output, result.mermaid_source.trim_end())
    }
}

fn cmd_tree(types: Option<&Path>, input: &str, name: Option<&str>, json: bool) -> Result<()> {
    let loaded = load(types, input, name)?;
    let data = parse_data(&loaded.text)?;
    let tree = build_tree(&data, &loaded.graph_type, &loaded.settings.tree_options());

    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        let mut out = String::new();
        render_tree(&tree, 0, &mut out);
        print!("{out}");
    }
    Ok(())
}

fn render_tree(nodes: &[TreeNode], depth: usize, out: &mut String) {
    for node in nodes {
        out.push_str(&"  ".repeat(depth));
        match &node.icon {
            Some(icon) => out.push_str(&format!("{} [{}]\n", node.label, icon)),
            None => out.push_str(&format!("{}\n", node.label)),
        }
        if let Some(children) = &node.children {
            render_tree(children, depth + 1, out);
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateReport {
    valid: bool,
    graph_type: String,
    node_count: usize,
    edge_count: usize,
    errors: Vec<ValidationError>,
}

fn cmd_validate(types: Option<&Path>, input: &str, name: Option<&str>, json: bool) -> Result<()> {
    let loaded = load(types, input, name)?;
    let result = run_conversion(&loaded, false);

    let report = ValidateReport {
        valid: result.errors.is_empty(),
        graph_type: loaded.graph_type.version_key(),
        node_count: result.node_map.len(),
        edge_count: result.edge_map.len(),
        errors: result.errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if report.valid {
            println!("✓ Valid {} document", report.graph_type);
        } else {
            println!("✗ Invalid {} document", report.graph_type);
        }
        println!("  Nodes: {}", report.node_count);
        println!("  Edges: {}", report.edge_count);
        for error in &report.errors {
            println!("  {}", describe(error));
        }
    }

    if !report.valid {
        std::process::exit(1);
    }
    Ok(())
}

fn describe(error: &ValidationError) -> String {
    if error.path.is_empty() {
        error.message.clone()
    } else {
        format!("{}: {}", error.path, error.message)
    }
}

fn cmd_fields(types: Option<&Path>, input: &str, name: Option<&str>, source_path: &str) -> Result<()> {
    let loaded = load(types, input, name)?;
    let mut controller = NodeEditorController::new();
    let fields = controller
        .field_schemas(&loaded.graph_type, source_path)
        .with_context(|| format!("Failed to resolve field schemas for {source_path}"))?;
    println!("{}", serde_json::to_string_pretty(fields.as_slice())?);
    Ok(())
}

fn cmd_edit(
    file: &Path,
    in_place: bool,
    mutate: impl FnOnce(&ParsedDocument) -> Result<String>,
) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    let doc = document::parse(&text)
        .with_context(|| format!("Failed to parse {}", file.display()))?;
    let updated = mutate(&doc)?;

    if in_place {
        std::fs::write(file, &updated)
            .with_context(|| format!("Failed to write: {}", file.display()))?;
        info!("Updated {}", file.display());
    } else {
        print!("{updated}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, icon: Option<&str>, children: Option<Vec<TreeNode>>) -> TreeNode {
        TreeNode {
            id: id.to_string(),
            label: id.to_uppercase(),
            icon: icon.map(str::to_string),
            kind: None,
            children,
        }
    }

    #[test]
    fn test_render_tree_indents_children_and_skips_missing_icons() {
        let tree = vec![node(
            "nodes",
            Some("folder"),
            Some(vec![node("start", Some("debug-start"), None), node("plain", None, None)]),
        )];

        let mut out = String::new();
        render_tree(&tree, 0, &mut out);
        assert_eq!(out, "NODES [folder]\n  START [debug-start]\n  PLAIN\n");
    }

    #[test]
    fn test_click_directives_quote_node_ids() {
        let mut hooks = ClickDirectives {
            callback: "reveal".to_string(),
        };
        let value = Value::Null;
        let lines = hooks.on_node_emit(&EmittedNode {
            id: "a-b",
            mermaid_id: "a_b",
            data_path: "nodes.a-b",
            line: 1,
            value: &value,
        });
        assert_eq!(lines, vec!["click a_b call reveal(\"a-b\")".to_string()]);
    }
}
