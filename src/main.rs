//! talc command line.
//!
//! # Usage
//!
//! ```bash
//! # Render a template with JSON globals
//! talc render page.pt --globals data.json
//!
//! # Keep compiled programs between runs
//! talc render page.pt --cache-dir ./.talc-cache --dependency text
//!
//! # Print the cache key of a template
//! talc key page.pt
//! ```

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use talc::{
    CompileOptions, FileStorage, TemplateCache, TemplateCacheBuilder, TemplateMode, Value,
};

#[derive(Parser)]
#[command(name = "talc")]
#[command(about = "Compile and render TAL/METAL templates")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct TemplateArgs {
    /// Template file
    template: PathBuf,

    /// Function library made available to host expressions (repeatable)
    #[arg(long = "dependency", value_name = "NAME")]
    dependencies: Vec<String>,

    /// Directory imports are resolved against [default: the template's directory]
    #[arg(long, value_name = "DIR")]
    import_root: Option<PathBuf>,

    /// Treat the template as plain text
    #[arg(long)]
    text: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template to stdout
    Render {
        #[command(flatten)]
        template: TemplateArgs,

        /// JSON object whose members become globals
        #[arg(long, value_name = "FILE")]
        globals: Option<PathBuf>,

        /// Directory for compiled programs
        #[arg(long, value_name = "DIR")]
        cache_dir: Option<PathBuf>,

        /// File name pattern for compiled programs; must contain {key}
        #[arg(long, default_value = FileStorage::DEFAULT_PATTERN)]
        pattern: String,
    },

    /// Print the cache key of a template
    Key {
        #[command(flatten)]
        template: TemplateArgs,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            template,
            globals,
            cache_dir,
            pattern,
        } => {
            let mut builder = cache_builder(&template);
            if let Some(directory) = cache_dir {
                builder = builder.with_file_storage(directory, &pattern);
            }
            let cache = builder.build()?;
            let (source, options) = load_template(&template)?;
            let globals = match globals {
                Some(path) => load_globals(&path)?,
                None => HashMap::new(),
            };
            let output = cache.render(&source, &globals, &options)?;
            io::stdout().write_all(output.as_bytes())?;
        }
        Commands::Key { template } => {
            let cache = cache_builder(&template).build()?;
            let (source, options) = load_template(&template)?;
            println!("{}", cache.key_for(&source, &options)?);
        }
    }
    Ok(())
}

fn cache_builder(args: &TemplateArgs) -> TemplateCacheBuilder {
    let root = match &args.import_root {
        Some(root) => root.clone(),
        None => template_dir(&args.template),
    };
    let mode = if args.text {
        TemplateMode::Text
    } else {
        TemplateMode::Markup
    };
    TemplateCache::builder()
        .with_template_root(root)
        .with_mode(mode)
}

fn template_dir(template: &Path) -> PathBuf {
    match template.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn load_template(args: &TemplateArgs) -> Result<(String, CompileOptions), Box<dyn Error>> {
    let source = fs::read_to_string(&args.template).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("Failed to read template '{}': {}", args.template.display(), e),
        )
    })?;
    let filename = match &args.import_root {
        Some(root) => args.template.strip_prefix(root).unwrap_or(&args.template),
        None => Path::new(args.template.file_name().unwrap_or_default()),
    };
    let mut options = CompileOptions::new().with_filename(filename.to_string_lossy());
    for dependency in &args.dependencies {
        options = options.with_dependency(dependency.as_str());
    }
    Ok((source, options))
}

fn load_globals(path: &Path) -> Result<HashMap<String, Value>, Box<dyn Error>> {
    let text = fs::read_to_string(path)?;
    let serde_json::Value::Object(members) = serde_json::from_str::<serde_json::Value>(&text)? else {
        return Err(format!("Globals file '{}' must hold a JSON object", path.display()).into());
    };
    Ok(members
        .into_iter()
        .map(|(name, value)| (name, Value::from(value)))
        .collect())
}
