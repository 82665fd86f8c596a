use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use bundlepath::codec;
use bundlepath::css::{BinaryResourceHandler, CssRewriteContext, CssUrlRewriter};
use bundlepath::paths;
use bundlepath::{BundlerConfig, FileSystemReader, GeneratorRegistry};

/// Inspect and exercise bundle path handling from the command line.
#[derive(Debug, Parser)]
#[command(name = "bundlepath", version, about)]
struct Cli {
  /// Directory searched for `bundlepath.config.json`.
  #[arg(long, global = true, default_value = ".")]
  config_dir: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
  /// Decode a bundle request path.
  Decode {
    request_path: String,
    /// Bundle prefix, tried in the order given; defaults to the configured prefixes.
    #[arg(long = "prefix")]
    prefixes: Vec<String>,
  },
  /// Encode a logical path into a bundle request path.
  Encode {
    path: String,
    #[arg(long)]
    hash: String,
    #[arg(long)]
    variant: Option<String>,
  },
  /// Relative path between two paths.
  Relative {
    from: String,
    to: String,
    /// Treat both as filesystem paths using this separator.
    #[arg(long)]
    separator: Option<char>,
  },
  /// Concatenate a relative file name to a base web path.
  Concat { base: String, file: String },
  /// Strip the cache-buster token of a binary resource path.
  BinaryInfo { path: String },
  /// Rewrite the `url(...)` references of a stylesheet relocated into a bundle.
  RewriteCss {
    /// Web application root the stylesheet and its images live in.
    #[arg(long)]
    root: PathBuf,
    /// Logical path of the stylesheet.
    #[arg(long)]
    original: String,
    /// Logical path of the bundle it moves into.
    #[arg(long)]
    target: String,
  },
}

fn main() -> ExitCode {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(std::io::stderr))
    .init();

  match run(Cli::parse()) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      eprintln!("error: {err:#}");
      ExitCode::FAILURE
    }
  }
}

fn run(cli: Cli) -> Result<()> {
  let config = BundlerConfig::discover(&cli.config_dir);
  debug!(?config, "loaded configuration");

  match cli.command {
    Command::Decode {
      request_path,
      prefixes,
    } => {
      let prefixes = if prefixes.is_empty() {
        config.bundle_prefixes
      } else {
        prefixes
      };
      let info = codec::decode(&request_path, &prefixes)?;
      println!("{}", serde_json::to_string_pretty(&info)?);
    }
    Command::Encode {
      path,
      hash,
      variant,
    } => {
      let generated = path.trim_start_matches('/').contains(':');
      println!("{}", codec::encode(&path, &hash, variant.as_deref(), generated));
    }
    Command::Relative {
      from,
      to,
      separator,
    } => match separator {
      Some(separator) => match paths::relative_file_path(&from, &to, separator) {
        Some(relative) => println!("{relative}"),
        None => bail!("no relative path between '{from}' and '{to}'"),
      },
      None => println!("{}", paths::relative_web_path(&from, &to)),
    },
    Command::Concat { base, file } => {
      let joined = paths::resolve_against(&base, &file)?;
      println!("{joined}");
    }
    Command::BinaryInfo { path } => match codec::extract_binary_resource_info(&path) {
      Some(info) => println!("{}", serde_json::to_string_pretty(&info)?),
      None => bail!("'{path}' carries no cache-buster token"),
    },
    Command::RewriteCss {
      root,
      original,
      target,
    } => {
      let reader = FileSystemReader::new(&root);
      let css_file = root.join(original.trim_start_matches('/'));
      let css = fs::read_to_string(&css_file)
        .with_context(|| format!("failed to read stylesheet {}", css_file.display()))?;

      let registry = Arc::new(GeneratorRegistry::new(config.generation_path.clone()));
      let binary = BinaryResourceHandler::new(
        config.binary_servlet_mapping.clone(),
        Arc::clone(&registry),
        Arc::new(reader),
      );
      let mut rewriter = CssUrlRewriter::new(&registry, Some(&binary));
      let context = CssRewriteContext {
        original_css_path: &original,
        new_css_path: &target,
        bundle: &target,
      };
      print!("{}", rewriter.rewrite_stylesheet(&css, &context));
    }
  }
  Ok(())
}
