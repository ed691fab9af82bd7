use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::{
    ffi::CString,
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
    process,
    sync::Arc,
};
use tracing::{debug, error, info};
use zen_bridge::{
    config::{BridgeConfig, ConfigManager, EnvConfigManager},
    custom_node::{HandlebarsRenderer, HandlerRegistry, NodeAdapter, TemplateRenderer},
    logger::{LogConfig, init_tracing},
    nodes::builtin_registry,
    schema::write_schema,
};

#[derive(Parser, Debug)]
#[command(
    name = "zen-bridge",
    about = "Run custom decision nodes through the native bridge",
    version
)]
struct Cli {
    /// `.env` file loaded before reading settings
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,

    /// Log filter (e.g. error, warn, info, debug, trace); overrides ZEN_BRIDGE_LOG_LEVEL
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory for rolling JSON logs; overrides ZEN_BRIDGE_LOG_DIR
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate one node request through the C ABI
    Invoke(InvokeArgs),

    /// List the registered node kinds
    Kinds,

    /// Emit JSON-Schema for the request and response
    Schema(SchemaArgs),
}

#[derive(Args, Debug)]
struct InvokeArgs {
    /// Request file; stdin when missing or `-`
    file: Option<PathBuf>,

    /// Pretty-print the response
    #[arg(long)]
    pretty: bool,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    #[arg(long, default_value = "schemas")]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env = EnvConfigManager::new(cli.env_file.clone())?;
    let env_loaded = env.loaded();
    let config = ConfigManager(env);
    let mut settings = BridgeConfig::load(&config)?;
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }
    if let Some(dir) = cli.log_dir {
        settings.log_dir = Some(dir);
    }
    let guard = init_tracing(&LogConfig::from(&settings))?;
    if env_loaded {
        info!("loaded settings from {}", cli.env_file.display());
    } else {
        debug!("no {} file, using the process environment", cli.env_file.display());
    }

    let renderer: Arc<dyn TemplateRenderer> =
        Arc::new(HandlebarsRenderer::new().strict(settings.strict_templates));
    let registry = builtin_registry(renderer);

    let succeeded = match cli.command {
        Commands::Invoke(args) => invoke(registry, &args)?,
        Commands::Kinds => {
            for kind in registry.kinds() {
                println!("{kind}");
            }
            true
        }
        Commands::Schema(args) => {
            write_schema(&args.out)?;
            println!("Schemas written to {}", args.out.display());
            true
        }
    };

    // flush file logs before a non-zero exit
    drop(guard);
    if !succeeded {
        process::exit(1);
    }
    Ok(())
}

/// Returns `false` when the node reported an error, which goes to stderr.
fn invoke(registry: HandlerRegistry, args: &InvokeArgs) -> anyhow::Result<bool> {
    let raw = read_request(args.file.as_deref())?;
    let request = CString::new(raw).context("request contains a NUL byte")?;

    let vtable = NodeAdapter::new(registry).into_vtable();
    let result = unsafe { (vtable.call)(vtable.handle, request.as_ptr()) };
    let outcome = unsafe { result.into_result() };
    unsafe { (vtable.free)(vtable.handle) };

    match outcome {
        Ok(content) if args.pretty => {
            let value: Value = serde_json::from_str(&content)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(true)
        }
        Ok(content) => {
            println!("{content}");
            Ok(true)
        }
        Err(message) => {
            error!("node evaluation failed");
            eprintln!("{message}");
            Ok(false)
        }
    }
}

fn read_request(file: Option<&Path>) -> anyhow::Result<String> {
    match file {
        Some(path) if path != Path::new("-") => {
            info!("reading request from {}", path.display());
            fs::read_to_string(path).with_context(|| format!("could not read {}", path.display()))
        }
        _ => {
            let mut raw = String::new();
            io::stdin()
                .read_to_string(&mut raw)
                .context("could not read request from stdin")?;
            Ok(raw)
        }
    }
}
