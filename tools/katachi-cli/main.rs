use clap::{Parser, ValueEnum};
use katachi::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::Level;

/// CLI-side profile names for clap to parse.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProfileCli {
    Production,
    Mock,
}

impl From<ProfileCli> for BindingProfile {
    fn from(profile: ProfileCli) -> Self {
        match profile {
            ProfileCli::Production => BindingProfile::Production,
            ProfileCli::Mock => BindingProfile::Mock,
        }
    }
}

/// Generates F Prime components from an exported UML model
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the exported model JSON file
    model_path: PathBuf,

    /// Directory the generated files are written to
    #[arg(short, long, default_value = "generated")]
    out: PathBuf,

    /// Generator config JSON file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Binding profile of the emitted side-effect calls
    #[arg(short, long, value_enum)]
    profile: Option<ProfileCli>,

    /// C++ namespace of the emitted code
    #[arg(short, long)]
    namespace: Option<String>,

    /// Report what would be generated without writing files
    #[arg(long)]
    dry_run: bool,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let start = Instant::now();

    let mut config = match &cli.config {
        Some(path) => GeneratorConfig::from_file(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to load config: {}", e))),
        None => GeneratorConfig::default(),
    };
    if let Some(profile) = cli.profile {
        config.binding = profile.into();
    }
    if let Some(namespace) = cli.namespace {
        config.namespace = namespace;
    }
    config
        .validate()
        .unwrap_or_else(|e| exit_with_error(&format!("Invalid settings: {}", e)));

    let json = fs::read_to_string(&cli.model_path).unwrap_or_else(|e| {
        exit_with_error(&format!(
            "Failed to read model file '{}': {}",
            cli.model_path.display(),
            e
        ))
    });
    let definition = ExportedModel::from_json(&json)
        .and_then(|exported| exported.into_definition())
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to convert model: {}", e)));
    let model = Model::build(definition)
        .unwrap_or_else(|e| exit_with_error(&format!("Invalid model: {}", e)));

    let report = Generator::builder(model).with_config(config).build().run();

    for failure in &report.failures {
        eprintln!("Error: {}", failure.chain.join(" -> "));
        eprintln!("  {}", failure.error);
    }

    if cli.dry_run {
        for component in &report.components {
            for file in component.artifacts.files() {
                println!("{} ({} bytes)", file.name, file.text.len());
            }
        }
    } else {
        let written = report.write_all(&cli.out).unwrap_or_else(|e| {
            exit_with_error(&format!(
                "Failed to write to '{}': {}",
                cli.out.display(),
                e
            ))
        });
        for path in &written {
            println!("{}", path.display());
        }
    }

    println!(
        "\n{} components generated, {} failed, {} activities compiled in {:.2?}",
        report.components.len(),
        report.failures.len(),
        report.activities_compiled,
        start.elapsed()
    );

    if !report.is_success() {
        std::process::exit(1);
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
