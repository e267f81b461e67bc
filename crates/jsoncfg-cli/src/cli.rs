//! jsoncfg CLI - Command-line interface for jsoncfg configuration files
//!
//! Usage:
//!   jsoncfg check config.json
//!   jsoncfg get config.json database.host
//!   jsoncfg dump config.json --raw

use clap::{Parser, Subcommand};
use colored::Colorize;
use jsoncfg_core::{ExpanderRegistry, Loader, SearchPathResolver, Value};
use std::path::PathBuf;
use std::process::ExitCode;

/// jsoncfg - JSON configuration with environment and include expressions
#[derive(Parser)]
#[command(name = "jsoncfg")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Extra directory to search for included files (repeatable)
    #[arg(short = 'I', long = "include-dir", global = true)]
    include_dirs: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and expand configuration files, reporting any errors
    Check {
        /// Configuration file(s) to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Get a specific value from the configuration
    Get {
        /// Configuration file
        file: PathBuf,

        /// Path to the value (e.g., database.host or servers[0])
        path: String,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Default value if key not found
        #[arg(short, long)]
        default: Option<String>,
    },

    /// Print the configuration as JSON
    Dump {
        /// Configuration file
        file: PathBuf,

        /// Leave expressions unexpanded
        #[arg(long)]
        raw: bool,

        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Run the CLI with the given arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let loader = build_loader(&cli.include_dirs);

    match cli.command {
        Commands::Check { files } => cmd_check(&loader, files),
        Commands::Get {
            file,
            path,
            format,
            default,
        } => cmd_get(&loader, file, &path, &format, default),
        Commands::Dump { file, raw, output } => {
            let loader = if raw {
                loader.with_expanders(ExpanderRegistry::new())
            } else {
                loader
            };
            cmd_dump(&loader, file, output)
        }
    }
}

fn build_loader(include_dirs: &[PathBuf]) -> Loader {
    let resolver = include_dirs
        .iter()
        .fold(SearchPathResolver::new(), |r, dir| r.with_dir(dir));
    Loader::new().with_include_resolver(resolver)
}

fn load_config(loader: &Loader, file: &PathBuf) -> Result<Value, String> {
    loader
        .load(file)
        .map_err(|e| format!("Failed to load {}: {}", file.display(), e))
}

fn cmd_check(loader: &Loader, files: Vec<PathBuf>) -> ExitCode {
    let mut load_failed = false;
    let mut check_failed = false;

    for file in files {
        let value = match loader.load(&file) {
            Ok(value) => value,
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                load_failed = true;
                continue;
            }
        };
        match loader.check_types(&value) {
            Ok(()) => println!("{} {}: valid", "✓".green(), file.display()),
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                check_failed = true;
            }
        }
    }

    if load_failed {
        ExitCode::from(2)
    } else if check_failed {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

fn cmd_get(
    loader: &Loader,
    file: PathBuf,
    path: &str,
    format: &str,
    default: Option<String>,
) -> ExitCode {
    let config = match load_config(loader, &file) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    match config.get_path(path) {
        Ok(value) => {
            match (format, value) {
                ("json", _) | (_, Value::Array(_)) | (_, Value::Object(_)) => {
                    match serde_json::to_string_pretty(value) {
                        Ok(json) => println!("{}", json),
                        Err(e) => {
                            eprintln!("{}: {}", "Error".red(), e);
                            return ExitCode::from(1);
                        }
                    }
                }
                // Text format - strings unquoted
                (_, Value::String(s)) => println!("{}", s),
                (_, other) => println!("{}", other),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            if let Some(default_val) = default {
                println!("{}", default_val);
                ExitCode::SUCCESS
            } else {
                eprintln!("{}: {}", "Error".red(), e);
                ExitCode::from(1)
            }
        }
    }
}

fn cmd_dump(loader: &Loader, file: PathBuf, output: Option<PathBuf>) -> ExitCode {
    let config = match load_config(loader, &file) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    let content = match serde_json::to_string_pretty(&config) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            return ExitCode::from(1);
        }
    };

    if let Some(output_path) = output {
        if let Err(e) = std::fs::write(&output_path, format!("{}\n", content)) {
            eprintln!("{}: {}", "Error writing file".red(), e);
            return ExitCode::from(2);
        }
        eprintln!("{} Wrote to {}", "✓".green(), output_path.display());
    } else {
        println!("{}", content);
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_include_dirs() {
        let cli = Cli::try_parse_from([
            "jsoncfg", "get", "app.json", "db.host", "-I", "/etc/a", "--include-dir", "/etc/b",
        ])
        .unwrap();

        assert_eq!(
            cli.include_dirs,
            vec![PathBuf::from("/etc/a"), PathBuf::from("/etc/b")]
        );
        match cli.command {
            Commands::Get { path, format, .. } => {
                assert_eq!(path, "db.host");
                assert_eq!(format, "text");
            }
            _ => panic!("expected get"),
        }
    }

    #[test]
    fn test_build_loader_uses_include_dirs() {
        let root = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        std::fs::write(shared.path().join("common.json"), r#"{"level": "info"}"#).unwrap();
        let main = root.path().join("main.json");
        std::fs::write(&main, r#"{"log": ["_fileobj", "common.json"]}"#).unwrap();

        let loader = build_loader(&[shared.path().to_path_buf()]);
        let value = loader.load(&main).unwrap();
        assert_eq!(
            value.get_path("log.level").unwrap().as_str(),
            Some("info")
        );
    }

    #[test]
    fn test_check_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        let bad = dir.path().join("bad.json");
        std::fs::write(&good, r#"{"a": 1}"#).unwrap();
        std::fs::write(&bad, r#"{"a": "#).unwrap();

        let loader = build_loader(&[]);
        let code = |files| format!("{:?}", cmd_check(&loader, files));
        assert_eq!(code(vec![good.clone()]), format!("{:?}", ExitCode::SUCCESS));
        assert_eq!(code(vec![good.clone(), bad]), format!("{:?}", ExitCode::from(2)));
        assert_eq!(
            code(vec![dir.path().join("missing.json"), good]),
            format!("{:?}", ExitCode::from(2))
        );
    }
}
