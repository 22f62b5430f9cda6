//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::ui::OutputMode;

/// Bakery - build machine images from a declarative list of steps.
#[derive(Debug, Parser)]
#[command(name = "bakery")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Show command output as it runs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only show step headlines and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Output mode selected by the global flags.
    pub fn output_mode(&self) -> OutputMode {
        if self.quiet {
            OutputMode::Quiet
        } else if self.verbose {
            OutputMode::Verbose
        } else {
            OutputMode::Normal
        }
    }
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a build file
    Build(BuildArgs),

    /// Check a build file without running it
    Validate(ValidateArgs),

    /// Show the steps a build file would run
    Inspect(InspectArgs),
}

/// Arguments for the `build` command.
#[derive(Debug, Clone, clap::Args)]
pub struct BuildArgs {
    /// Build file to run
    pub file: PathBuf,

    /// Pause before every step and every cleanup
    #[arg(long)]
    pub debug_pause: bool,

    /// Set a variable for `${name}` references (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,
}

/// Arguments for the `validate` command.
#[derive(Debug, Clone, clap::Args)]
pub struct ValidateArgs {
    /// Build file to check
    pub file: PathBuf,

    /// Variables the build will be given (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,
}

/// Arguments for the `inspect` command.
#[derive(Debug, Clone, clap::Args)]
pub struct InspectArgs {
    /// Build file to inspect
    pub file: PathBuf,
}

/// Parse `KEY=VALUE`. The value may itself contain `=`.
pub fn parse_var(input: &str) -> Result<(String, String), String> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", input))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing variable name in '{}'", input));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Collect `--var` pairs; later values win.
pub fn vars_map(vars: &[(String, String)]) -> HashMap<String, String> {
    vars.iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_build_with_vars() {
        let cli = Cli::try_parse_from([
            "bakery",
            "build",
            "bakery.yml",
            "--var",
            "region=us-east-1",
            "--var",
            "tags=a=b",
            "--debug-pause",
        ])
        .unwrap();

        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.file, PathBuf::from("bakery.yml"));
                assert!(args.debug_pause);
                assert_eq!(
                    args.vars,
                    vec![
                        ("region".to_string(), "us-east-1".to_string()),
                        ("tags".to_string(), "a=b".to_string()),
                    ]
                );
            }
            other => panic!("expected build, got {:?}", other),
        }
    }

    #[test]
    fn global_flags_select_output_mode() {
        let cli = Cli::try_parse_from(["bakery", "inspect", "b.yml", "--quiet"]).unwrap();
        assert_eq!(cli.output_mode(), OutputMode::Quiet);

        let cli = Cli::try_parse_from(["bakery", "--verbose", "validate", "b.yml"]).unwrap();
        assert_eq!(cli.output_mode(), OutputMode::Verbose);

        let cli = Cli::try_parse_from(["bakery", "inspect", "b.yml"]).unwrap();
        assert_eq!(cli.output_mode(), OutputMode::Normal);
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        assert!(Cli::try_parse_from(["bakery", "-q", "-v", "inspect", "b.yml"]).is_err());
    }

    #[test]
    fn bad_var_is_rejected() {
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
        assert_eq!(parse_var("k=").unwrap(), ("k".to_string(), String::new()));
    }

    #[test]
    fn later_vars_win() {
        let vars = vec![
            ("a".to_string(), "1".to_string()),
            ("a".to_string(), "2".to_string()),
        ];
        assert_eq!(vars_map(&vars)["a"], "2");
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["bakery"]).is_err());
    }
}
