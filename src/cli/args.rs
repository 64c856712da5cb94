//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand, ValueEnum};
use std::{fmt, net::IpAddr, path::PathBuf};

/// sitepipe asset pipeline CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Print debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Source directory path (relative to project root)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub src: Option<PathBuf>,

    /// Output directory path (relative to project root)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub dist: Option<PathBuf>,

    /// Config file path (default: sitepipe.toml)
    #[arg(short = 'C', long, default_value = "sitepipe.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a pipeline task
    #[command(visible_alias = "r")]
    Run {
        /// Task to run
        #[arg(value_enum, default_value_t = Task::Default)]
        task: Task,

        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Named pipeline tasks.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Compose templated pages
    Html,
    /// Compile, prefix and minify stylesheets
    Css,
    /// Resolve includes and minify scripts
    Js,
    /// Optimize images
    Images,
    /// Copy fonts
    Fonts,
    /// Remove the output directory
    Clean,
    /// Clean, then run every content stage
    Build,
    /// Build, then serve with live reload until Ctrl+C
    Watch,
    /// Same as watch
    Default,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_default();
        f.write_str(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sitepipe").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_run_task() {
        let cli = parse(&["run", "css"]);
        let Commands::Run { task, port, .. } = cli.command;
        assert_eq!(task, Task::Css);
        assert_eq!(port, None);
    }

    #[test]
    fn test_default_task() {
        let cli = parse(&["run"]);
        let Commands::Run { task, .. } = cli.command;
        assert_eq!(task, Task::Default);
    }

    #[test]
    fn test_global_flags_and_overrides() {
        let cli = parse(&["--src", "site", "-d", "public", "run", "watch", "-p", "8080", "-v"]);
        assert!(cli.verbose);
        assert_eq!(cli.src, Some(PathBuf::from("site")));
        assert_eq!(cli.dist, Some(PathBuf::from("public")));
        let Commands::Run { task, port, .. } = cli.command;
        assert_eq!(task, Task::Watch);
        assert_eq!(port, Some(8080));
    }

    #[test]
    fn test_unknown_task_rejected() {
        let args = ["sitepipe", "run", "deploy"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_task_display() {
        assert_eq!(Task::Images.to_string(), "images");
        assert_eq!(Task::Default.to_string(), "default");
    }
}
