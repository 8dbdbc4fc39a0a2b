use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rover",
    about = "Rover: a read-only, time-travelling view of a permanode graph",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Mount a graph read-only and serve it until unmounted
    Mount(MountArgs),
    /// List a directory of the namespace
    Ls(LsArgs),
    /// Write a file version to stdout
    Cat(CatArgs),
    /// Print the effective filesystem configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct MountArgs {
    pub mountpoint: PathBuf,
    /// JSON graph fixture to serve
    #[arg(long)]
    pub graph: PathBuf,
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub allow_other: bool,
}

#[derive(Args)]
pub struct LsArgs {
    #[arg(default_value = "/")]
    pub path: String,
    #[arg(long)]
    pub graph: PathBuf,
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct CatArgs {
    pub path: String,
    #[arg(long)]
    pub graph: PathBuf,
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mount() {
        let cli =
            Cli::try_parse_from(["rover", "mount", "/mnt/rover", "--graph", "g.json"]).unwrap();
        if let Command::Mount(args) = cli.command {
            assert_eq!(args.mountpoint, PathBuf::from("/mnt/rover"));
            assert_eq!(args.graph, PathBuf::from("g.json"));
            assert!(args.config.is_none());
            assert!(!args.allow_other);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_mount_allow_other() {
        let cli = Cli::try_parse_from([
            "rover",
            "mount",
            "/mnt/rover",
            "--graph",
            "g.json",
            "--config",
            "fs.toml",
            "--allow-other",
        ])
        .unwrap();
        if let Command::Mount(args) = cli.command {
            assert!(args.allow_other);
            assert_eq!(args.config, Some(PathBuf::from("fs.toml")));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn mount_requires_graph() {
        assert!(Cli::try_parse_from(["rover", "mount", "/mnt/rover"]).is_err());
    }

    #[test]
    fn parse_ls_defaults_to_root() {
        let cli = Cli::try_parse_from(["rover", "ls", "--graph", "g.json"]).unwrap();
        if let Command::Ls(args) = cli.command {
            assert_eq!(args.path, "/");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_ls_path() {
        let cli =
            Cli::try_parse_from(["rover", "ls", "--graph", "g.json", "/docs/readme"]).unwrap();
        if let Command::Ls(args) = cli.command {
            assert_eq!(args.path, "/docs/readme");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_cat() {
        let cli = Cli::try_parse_from(["rover", "cat", "--graph", "g.json", "/a/b"]).unwrap();
        assert!(matches!(cli.command, Command::Cat(_)));
    }

    #[test]
    fn parse_config() {
        let cli = Cli::try_parse_from(["rover", "config"]).unwrap();
        assert!(matches!(cli.command, Command::Config(ConfigArgs { config: None })));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["rover", "--verbose", "config"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn parse_json_format() {
        let cli =
            Cli::try_parse_from(["rover", "ls", "--graph", "g.json", "--format", "json"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
