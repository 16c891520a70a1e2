//! This module defines the command line arguments projman accepts.

use std::path::PathBuf;
use termcolor::ColorChoice;

use crate::db::cmd::DbCommand;


#[derive(Debug, clap::Parser)]
#[command(about = "GraphQL API for managing clients, projects and users.")]
pub(crate) struct Args {
    #[command(subcommand)]
    pub(crate) cmd: Command,

    /// Whether to use colors in the output.
    #[arg(long, global = true, value_enum, default_value_t = ColorMode::Auto)]
    pub(crate) color: ColorMode,
}

#[derive(Debug, clap::Subcommand)]
pub(crate) enum Command {
    /// Starts the HTTP server.
    Serve {
        /// Keep all data in memory instead of PostgreSQL. Everything is lost
        /// when the process exits. The `[db]` configuration is ignored.
        #[arg(long)]
        in_memory: bool,

        #[command(flatten)]
        shared: Shared,
    },

    /// Database operations.
    Db {
        #[command(subcommand)]
        cmd: DbCommand,

        #[command(flatten)]
        shared: Shared,
    },

    /// Checks config, DB connection and migrations to find problems in the
    /// environment.
    ///
    /// Useful for updates as you can catch many errors early, without needing
    /// to restart the running process. Exits with 0 if everything is Ok, and
    /// with 1 otherwise.
    Check {
        #[command(flatten)]
        shared: Shared,
    },

    /// Outputs a template for the configuration file (which includes
    /// descriptions or all options).
    WriteConfig {
        /// Target file. If not specified, the template is written to stdout.
        target: Option<PathBuf>,
    },

    /// Exports the API as GraphQL schema.
    ExportApiSchema {
        /// Target file. If not specified, the schema is written to stdout.
        target: Option<PathBuf>,
    },
}

#[derive(Debug, clap::Args)]
pub(crate) struct Shared {
    /// Path to the configuration file. If this is not specified, projman will
    /// check `PROJMAN_CONFIG_PATH` and then try opening `config.toml` or
    /// `/etc/projman/config.toml`.
    #[arg(short, long)]
    pub(crate) config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum ColorMode {
    Auto,
    Always,
    Never,
}

impl Args {
    /// Color choice for stdout: `auto` only uses colors if stdout is a
    /// terminal.
    pub(crate) fn stdout_color(&self) -> ColorChoice {
        self.color_choice(std::io::IsTerminal::is_terminal(&std::io::stdout()))
    }

    pub(crate) fn stderr_color(&self) -> ColorChoice {
        self.color_choice(std::io::IsTerminal::is_terminal(&std::io::stderr()))
    }

    fn color_choice(&self, is_terminal: bool) -> ColorChoice {
        match self.color {
            ColorMode::Always => ColorChoice::Always,
            ColorMode::Never => ColorChoice::Never,
            ColorMode::Auto if is_terminal => ColorChoice::Auto,
            ColorMode::Auto => ColorChoice::Never,
        }
    }

    /// Name of the subcommand, used for the `${cmd}` placeholder of the log
    /// file path.
    pub(crate) fn cmd_name(&self) -> &'static str {
        match self.cmd {
            Command::Serve { .. } => "serve",
            Command::Db { .. } => "db",
            Command::Check { .. } => "check",
            Command::WriteConfig { .. } | Command::ExportApiSchema { .. } => "other",
        }
    }
}


#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use termcolor::ColorChoice;

    use super::{Args, ColorMode, Command};

    #[test]
    fn cli_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn serve_in_memory() {
        let args = Args::parse_from(["projman", "serve", "--in-memory", "-c", "x.toml"]);
        match &args.cmd {
            Command::Serve { in_memory, shared } => {
                assert!(*in_memory);
                assert_eq!(shared.config.as_deref(), Some(std::path::Path::new("x.toml")));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(args.cmd_name(), "serve");
        assert_eq!(args.color, ColorMode::Auto);
    }

    #[test]
    fn color_mode() {
        let args = Args::parse_from(["projman", "check", "--color", "never"]);
        assert_eq!(args.stdout_color(), ColorChoice::Never);

        let args = Args::parse_from(["projman", "--color", "always", "write-config"]);
        assert_eq!(args.stderr_color(), ColorChoice::Always);
        assert_eq!(args.cmd_name(), "other");
    }
}
