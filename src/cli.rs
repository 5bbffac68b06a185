// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "bstrap",
    version,
    about = "Staged remote provisioning over SSH",
    long_about = "bstrap drives multi-step provisioning runs against a freshly created remote host.\nIt stages files over SFTP, executes wrapped scripts with persisted logs for post-mortem\ninspection, and advances long bootstraps one step at a time so nothing blocks for the\nwhole run.",
    after_help = "EXAMPLES:\n  Run a command:          bstrap -H root@203.0.113.9 -i ./key exec uname -a\n  Upload a payload tree:  bstrap -H root@203.0.113.9 -i ./key upload ./kitchen /srv/stage\n  Stage and run a script: bstrap -H root@203.0.113.9 -i ./key run ./bootstrap.sh"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'H',
        long,
        help = "Target host in [user@]hostname[:port] format"
    )]
    pub host: String,

    #[arg(
        short = 'u',
        long,
        help = "Default username when --host does not carry one"
    )]
    pub user: Option<String>,

    #[arg(
        short = 'i',
        long,
        help = "SSH private key file path (read into memory; never written back out unless the\ndebug escape hatch is configured)"
    )]
    pub identity: PathBuf,

    #[arg(
        long,
        default_value = "~/.config/bstrap/config.yaml",
        help = "Configuration file path [default: ~/.config/bstrap/config.yaml]"
    )]
    pub config: PathBuf,

    #[arg(
        short = 'v',
        long,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v info, -vv debug, -vvv trace)"
    )]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single command on the target host
    Exec {
        #[arg(
            trailing_var_arg = true,
            allow_hyphen_values = true,
            required = true,
            help = "Command and arguments to execute"
        )]
        command: Vec<String>,
    },

    /// Upload a file or directory tree to the target host
    Upload {
        #[arg(help = "Local file or directory")]
        source: PathBuf,

        #[arg(help = "Remote destination path")]
        destination: String,
    },

    /// Stage a local script on the target and execute it step by step
    Run {
        #[arg(help = "Local script file to stage and execute")]
        script: PathBuf,

        #[arg(
            long,
            help = "Remote working directory (defaults to a fresh directory under the configured staging dir)"
        )]
        working_dir: Option<String>,

        #[arg(
            long,
            help = "Execute inline without persisting the script or its log on the host"
        )]
        inline: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_command_parsing() {
        let cli = Cli::parse_from([
            "bstrap", "-H", "root@203.0.113.9", "-i", "/tmp/key", "exec", "uname", "-a",
        ]);

        assert_eq!(cli.host, "root@203.0.113.9");
        match cli.command {
            Commands::Exec { command } => assert_eq!(command, vec!["uname", "-a"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_upload_command_parsing() {
        let cli = Cli::parse_from([
            "bstrap",
            "-H",
            "203.0.113.9",
            "-u",
            "deploy",
            "-i",
            "/tmp/key",
            "upload",
            "./kitchen",
            "/srv/stage",
        ]);

        match cli.command {
            Commands::Upload {
                source,
                destination,
            } => {
                assert_eq!(source, PathBuf::from("./kitchen"));
                assert_eq!(destination, "/srv/stage");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_run_command_parsing() {
        let cli = Cli::parse_from([
            "bstrap",
            "-H",
            "203.0.113.9",
            "-i",
            "/tmp/key",
            "run",
            "./bootstrap.sh",
            "--working-dir",
            "/srv/stage/run1",
        ]);

        match cli.command {
            Commands::Run {
                script,
                working_dir,
                inline,
            } => {
                assert_eq!(script, PathBuf::from("./bootstrap.sh"));
                assert_eq!(working_dir.as_deref(), Some("/srv/stage/run1"));
                assert!(!inline);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
