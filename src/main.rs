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

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;

use bstrap::{
    cli::{Cli, Commands},
    config::Config,
    logging::init_logging,
    plan::PlanBuilder,
    remote::{Remote, ScriptInvocation},
    target::RemoteTarget,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(&cli.config).await?;

    let private_key = tokio::fs::read_to_string(&cli.identity)
        .await
        .with_context(|| format!("Failed to read private key at {:?}", cli.identity))?;
    let target = RemoteTarget::parse(&cli.host, cli.user.as_deref(), private_key)?;

    let mut remote = Remote::new(target, config.debug_connection_dir.as_deref())?;

    match cli.command {
        Commands::Exec { command } => {
            let command = command.join(" ");
            let result = remote.execute(&command, None).await?;
            print!("{}", result.stdout);
            eprint!("{}", result.stderr);
        }

        Commands::Upload {
            source,
            destination,
        } => {
            if source.is_dir() {
                remote.upload_tree(&source, &destination).await?;
            } else {
                remote.upload_file(&source, &destination).await?;
            }
            remote.close().await;
        }

        Commands::Run {
            script,
            working_dir,
            inline,
        } => {
            let body = tokio::fs::read_to_string(&script)
                .await
                .with_context(|| format!("Failed to read script at {script:?}"))?;
            let name = script
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "script".to_string());

            let staging_dir = config.staging_dir.trim_end_matches('/').to_string();
            let working_dir =
                working_dir.unwrap_or_else(|| format!("{staging_dir}/{}", uuid::Uuid::new_v4()));

            let mut invocation = ScriptInvocation::new(name, body, working_dir.clone());
            if inline {
                invocation = invocation.inline();
            }

            let mut runner = PlanBuilder::new(remote)
                .mkdir(staging_dir)
                .mkdir(working_dir)
                .run_script(invocation)
                .build();

            // One step per tick; the runner holds a thread only while a
            // single step is executing.
            let interval = Duration::from_millis(config.poll_interval_ms);
            runner.start()?;
            while !runner.done() {
                let done = runner.step().await?;
                if !done {
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    Ok(())
}
