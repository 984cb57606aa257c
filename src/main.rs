/*
Copyright 2025 [rhythmcache]

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

         http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/


use std::time::Duration;

use clap::Parser;
use colored::*;
use github_release_get::{
    RunArgs,
    config::{DEFAULT_API_URL, parse_timeout, token_from_env},
    run,
};

#[derive(Parser)]
#[command(name = "github-release-get")]
#[command(about = "Download the first asset matching a pattern from the latest GitHub release", long_about = None)]
struct Cli {
    /// repository owner (user or org name)
    #[arg(long, default_value = "")]
    owner: String,

    /// repository name
    #[arg(long, default_value = "")]
    repo: String,

    /// pattern to match release asset name
    #[arg(long, default_value = "")]
    pattern: String,

    /// overall deadline, e.g. 30s, 2m or "1h 30m" (no fractions); 0 disables it
    #[arg(long, default_value = "1m", value_parser = parse_timeout)]
    timeout: Duration,

    #[arg(long, hide = true, default_value = DEFAULT_API_URL)]
    api_url: String,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let mut args = RunArgs::new(cli.owner, cli.repo, cli.pattern).with_token(token_from_env());
    args.timeout = cli.timeout;
    args.api_url = cli.api_url;

    if let Err(err) = run(&args).await {
        eprintln!("{} {:#}", "error:".red().bold(), err);
        std::process::exit(1);
    }
}
