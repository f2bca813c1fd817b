// Copyright 2021 Damir Jelić
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

//! Generate a new, extractable, VAPID key pair and print it as JSON.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use web_push_server::{RustCryptoProvider, VERSION, vapid::VapidKeys};

#[derive(Parser)]
#[command(name = "generate-vapid-keys")]
#[command(version = VERSION)]
#[command(about = "Generate a VAPID key pair for a Web Push application server")]
struct Cli {
    /// Write the exported key pair to this file instead of stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let keys = VapidKeys::generate(&RustCryptoProvider::new(), true);
    let exported = keys.export().context("Failed to export the VAPID key pair")?;
    let json = serde_json::to_string_pretty(&exported)?;

    match cli.output {
        Some(path) => fs::write(&path, format!("{json}\n"))
            .with_context(|| format!("Failed to write the key pair to {}", path.display()))?,
        None => println!("{json}"),
    }

    eprintln!("your application server key is: {}", keys.application_server_key());

    Ok(())
}
