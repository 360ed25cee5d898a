use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use serde_json::Value;
use tracing::Level;

use classroom_sync::gateway::Action;
use classroom_sync::store::UserStore;

const USAGE: &str = "usage: classroom <status | set-gateway <url> | call <action> [json]>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    #[cfg(debug_assertions)]
    let level = Some(Level::DEBUG);
    #[cfg(not(debug_assertions))]
    let level = Some(Level::INFO);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).ok_or_else(|| anyhow!(USAGE))?;

    let classroom = classroom_sync::create(level)
        .await
        .context("unable to start classroom client")?;

    match command {
        "status" => {
            println!("gateway: {}", classroom.remote.url().unwrap_or_else(|| "-".to_string()));
            println!("configured: {}", classroom.remote.is_configured());
            println!("users: {}", classroom.store.list_users().await?.len());
        }
        "set-gateway" => {
            let url = args.get(1).ok_or_else(|| anyhow!(USAGE))?;
            classroom.remote.save(url).await?;
            if !classroom.remote.is_configured() {
                bail!("saved, but '{}' isn't a {} URL", url.trim(), classroom.config.gateway_host);
            }
            println!("gateway updated");
        }
        "call" => {
            let action = args.get(1).ok_or_else(|| anyhow!(USAGE))?;
            let action = Action::from_str(action).map_err(|e| anyhow!(e))?;
            let payload: Value = match args.get(2) {
                Some(raw) => serde_json::from_str(raw).context("payload must be a JSON object")?,
                None => Value::Object(Default::default()),
            };
            let response = classroom.gateway.call(action, payload).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.success {
                std::process::exit(1);
            }
        }
        other => bail!("unknown command '{}'\n{}", other, USAGE),
    }

    Ok(())
}
