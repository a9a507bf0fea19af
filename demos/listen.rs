//! Listen on a bucket and answer every webhook.
//!
//! Run with:
//!
//! ```text
//! RELAY_KEY=... RELAY_SECRET=... RELAY_BUCKET=my-bucket cargo run --example listen
//! ```
//!
//! Each forwarded webhook is printed and answered with `201 banana`.

use anyhow::Context;
use webhookrelay_client::protocol::{decode, EventType, ResponseSubmission};
use webhookrelay_client::{handler, Credentials, RelayClient, RelayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    webhookrelay_client::logging::init();

    let credentials = Credentials::from_env()?;
    let buckets: Vec<String> = std::env::var("RELAY_BUCKET")
        .context("RELAY_BUCKET is not set")?
        .split(',')
        .map(|bucket| bucket.trim().to_string())
        .filter(|bucket| !bucket.is_empty())
        .collect();

    let (handler, mut events) = handler::channel();
    let client = RelayClient::builder(credentials)
        .with_buckets(buckets)
        .with_handler(handler)
        .with_config(RelayConfig::from_env())
        .build()?;

    client.connect().await?;
    println!("Connected, waiting for webhooks (Ctrl-C to stop)");

    loop {
        tokio::select! {
            frame = events.recv() => {
                let Some(frame) = frame else { break };
                let event = match decode(&frame) {
                    Ok(event) => event,
                    Err(e) => {
                        eprintln!("skipping frame: {e}");
                        continue;
                    }
                };
                if event.kind != EventType::Webhook {
                    println!("status: {} {}", event.status, event.message);
                    continue;
                }

                println!("{} {}?{} ({} bytes)", event.method, event.bucket_name().unwrap_or("-"), event.query, event.body.len());
                let responder = client.clone();
                tokio::spawn(async move {
                    let response = ResponseSubmission::for_event(&event)
                        .with_status(201)
                        .with_header("Content-Type", "text/plain")
                        .with_body("banana");
                    let outcome = responder.respond(&response).await;
                    println!("response: {outcome:?}");
                });
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.disconnect();
    Ok(())
}
