mod backend;
mod control;
mod firebase;
mod history;
mod host;
mod settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
