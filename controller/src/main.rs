mod device;
mod gateway;
mod host;
mod senders;
mod store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
