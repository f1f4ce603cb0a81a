//! Incident relay HTTP server.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    incident_relay::server::run().await
}
