#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tunegraph_server::serve().await
}
