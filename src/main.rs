#[tokio::main]
async fn main() -> anyhow::Result<()> {
    apigate::run().await
}
