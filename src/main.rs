use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    agro_assistant::run().await
}
