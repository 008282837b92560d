use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    filemap_cli::main_entry().await
}
