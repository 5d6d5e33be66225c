use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    fieldmatch_cli::main_entry().await
}
