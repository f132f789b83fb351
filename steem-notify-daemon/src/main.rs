use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    steem_notify_daemon::run().await?;
    Ok(())
}
