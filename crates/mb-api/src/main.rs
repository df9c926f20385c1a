#[tokio::main]
async fn main() {
    if let Err(err) = mb_api::run().await {
        tracing::error!(error = %err, "mb-api failed");
        std::process::exit(1);
    }
}
