#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = recdeck::app::run().await {
        tracing::error!("{:#}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
