use chartsheet::app;

/// Main entry point for the web application.
///
/// Initializes logging and the on-disk database, then serves the app.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    app::run().await
}
