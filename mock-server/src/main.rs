use mock_server::{BigThreeMode, MockOptions};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "8010".to_string());
    let options = MockOptions {
        token: std::env::var("MOCK_API_TOKEN").ok().filter(|t| !t.is_empty()),
        big_three: match std::env::var("MOCK_BIG_THREE").as_deref() {
            Ok("full") => BigThreeMode::FullSet,
            _ => BigThreeMode::Dedicated,
        },
    };

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, auth = options.token.is_some(), big_three = ?options.big_three, "mock backend listening");
    mock_server::run_with(listener, options).await
}
