use pressroom::{Config, LogFormat, Server, store};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), pressroom::Error> {
    let config = Config::load()?;
    init_tracing(&config);

    let db = store::connect(&config).await?;
    Server::bind(config.bind).serve(pressroom::app(db)).await
}

/// `RUST_LOG` wins over the configured level when it is set.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.init(),
    }
}
