#[tokio::main(flavor = "current_thread")]
async fn main() -> relaybot::error::Result<()> {
    dotenvy::dotenv().ok();
    let default_filter = match std::env::var("DEBUG") {
        Ok(value) if value == "1" || value.eq_ignore_ascii_case("true") => "relaybot=debug",
        _ => "relaybot=info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    // Both reqwest and the websocket client use rustls; pin one crypto provider.
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        log::debug!("A rustls crypto provider was already installed");
    }

    log::info!("Starting relaybot");

    match relaybot::run().await {
        Ok(()) => {
            log::info!("Bot shut down successfully");
            Ok(())
        }
        Err(e) => {
            log::error!("Bot encountered an error: {}", e);
            Err(e)
        }
    }
}
