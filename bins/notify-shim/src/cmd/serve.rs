use tokio_util::sync::CancellationToken;

use stream_api_server::AppState;

use super::Runtime;
use crate::config::{Effective, ServeArgs};
use crate::error::ShimError;

pub async fn run(eff: &Effective, args: ServeArgs) -> Result<(), ShimError> {
    tracing::info!("notify-shim starting");

    let rt = Runtime::start(eff).await?;
    let state = AppState::new(
        rt.producer,
        rt.consumer,
        rt.codec,
        rt.generator,
        eff.stream.as_str(),
    )
    .with_read_defaults(eff.read_defaults()?);

    let token = CancellationToken::new();
    let port = args.port.unwrap_or(eff.api_port);
    let api_token = token.clone();
    let mut api_handle =
        tokio::spawn(async move { stream_api_server::run(port, state, api_token).await });

    tracing::info!(port, "server ready");

    tokio::select! {
        joined = &mut api_handle => {
            // Server stopped on its own: bind failure or serve error.
            return match joined {
                Ok(result) => result.map_err(ShimError::Api),
                Err(e) => Err(ShimError::Api(format!("api task: {e}"))),
            };
        }
        signal = tokio::signal::ctrl_c() => signal?,
    }

    tracing::info!("shutting down...");
    token.cancel();
    if let Err(e) = api_handle.await {
        tracing::warn!(error = %e, "api task did not stop cleanly");
    }
    tracing::info!("shutdown complete");
    Ok(())
}
