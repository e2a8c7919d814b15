pub mod gateway;
pub mod materialize;

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::ServerError;

/// Ждать сигнал остановки и отменить `token`.
///
/// Токен отменяется и при ошибке регистрации сигнала: вызывающий
/// всё равно проходит штатный shutdown, ошибка возвращается после.
async fn cancel_on<S>(signal: S, token: &CancellationToken) -> Result<(), ServerError>
where
    S: Future<Output = std::io::Result<()>>,
{
    let res = signal.await;
    match &res {
        Ok(()) => tracing::info!("shutting down..."),
        Err(e) => tracing::error!(error = %e, "signal handler failed, shutting down"),
    }
    token.cancel();
    res.map_err(ServerError::Signal)
}
