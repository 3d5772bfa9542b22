use anyhow::{Context, bail};
use log::{debug, error, info, trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::select;
use tokio::sync::broadcast::Receiver;
use watchdog_common::broker::BrokerConfig;
use watchdog_shared::envelope::{Envelope, LENGTH_PREFIX_SIZE, payload_len};

use crate::operator::CommandHandler;
use crate::{AppEvent, app_shutdown_handler};

/// Keeps a connection to the broker open and serves its requests until shutdown.
///
/// A lost or refused connection is retried after the configured delay.
pub async fn broker_link(config: BrokerConfig, handler: CommandHandler, app_event_rx: Receiver<AppEvent>) {
    let mut app_shutdown_handler = Box::pin(app_shutdown_handler(app_event_rx));

    loop {
        select! {
            result = connect_and_serve(&config, &handler) => {
                match result {
                    Ok(()) => info!("Broker closed the connection. host: {}", config.host),
                    Err(e) => warn!("Broker link failed. host: {}, error: {:#}", config.host, e),
                }
            }
            _ = &mut app_shutdown_handler => {
                info!("broker link shutdown requested, stopping");
                break
            }
        }

        select! {
            _ = tokio::time::sleep(config.reconnect_delay()) => {
                debug!("Reconnecting to broker. host: {}", config.host);
            }
            _ = &mut app_shutdown_handler => {
                info!("broker link shutdown requested, stopping");
                break
            }
        }
    }
}

async fn connect_and_serve(config: &BrokerConfig, handler: &CommandHandler) -> anyhow::Result<()> {
    let stream = TcpStream::connect(&config.host)
        .await
        .with_context(|| format!("unable to connect to {}", config.host))?;
    stream.set_nodelay(true)?;
    info!("Connected to broker. host: {}, queue: {}", config.host, config.queue);

    serve_stream(stream, config, handler).await
}

/// Announces the queue, then answers requests one at a time until the peer disconnects.
pub async fn serve_stream<S>(mut stream: S, config: &BrokerConfig, handler: &CommandHandler) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let hello = Envelope::Hello {
        queue: config.queue.clone(),
        username: config.username.clone(),
        password: config.password.clone(),
    };
    stream
        .write_all(&hello.encode_frame()?)
        .await?;

    while let Some(envelope) = read_envelope(&mut stream).await? {
        match envelope {
            Envelope::Request {
                correlation_id,
                body,
            } => {
                let response = handler.handle(&body).await;
                if correlation_id == 0 {
                    trace!("Request without correlation id, not replying");
                    continue;
                }
                let reply = Envelope::Reply {
                    correlation_id,
                    body: response,
                };
                stream
                    .write_all(&reply.encode_frame()?)
                    .await?;
            }
            other => {
                error!("Unexpected envelope from broker: {:?}", other);
            }
        }
    }

    Ok(())
}

/// `None` on a clean end of stream between envelopes.
async fn read_envelope<S>(stream: &mut S) -> anyhow::Result<Option<Envelope>>
where
    S: AsyncRead + Unpin,
{
    let mut prefix = [0_u8; LENGTH_PREFIX_SIZE];
    match stream.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let size = payload_len(prefix)?;
    if size == 0 {
        bail!("zero length envelope");
    }
    let mut payload = vec![0_u8; size];
    stream
        .read_exact(&mut payload)
        .await?;

    Ok(Some(Envelope::decode(&payload)?))
}
