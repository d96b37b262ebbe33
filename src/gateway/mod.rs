//! WebSocket front end for `MarketService`.
//!
//! One JSON request per text frame. `checkMarket` turns the connection into
//! a snapshot stream until the socket closes; trades can still be sent on a
//! streaming connection.

pub mod protocol;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tracing::{debug, info, warn};

use crate::service::{MarketService, MarketStream};

pub use protocol::{ClientRequest, ServerMessage};

type WsWrite = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsRead = SplitStream<WebSocketStream<TcpStream>>;

/// Accept connections forever; each one gets its own task.
pub async fn serve(listener: TcpListener, service: Arc<MarketService>) -> Result<()> {
    info!(addr = ?listener.local_addr().ok(), "gateway listening");

    loop {
        let (stream, peer) = listener.accept().await.context("accepting connection")?;
        let service = service.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(service, stream, peer).await {
                debug!(%peer, "connection ended with error: {e:#}");
            }
        });
    }
}

async fn handle_connection(service: Arc<MarketService>, stream: TcpStream, peer: SocketAddr) -> Result<()> {
    let ws = accept_async(stream).await.context("websocket handshake")?;
    let (mut write, mut read) = ws.split();
    debug!(%peer, "client connected");

    while let Some(frame) = read.next().await {
        let text = match frame.context("reading frame")? {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };

        let request = match ClientRequest::parse(text.as_str()) {
            Ok(r) => r,
            Err(e) => {
                send(&mut write, &ServerMessage::invalid_request(&e)).await?;
                continue;
            }
        };

        if let ClientRequest::CheckMarket { team_id, user_id } = &request {
            match service.check_market(team_id, user_id).await {
                Ok(market) => return stream_market(&service, market, &mut write, &mut read).await,
                Err(e) => send(&mut write, &ServerMessage::from(&e)).await?,
            }
            continue;
        }

        let reply = unary(&service, request).await;
        send(&mut write, &reply).await?;
    }

    debug!(%peer, "client disconnected");
    Ok(())
}

/// Pump snapshots until the client goes away. Dropping `market` on return
/// unsubscribes.
async fn stream_market(
    service: &MarketService,
    mut market: MarketStream,
    write: &mut WsWrite,
    read: &mut WsRead,
) -> Result<()> {
    let team = market.team_id().to_string();
    loop {
        tokio::select! {
            snapshot = market.next() => {
                let Some(snapshot) = snapshot else {
                    // Session torn down (shutdown).
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                };
                send(write, &ServerMessage::Snapshot(snapshot)).await?;
            }
            frame = read.next() => {
                let text = match frame {
                    None | Some(Ok(Message::Close(_))) => return Ok(()),
                    Some(Err(e)) => {
                        debug!(%team, "stream read failed: {e}");
                        return Ok(());
                    }
                    Some(Ok(Message::Text(t))) => t,
                    Some(Ok(_)) => continue,
                };
                let reply = match ClientRequest::parse(text.as_str()) {
                    Ok(r) => unary(service, r).await,
                    Err(e) => ServerMessage::invalid_request(&e),
                };
                send(write, &reply).await?;
            }
        }
    }
}

async fn unary(service: &MarketService, request: ClientRequest) -> ServerMessage {
    let res = match request {
        ClientRequest::BuyAsset(req) => service.buy_asset(&req).await,
        ClientRequest::SellAsset(req) => service.sell_asset(&req).await,
        ClientRequest::CheckMarket { .. } => {
            return ServerMessage::error("invalid_argument", "connection is already streaming");
        }
    };
    match res {
        Ok(result) => ServerMessage::TradeResult(result),
        Err(e) => {
            if !e.is_client_fault() {
                warn!("trade failed: {e}");
            }
            ServerMessage::from(&e)
        }
    }
}

async fn send(write: &mut WsWrite, msg: &ServerMessage) -> Result<()> {
    let text = msg.to_text().context("encoding reply")?;
    write.send(Message::text(text)).await.context("sending frame")
}
