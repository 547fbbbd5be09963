use std::{future::Future, io, net::SocketAddr};

use anyhow::Result;
use tokio::{
    io::{AsyncBufRead, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream, tcp::OwnedWriteHalf},
    select,
    sync::mpsc,
};
use tracing::{debug, info, warn};

use crate::{
    hub::{Hub, HubHandle},
    message::{ClientEvent, ServerEvent, read_message, write_message},
    registry::ConnectionId,
    router::ChatPolicy,
};

pub struct ChatServer {
    listener: TcpListener,
    hub: Hub,
    handle: HubHandle,
}

impl ChatServer {
    pub fn new(listener: TcpListener) -> Self {
        Self::with_policy(listener, ChatPolicy::default())
    }

    pub fn with_policy(listener: TcpListener, policy: ChatPolicy) -> Self {
        let (hub, handle) = Hub::new(policy);
        Self {
            listener,
            hub,
            handle,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle to the dispatch task, e.g. to wait for connections to register.
    pub fn handle(&self) -> HubHandle {
        self.handle.clone()
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let ChatServer {
            listener,
            hub,
            handle,
        } = self;
        let hub_task = tokio::spawn(hub.run());
        let mut next_id = 0;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("chat server shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result, &handle, &mut next_id);
                }
            }
        }

        handle.shutdown();
        hub_task.await?;
        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

fn handle_accept_result(
    result: io::Result<(TcpStream, SocketAddr)>,
    hub: &HubHandle,
    next_id: &mut u64,
) {
    match result {
        Ok((stream, peer)) => {
            *next_id += 1;
            spawn_connection(stream, peer, ConnectionId(*next_id), hub);
        }
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

/// Registers the connection before its reader starts, so the hub always sees
/// `accept` ahead of any event the connection sends.
fn spawn_connection(stream: TcpStream, peer: SocketAddr, id: ConnectionId, hub: &HubHandle) {
    let (outbox, outbound) = mpsc::unbounded_channel();
    hub.accept(id, outbox);
    debug!(connection = %id, %peer, "connection registered");

    let hub = hub.clone();
    tokio::spawn(async move {
        if let Err(err) = handle_connection(stream, id, outbound, &hub).await {
            warn!(connection = %id, %peer, error = ?err, "connection closed with error");
        }
    });
}

async fn handle_connection(
    stream: TcpStream,
    id: ConnectionId,
    outbound: mpsc::UnboundedReceiver<ServerEvent>,
    hub: &HubHandle,
) -> Result<()> {
    let (reader, writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut writer_task = tokio::spawn(forward_outbound(writer, outbound, id));

    let result = select! {
        result = read_client_events(&mut reader, id, hub) => result,
        _ = &mut writer_task => Ok(()),
    };

    writer_task.abort();
    hub.disconnect(id);
    result
}

async fn read_client_events<R>(reader: &mut R, id: ConnectionId, hub: &HubHandle) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        match read_message::<_, ClientEvent>(reader).await {
            Ok(Some(event)) => hub.event(id, event),
            Ok(None) => return Ok(()),
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                warn!(connection = %id, error = %err, "skipping malformed event");
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Drains the connection's outbox onto the socket until the outbox closes or
/// a write fails.
async fn forward_outbound(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<ServerEvent>,
    id: ConnectionId,
) {
    while let Some(event) = outbound.recv().await {
        if let Err(err) = write_message(&mut writer, &event).await {
            debug!(connection = %id, ?err, "failed to deliver event to client");
            return;
        }
    }

    if let Err(err) = writer.shutdown().await {
        debug!(connection = %id, ?err, "failed to shut down writer");
    }
}
