// crates/vnsi-server/src/client.rs

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};
use vnsi_core::{
    outbound_channel, Backend, ClientId, Connection, ConnectionHandle, EngineConfig, OutboundRx,
    Request, SharedContext,
};
use vnsi_protocol::decode_request_header;
use vnsi_protocol::wire_types::REQUEST_HEADER_LEN;

use crate::error::{ServerError, ServerResult};
use crate::types::{write_registry, ClientRegistry};

/// Everything a client task needs besides its socket.
pub(crate) struct ClientContext {
    pub engine: EngineConfig,
    pub ctx: Arc<SharedContext>,
    pub backend: Backend,
    pub clients: ClientRegistry,
}

/// Run the I/O of a single connection until the client goes away or the
/// engine closes the connection.
pub(crate) async fn run_client(
    client_id: ClientId,
    stream: TcpStream,
    peer_addr: SocketAddr,
    shared: ClientContext,
) -> ServerResult<()> {
    let (read_stream, write_stream) = stream.into_split();
    let (out_tx, out_rx) = outbound_channel();

    let conn = Connection::spawn(
        client_id,
        peer_addr.to_string(),
        shared.engine,
        shared.ctx,
        shared.backend,
        out_tx,
    );
    let handle = conn.handle();
    write_registry(&shared.clients).insert(client_id, handle.clone());

    let mut writer = tokio::spawn(run_writer(client_id, write_stream, out_rx, handle.clone()));

    // The engine owns the outbound sender, so the writer finishing means
    // the connection was closed from the server side.
    let (result, writer_done) = tokio::select! {
        res = run_reader(read_stream, &handle) => (res, false),
        joined = &mut writer => {
            log_writer_exit(client_id, joined);
            (Ok(()), true)
        }
    };

    match &result {
        Ok(()) => {
            handle.shutdown();
        }
        Err(err) => handle.report_transport_error(err.to_string()),
    }

    write_registry(&shared.clients).remove(&client_id);

    conn.join().await;
    if !writer_done {
        log_writer_exit(client_id, writer.await);
    }

    result
}

fn log_writer_exit(client_id: ClientId, joined: Result<(), tokio::task::JoinError>) {
    if let Err(err) = joined {
        error!(client = client_id.0, error = %err, "writer task failed");
    }
}

/// Read requests and hand them to the dispatch queue. `Ok` on orderly EOF
/// or when the connection closed from the engine side.
async fn run_reader(mut read_stream: OwnedReadHalf, handle: &ConnectionHandle) -> ServerResult<()> {
    while let Some(request) = read_request(&mut read_stream).await? {
        debug!(
            client = handle.id().0,
            request_id = request.request_id,
            opcode = request.opcode,
            len = request.payload.len(),
            "request received"
        );
        if !handle.deliver_request(request) {
            break;
        }
    }
    Ok(())
}

/// One request frame, or `None` if the peer closed between frames.
async fn read_request(read_stream: &mut OwnedReadHalf) -> ServerResult<Option<Request>> {
    let mut header = [0u8; REQUEST_HEADER_LEN];
    match read_stream.read_exact(&mut header).await {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(ServerError::Io(err)),
    }

    let header = decode_request_header(&header)?;

    let mut payload = vec![0u8; header.payload_len];
    read_stream.read_exact(&mut payload).await?;

    Ok(Some(Request {
        opcode: header.opcode,
        request_id: header.request_id,
        payload: Bytes::from(payload),
    }))
}

async fn run_writer(
    client_id: ClientId,
    mut write_stream: OwnedWriteHalf,
    mut out_rx: OutboundRx,
    handle: ConnectionHandle,
) {
    while let Some(packet) = out_rx.recv().await {
        let frame = match packet.encode() {
            Ok(frame) => frame,
            Err(err) => {
                warn!(
                    client = client_id.0,
                    channel = ?packet.channel(),
                    id = packet.id(),
                    error = %err,
                    "dropping unencodable packet"
                );
                continue;
            }
        };

        if let Err(err) = write_stream.write_all(&frame).await {
            error!(client = client_id.0, error = %err, "write failed");
            handle.report_transport_error(err.to_string());
            break;
        }
    }

    if let Err(err) = write_stream.shutdown().await {
        debug!(client = client_id.0, error = %err, "socket shutdown failed");
    }
    info!(client = client_id.0, "writer finished");
}
