//! net/pipe.rs
//!
//! Full-duplex byte relay between two established connections.
//! One reader task per connection feeds a channel; a single loop drains both
//! channels and writes every chunk to the opposite connection. The first side
//! to close or fail ends the whole pipe.

use std::io;

use bytes::Bytes;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
    select,
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::trace;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub const READ_CHUNK_SIZE: usize = 1024;

// -----------------------------------------------------------------------------
// ----- PipeOutcome -----------------------------------------------------------

/// Both connections handed back, plus whatever error ended the relay.
/// An error slot is `None` when that side closed cleanly or was not the cause.
#[derive(Debug)]
pub struct PipeOutcome<A, B> {
    pub conn_a: A,
    pub conn_b: B,
    pub err_a: Option<io::Error>,
    pub err_b: Option<io::Error>,
}

// -----------------------------------------------------------------------------
// ----- relay -----------------------------------------------------------------

pub async fn relay<A, B>(conn_a: A, conn_b: B) -> PipeOutcome<A, B>
where
    A: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    B: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (read_a, mut write_a) = tokio::io::split(conn_a);
    let (read_b, mut write_b) = tokio::io::split(conn_b);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (mut rx_a, reader_a) = spawn_reader(read_a, shutdown_rx.clone());
    let (mut rx_b, reader_b) = spawn_reader(read_b, shutdown_rx);

    let mut err_a = None;
    let mut err_b = None;

    loop {
        select! {
            item = rx_a.recv() => match item {
                None => {
                    trace!("side a closed");
                    break;
                }
                Some(Err(e)) => {
                    err_a = Some(e);
                    break;
                }
                Some(Ok(data)) => {
                    if let Err(e) = forward(&mut write_b, &data).await {
                        err_b = Some(e);
                        break;
                    }
                }
            },

            item = rx_b.recv() => match item {
                None => {
                    trace!("side b closed");
                    break;
                }
                Some(Err(e)) => {
                    err_b = Some(e);
                    break;
                }
                Some(Ok(data)) => {
                    if let Err(e) = forward(&mut write_a, &data).await {
                        err_a = Some(e);
                        break;
                    }
                }
            },
        }
    }

    // Readers may be parked on a full channel; dropping the receivers unblocks them.
    let _ = shutdown_tx.send(true);
    drop(rx_a);
    drop(rx_b);

    let read_a = join_reader(reader_a).await;
    let read_b = join_reader(reader_b).await;

    PipeOutcome {
        conn_a: read_a.unsplit(write_a),
        conn_b: read_b.unsplit(write_b),
        err_a,
        err_b,
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Reader Task -------------------------------------------------

type ReadResult = io::Result<Bytes>;

fn spawn_reader<T>(
    mut reader: ReadHalf<T>,
    mut shutdown: watch::Receiver<bool>,
) -> (mpsc::Receiver<ReadResult>, JoinHandle<ReadHalf<T>>)
where
    T: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<ReadResult>(1);

    let handle = tokio::spawn(async move {
        let mut scratch = [0u8; READ_CHUNK_SIZE];

        loop {
            let read = select! {
                _ = shutdown.wait_for(|stop| *stop) => break,
                read = reader.read(&mut scratch) => read,
            };

            match read {
                // clean EOF: dropping tx closes the channel
                Ok(0) => break,
                Ok(n) => {
                    // fresh allocation so the next read can't clobber it
                    let chunk = Bytes::copy_from_slice(&scratch[..n]);
                    if tx.send(Ok(chunk)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    break;
                }
            }
        }

        reader
    });

    (rx, handle)
}

async fn join_reader<T>(handle: JoinHandle<ReadHalf<T>>) -> ReadHalf<T> {
    match handle.await {
        Ok(reader) => reader,
        Err(e) => std::panic::resume_unwind(e.into_panic()),
    }
}

async fn forward<W>(writer: &mut WriteHalf<W>, data: &[u8]) -> io::Result<()>
where
    W: AsyncWrite,
{
    writer.write_all(data).await?;
    writer.flush().await
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
