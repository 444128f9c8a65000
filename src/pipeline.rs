//! Parallel decoding on the tokio runtime.
//!
//! Packets arrive on an `mpsc` channel. Each packet is decoded in its own
//! task, bounded by a semaphore of `max_concurrent_decodes` permits; every
//! task owns its frame, cursor and GUID slots, and only reads the shared
//! schema table. Results flow back over a second channel to a single
//! collector, which applies them to the sink. The store keeps the newest
//! record per key by capture sequence, so completion order does not change
//! the final contents.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use sniffdb::sink::RecordStore;
//! use sniffdb::{pipeline, Decoder};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let decoder = Arc::new(Decoder::builder().build());
//! let (tx, rx) = pipeline::channel(decoder.config());
//! drop(tx);
//!
//! let mut store = RecordStore::new();
//! let stats = pipeline::run(decoder, rx, &mut store).await;
//! assert_eq!(stats.packets, 0);
//! # });
//! ```

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, Semaphore};

use crate::config::DecoderConfig;
use crate::error::{DecodeError, Result};
use crate::protocol::{CaptureReader, Packet};
use crate::session::{Decoder, SessionStats};
use crate::sink::RecordSink;

/// Create a packet channel sized by the decoder's configuration.
pub fn channel(config: &DecoderConfig) -> (mpsc::Sender<Packet>, mpsc::Receiver<Packet>) {
    mpsc::channel(config.channel_capacity.max(1))
}

/// Decode every packet received on `packets` until the channel closes.
///
/// Returns the run's counters once all in-flight decodes have been applied.
pub async fn run<S: RecordSink>(
    decoder: Arc<Decoder>,
    mut packets: mpsc::Receiver<Packet>,
    mut sink: S,
) -> SessionStats {
    let config = *decoder.config();
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_decodes.max(1)));
    let (result_tx, mut results) = mpsc::channel(config.channel_capacity.max(1));

    let feeder = tokio::spawn(async move {
        while let Some(packet) = packets.recv().await {
            // Permit is held until the decode task completes
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => break,
            };
            let decoder = decoder.clone();
            let result_tx = result_tx.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let provenance = packet.provenance;
                let result = decoder.decode(packet);
                if result_tx.send((provenance, result)).await.is_err() {
                    tracing::error!("Collector gone, dropping result for {}", provenance);
                }
            });
        }
    });

    let mut stats = SessionStats::default();
    while let Some((provenance, result)) = results.recv().await {
        stats.apply(&mut sink, &provenance, result);
    }

    if let Err(e) = feeder.await {
        tracing::error!("Pipeline feeder failed: {}", e);
    }

    tracing::debug!(
        "Pipeline finished: {} packets, {} stored, {} unkeyed",
        stats.packets,
        stats.stored,
        stats.unkeyed
    );
    stats
}

/// Read a capture stream and forward its packets to `tx`.
///
/// Returns the number of packets sent. Stops early if the receiver is gone.
///
/// # Errors
///
/// `Io` on read failure, `Protocol` on a corrupt capture stream.
pub async fn feed_capture<R: AsyncRead + Unpin>(
    mut reader: R,
    tx: mpsc::Sender<Packet>,
    max_packet_size: u32,
) -> Result<usize> {
    let mut capture = CaptureReader::with_max_packet(max_packet_size);
    let mut buf = vec![0u8; 64 * 1024];
    let mut sent = 0;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => return Err(DecodeError::Io(e)),
        };

        for packet in capture.push(&buf[..n])? {
            if tx.send(packet).await.is_err() {
                tracing::warn!("Packet receiver closed after {} packets", sent);
                return Ok(sent);
            }
            sent += 1;
        }
    }

    if !capture.is_idle() {
        tracing::warn!(
            "Capture ended with {} bytes of an incomplete record",
            capture.len()
        );
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::SchemaTable;
    use crate::protocol::{Direction, Provenance};
    use crate::records::{DecodedRecord, PageTextPage, RecordKey};
    use crate::schema::{Field, RecordSchema};
    use crate::sink::RecordStore;
    use bytes::Bytes;

    const PAGE: u32 = 0x40;

    fn decoder(max_concurrent: usize) -> Arc<Decoder> {
        let mut table = SchemaTable::new();
        table.register(
            PAGE,
            RecordSchema::new("page", vec![Field::U32("entry"), Field::CString("text")])
                .with_projection(|fields| {
                    Ok(DecodedRecord::PageText {
                        entry: fields.u32("entry")?,
                        page: Some(PageTextPage {
                            text: fields.text("text")?.to_string(),
                            next_page: 0,
                        }),
                    })
                }),
        );
        Arc::new(
            Decoder::builder()
                .table(table)
                .max_concurrent_decodes(max_concurrent)
                .channel_capacity(4)
                .build(),
        )
    }

    fn page(entry: u32, text: &str, sequence: u32) -> Packet {
        let mut payload = entry.to_le_bytes().to_vec();
        payload.extend_from_slice(text.as_bytes());
        payload.push(0);
        Packet::new(
            Provenance::new(PAGE, Direction::ServerToClient, 0, sequence),
            Bytes::from(payload),
        )
    }

    fn text_of(store: &RecordStore, entry: u32) -> String {
        match &store.get(&RecordKey::new("page_text", entry)).unwrap().record {
            DecodedRecord::PageText { page: Some(p), .. } => p.text.clone(),
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_decodes_all_packets() {
        let decoder = decoder(4);
        let (tx, rx) = channel(decoder.config());

        let producer = tokio::spawn(async move {
            for seq in 0..50u32 {
                tx.send(page(seq % 10, &format!("v{}", seq), seq)).await.unwrap();
            }
        });

        let mut store = RecordStore::new();
        let stats = run(decoder, rx, &mut store).await;
        producer.await.unwrap();

        assert_eq!(stats.packets, 50);
        assert_eq!(stats.stored, 50);
        assert_eq!(store.len(), 10);
        for entry in 0..10 {
            assert_eq!(text_of(&store, entry), format!("v{}", 40 + entry));
        }
    }

    #[tokio::test]
    async fn test_run_matches_sequential_session() {
        let packets: Vec<Packet> = (0..30u32)
            .map(|seq| page(seq % 3, &format!("t{}", seq), seq))
            .collect();

        let decoder = decoder(8);
        let mut sequential = RecordStore::new();
        {
            let mut session = decoder.session(&mut sequential);
            for packet in packets.iter().cloned() {
                session.process(packet);
            }
        }

        let (tx, rx) = channel(decoder.config());
        let mut parallel = RecordStore::new();
        let feed = tokio::spawn(async move {
            for packet in packets.into_iter().rev() {
                tx.send(packet).await.unwrap();
            }
        });
        run(decoder, rx, &mut parallel).await;
        feed.await.unwrap();

        for entry in 0..3 {
            assert_eq!(text_of(&parallel, entry), text_of(&sequential, entry));
        }
    }

    #[tokio::test]
    async fn test_run_survives_bad_packets() {
        let decoder = decoder(2);
        let (tx, rx) = channel(decoder.config());

        tx.send(page(1, "ok", 1)).await.unwrap();
        tx.send(Packet::new(
            Provenance::new(PAGE, Direction::ServerToClient, 0, 2),
            Bytes::from_static(&[1, 2]),
        ))
        .await
        .unwrap();
        tx.send(page(2, "ok", 3)).await.unwrap();
        drop(tx);

        let mut store = RecordStore::new();
        let stats = run(decoder, rx, &mut store).await;

        assert_eq!(stats.packets, 3);
        assert_eq!(stats.abandoned, 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_feed_capture_from_reader() {
        let mut capture = Vec::new();
        for seq in 0..5u32 {
            capture.extend(page(seq, "x", seq).to_capture_bytes());
        }

        let decoder = decoder(2);
        let (tx, rx) = channel(decoder.config());
        let feed = tokio::spawn(feed_capture(std::io::Cursor::new(capture), tx, 1024));

        let mut store = RecordStore::new();
        let stats = run(decoder, rx, &mut store).await;

        assert_eq!(feed.await.unwrap().unwrap(), 5);
        assert_eq!(stats.stored, 5);
        assert_eq!(store.len(), 5);
    }

    #[tokio::test]
    async fn test_feed_capture_rejects_corrupt_stream() {
        let mut capture = page(1, "x", 1).to_capture_bytes();
        capture[4] = 7;

        let (tx, _rx) = mpsc::channel(4);
        let result = feed_capture(&capture[..], tx, 1024).await;
        assert!(matches!(result, Err(DecodeError::Protocol(_))));
    }
}
