//! TCP listener: one task per connected station

use crate::parser::{parse_weather_data, DOCUMENT_END};
use crate::{IngestError, IngestResult};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use wx_queue::{RealtimeStatistics, StationStore};

/// Accepts station connections and feeds their documents into the store
pub struct IngestServer {
    listener: TcpListener,
    store: Arc<StationStore>,
    stats: Arc<RealtimeStatistics>,
}

impl IngestServer {
    pub async fn bind(
        addr: SocketAddr,
        store: Arc<StationStore>,
        stats: Arc<RealtimeStatistics>,
    ) -> IngestResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| IngestError::Bind(addr, e))?;
        Ok(Self {
            listener,
            store,
            stats,
        })
    }

    pub fn local_addr(&self) -> IngestResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept clients until the listener fails
    pub async fn run(self) -> IngestResult<()> {
        info!("Accepting station connections on {}", self.local_addr()?);

        loop {
            let (stream, peer) = self.listener.accept().await?;
            let store = Arc::clone(&self.store);
            let stats = Arc::clone(&self.stats);
            tokio::spawn(async move {
                handle_client(stream, peer, store, stats).await;
            });
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    peer: SocketAddr,
    store: Arc<StationStore>,
    stats: Arc<RealtimeStatistics>,
) {
    stats.add_connection();
    debug!(%peer, "Station connected");

    if let Err(e) = read_documents(stream, &store, &stats).await {
        warn!(%peer, "Error while handling client: {}", e);
    }

    stats.remove_connection();
    debug!(%peer, "Station disconnected");
}

/// Longest line kept; longer lines discard their document
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Largest document kept while waiting for its closing line
pub const MAX_DOCUMENT_BYTES: usize = 1024 * 1024;

/// Read documents until EOF, handing each one to the store as it completes.
///
/// Bytes that are not valid UTF-8 are replaced, so they only spoil the value
/// they appear in. An oversized document is skipped up to its closing line.
async fn read_documents<R>(
    reader: R,
    store: &StationStore,
    stats: &RealtimeStatistics,
) -> IngestResult<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut raw = Vec::new();
    let mut document = String::new();
    let mut discarding = false;

    loop {
        raw.clear();
        let read = (&mut reader)
            .take(MAX_LINE_BYTES as u64)
            .read_until(b'\n', &mut raw)
            .await?;
        if read == 0 {
            break;
        }

        let truncated = read == MAX_LINE_BYTES && raw.last() != Some(&b'\n');
        let text = String::from_utf8_lossy(&raw);
        let line = text.trim_end();

        if line == DOCUMENT_END {
            if discarding {
                discarding = false;
                continue;
            }
            document.push_str(line);
            document.push('\n');

            let records = parse_weather_data(&document);
            document.clear();

            stats.add_batch();
            stats.add_records(records.len() as u64);
            store.on_data_receive(records);
            continue;
        }

        if discarding {
            continue;
        }
        if truncated || document.len() + line.len() >= MAX_DOCUMENT_BYTES {
            warn!(
                buffered = document.len(),
                "Discarding oversized document"
            );
            document.clear();
            discarding = true;
            continue;
        }

        document.push_str(line);
        document.push('\n');
    }

    if !discarding && !document.trim().is_empty() {
        error!(bytes = document.len(), "Connection closed mid-document");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_documents_split_on_closing_tag() {
        let input = "<WEATHERDATA>\n<MEASUREMENT>\n<STN>1</STN>\n<DATE>2020-01-01</DATE>\n<TIME>00:00:00</TIME>\n</MEASUREMENT>\n</WEATHERDATA>\n\
                     <WEATHERDATA>\n<MEASUREMENT>\n<STN>2</STN>\n<DATE>2020-01-01</DATE>\n<TIME>00:00:01</TIME>\n</MEASUREMENT>\n\
                     <MEASUREMENT>\n<STN>3</STN>\n<DATE>2020-01-01</DATE>\n<TIME>00:00:01</TIME>\n</MEASUREMENT>\n</WEATHERDATA>\n";
        let store = StationStore::new(4);
        let stats = RealtimeStatistics::new();

        read_documents(input.as_bytes(), &store, &stats).await.unwrap();

        assert_eq!(store.station_count(), 3);
        assert_eq!(store.latest(1).unwrap().timestamp, 1_577_836_800);
        let snapshot = stats.snapshot_and_reset();
        assert_eq!(snapshot.batches_received, 2);
        assert_eq!(snapshot.records_received, 3);
    }

    #[tokio::test]
    async fn test_unterminated_document_is_discarded() {
        let input = "<WEATHERDATA>\n<MEASUREMENT>\n<STN>1</STN>\n<DATE>2020-01-01</DATE>\n<TIME>00:00:00</TIME>\n</MEASUREMENT>\n";
        let store = StationStore::new(1);
        let stats = RealtimeStatistics::new();

        read_documents(input.as_bytes(), &store, &stats).await.unwrap();

        assert_eq!(store.station_count(), 0);
        assert_eq!(stats.snapshot_and_reset().batches_received, 0);
    }

    const SECOND_STATION: &[u8] = b"<WEATHERDATA>\n<MEASUREMENT>\n<STN>2</STN>\n<DATE>2020-01-01</DATE>\n<TIME>00:00:01</TIME>\n<TEMP>3.5</TEMP>\n</MEASUREMENT>\n</WEATHERDATA>\n";

    #[tokio::test]
    async fn test_invalid_utf8_spoils_only_its_value() {
        let mut input = b"<WEATHERDATA>\n<MEASUREMENT>\n<STN>1</STN>\n<DATE>2020-01-01</DATE>\n<TIME>00:00:00</TIME>\n<TEMP>1\xb0</TEMP>\n<DEWP>0.5</DEWP>\n</MEASUREMENT>\n</WEATHERDATA>\n".to_vec();
        input.extend_from_slice(SECOND_STATION);
        let store = StationStore::new(2);
        let stats = RealtimeStatistics::new();

        read_documents(input.as_slice(), &store, &stats).await.unwrap();

        let first = store.latest(1).unwrap();
        assert_eq!(first.temperature, None);
        assert_eq!(first.dew_point, Some(0.5));
        assert_eq!(store.latest(2).unwrap().temperature, Some(3.5));
    }

    #[tokio::test]
    async fn test_oversized_document_is_skipped() {
        let mut input = b"<WEATHERDATA>\n<MEASUREMENT>\n<STN>1</STN>\n".to_vec();
        let filler = format!("<NOTE>{}</NOTE>\n", "x".repeat(1000));
        while input.len() <= MAX_DOCUMENT_BYTES {
            input.extend_from_slice(filler.as_bytes());
        }
        input.extend_from_slice(b"<DATE>2020-01-01</DATE>\n<TIME>00:00:00</TIME>\n</MEASUREMENT>\n</WEATHERDATA>\n");
        input.extend_from_slice(SECOND_STATION);
        let store = StationStore::new(2);
        let stats = RealtimeStatistics::new();

        read_documents(input.as_slice(), &store, &stats).await.unwrap();

        assert!(store.latest(1).is_none());
        assert!(store.latest(2).is_some());
        assert_eq!(stats.snapshot_and_reset().batches_received, 1);
    }

    #[tokio::test]
    async fn test_overlong_line_is_skipped() {
        let mut input = b"<WEATHERDATA>\n<MEASUREMENT>\n<STN>1</STN>\n<TEMP>".to_vec();
        input.extend(std::iter::repeat(b'9').take(MAX_LINE_BYTES * 2));
        input.extend_from_slice(b"</TEMP>\n</MEASUREMENT>\n</WEATHERDATA>\n");
        input.extend_from_slice(SECOND_STATION);
        let store = StationStore::new(2);
        let stats = RealtimeStatistics::new();

        read_documents(input.as_slice(), &store, &stats).await.unwrap();

        assert_eq!(store.station_count(), 1);
        assert!(store.latest(2).is_some());
    }
}
