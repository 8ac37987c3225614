//! Media stream of a ready path.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::formatprocessor::{self, Processor};
use crate::media::{Format, RtpPacket, SessionDescription};
use crate::unit::Unit;

struct StreamFormat {
    processor: Mutex<Box<dyn Processor>>,
}

struct StreamMedia {
    formats: HashMap<u8, StreamFormat>,
}

/// Receiving end of a stream reader.
pub struct StreamReader {
    pub id: u64,
    pub rx: mpsc::Receiver<Arc<Unit>>,
}

/// Media of a ready path: one format processor per (media, payload type)
/// plus the readers the processed units are offered to.
pub struct Stream {
    desc: SessionDescription,
    medias: Vec<StreamMedia>,
    readers: RwLock<HashMap<u64, mpsc::Sender<Arc<Unit>>>>,
    next_reader_id: AtomicU64,
    write_queue_size: usize,
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
}

impl Stream {
    /// Build processors for every format of every media. Fails as a whole
    /// if any processor can't be created.
    pub fn new(
        desc: SessionDescription,
        udp_max_payload_size: usize,
        generate_rtp_packets: bool,
        write_queue_size: usize,
    ) -> Result<Self> {
        let mut medias = Vec::with_capacity(desc.medias.len());

        for media in &desc.medias {
            let mut formats = HashMap::with_capacity(media.formats.len());
            for format in &media.formats {
                let processor = formatprocessor::new(
                    udp_max_payload_size,
                    format.clone(),
                    generate_rtp_packets,
                )?;
                formats.insert(
                    format.payload_type(),
                    StreamFormat {
                        processor: Mutex::new(processor),
                    },
                );
            }
            medias.push(StreamMedia { formats });
        }

        Ok(Self {
            desc,
            medias,
            readers: RwLock::new(HashMap::new()),
            next_reader_id: AtomicU64::new(1),
            write_queue_size: write_queue_size.max(1),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
        })
    }

    pub fn desc(&self) -> &SessionDescription {
        &self.desc
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Current format of a track, with parameter sets refreshed from the
    /// media.
    pub fn format(&self, media: usize, payload_type: u8) -> Result<Format> {
        Ok(self.stream_format(media, payload_type)?.processor.lock().format())
    }

    /// Register a reader; every unit carrying an access unit is offered to
    /// its queue.
    pub fn add_reader(&self) -> StreamReader {
        let id = self.next_reader_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.write_queue_size);
        self.readers.write().insert(id, tx);
        tracing::debug!(reader = id, "stream reader added");
        StreamReader { id, rx }
    }

    pub fn remove_reader(&self, id: u64) {
        if self.readers.write().remove(&id).is_some() {
            tracing::debug!(reader = id, "stream reader removed");
        }
    }

    pub fn reader_count(&self) -> usize {
        self.readers.read().len()
    }

    fn stream_format(&self, media: usize, payload_type: u8) -> Result<&StreamFormat> {
        self.medias
            .get(media)
            .ok_or(Error::MediaNotFound(media))?
            .formats
            .get(&payload_type)
            .ok_or(Error::FormatNotFound {
                media,
                payload_type,
            })
    }

    /// Process an RTP packet received from the publisher.
    pub fn write_rtp_packet(
        &self,
        media: usize,
        payload_type: u8,
        pkt: RtpPacket,
        ntp: SystemTime,
        pts: i64,
    ) -> Result<()> {
        let format = self.stream_format(media, payload_type)?;
        let readers = self.readers.read();

        self.bytes_received
            .fetch_add(pkt.marshal_size() as u64, Ordering::Relaxed);

        let unit = format
            .processor
            .lock()
            .process_rtp_packet(pkt, ntp, pts, !readers.is_empty())?;

        self.offer(&readers, unit);
        Ok(())
    }

    /// Process a unit produced by a non-RTP publisher.
    pub fn write_unit(&self, media: usize, payload_type: u8, mut unit: Unit) -> Result<()> {
        let format = self.stream_format(media, payload_type)?;
        let readers = self.readers.read();

        format.processor.lock().process_unit(&mut unit)?;

        let received: usize = unit.rtp_packets.iter().map(RtpPacket::marshal_size).sum();
        self.bytes_received
            .fetch_add(received as u64, Ordering::Relaxed);

        self.offer(&readers, unit);
        Ok(())
    }

    fn offer(&self, readers: &HashMap<u64, mpsc::Sender<Arc<Unit>>>, unit: Unit) {
        if unit.access_unit.is_none() {
            return;
        }

        let size = unit.access_unit_size() as u64;
        let unit = Arc::new(unit);
        for (id, tx) in readers {
            match tx.try_send(unit.clone()) {
                Ok(()) => {
                    self.bytes_sent.fetch_add(size, Ordering::Relaxed);
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(reader = id, "reader is too slow, discarding unit");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("medias", &self.desc.medias.len())
            .field("readers", &self.reader_count())
            .field("bytes_received", &self.bytes_received())
            .field("bytes_sent", &self.bytes_sent())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::error::CodecError;
    use crate::media::rtp::RtpHeader;
    use crate::media::{GenericFormat, H264Format, Media, MediaType};

    fn desc() -> SessionDescription {
        SessionDescription {
            title: String::new(),
            medias: vec![
                Media {
                    media_type: MediaType::Video,
                    control: "trackID=0".into(),
                    formats: vec![Format::H264(H264Format::new(96))],
                },
                Media {
                    media_type: MediaType::Audio,
                    control: "trackID=1".into(),
                    formats: vec![Format::Generic(GenericFormat {
                        payload_type: 0,
                        codec: "PCMU".into(),
                        clock_rate: 8000,
                        fmtp: None,
                    })],
                },
            ],
        }
    }

    fn packet(payload_type: u8, seq: u16, payload: &'static [u8]) -> RtpPacket {
        RtpPacket {
            header: RtpHeader {
                marker: true,
                payload_type,
                sequence_number: seq,
                timestamp: 1000,
                ssrc: 1,
                ..Default::default()
            },
            payload: Bytes::from_static(payload),
            ..Default::default()
        }
    }

    #[test]
    fn unknown_track_rejected() {
        let stream = Stream::new(desc(), 1472, false, 8).unwrap();
        let err = stream
            .write_rtp_packet(5, 96, packet(96, 1, &[0x41]), SystemTime::now(), 0)
            .unwrap_err();
        assert!(matches!(err, Error::MediaNotFound(5)));

        let err = stream
            .write_rtp_packet(0, 97, packet(97, 1, &[0x41]), SystemTime::now(), 0)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::FormatNotFound {
                media: 0,
                payload_type: 97
            }
        ));
    }

    #[test]
    fn construction_fails_as_a_whole() {
        let err = Stream::new(desc(), 10, false, 8).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn counts_received_bytes() {
        let stream = Stream::new(desc(), 1472, false, 8).unwrap();
        stream
            .write_rtp_packet(1, 0, packet(0, 1, &[1, 2, 3, 4]), SystemTime::now(), 0)
            .unwrap();
        assert_eq!(stream.bytes_received(), 16);
        assert_eq!(stream.bytes_sent(), 0);
    }

    #[test]
    fn readers_receive_access_units() {
        let stream = Stream::new(desc(), 1472, false, 8).unwrap();
        let mut reader = stream.add_reader();
        assert_eq!(stream.reader_count(), 1);

        stream
            .write_rtp_packet(0, 96, packet(96, 1, &[0x65, 0xAA, 0xBB]), SystemTime::now(), 90)
            .unwrap();

        let unit = reader.rx.try_recv().unwrap();
        assert_eq!(unit.pts, 90);
        assert_eq!(
            unit.access_unit.as_deref(),
            Some(&[Bytes::from_static(&[0x65, 0xAA, 0xBB])][..])
        );
        assert_eq!(stream.bytes_sent(), 3);

        stream.remove_reader(reader.id);
        assert_eq!(stream.reader_count(), 0);
    }

    #[test]
    fn full_reader_queue_drops_units() {
        let stream = Stream::new(desc(), 1472, false, 1).unwrap();
        let mut reader = stream.add_reader();

        for seq in 0..3 {
            stream
                .write_rtp_packet(0, 96, packet(96, seq, &[0x41, 0x01]), SystemTime::now(), 0)
                .unwrap();
        }

        assert!(reader.rx.try_recv().is_ok());
        assert!(reader.rx.try_recv().is_err());
        assert_eq!(stream.bytes_sent(), 2);
    }

    #[test]
    fn format_reflects_in_band_parameters() {
        let stream = Stream::new(desc(), 1472, false, 8).unwrap();
        stream
            .write_rtp_packet(0, 96, packet(96, 1, &[0x67, 0x42, 0xc0, 0x1f]), SystemTime::now(), 0)
            .unwrap();
        let Format::H264(f) = stream.format(0, 96).unwrap() else {
            panic!("expected H.264 format");
        };
        assert_eq!(f.profile_level_id().as_deref(), Some("42c01f"));
    }

    #[test]
    fn write_unit_generates_packets() {
        let stream = Stream::new(desc(), 1472, true, 8).unwrap();
        let unit = Unit::from_access_unit(
            vec![Bytes::from_static(&[0x65, 0x01])],
            SystemTime::now(),
            0,
        );
        stream.write_unit(0, 96, unit).unwrap();
        assert!(stream.bytes_received() > 0);

        let unit = Unit::from_access_unit(Vec::new(), SystemTime::now(), 0);
        let err = stream.write_unit(1, 0, unit).unwrap_err();
        assert!(matches!(err, Error::Codec(CodecError::NoRtpPackets)));
    }
}
