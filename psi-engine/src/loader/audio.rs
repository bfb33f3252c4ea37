//! WAV decoding via symphonia
//!
//! Multi-channel recordings are folded to mono by averaging channels.

use super::RawSignal;
use psi_common::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decode an in-memory WAV file to mono samples
pub(crate) fn decode_wav(bytes: &[u8]) -> Result<RawSignal> {
    let source = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("wav");

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::Decode(format!("Failed to probe WAV data: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| Error::Decode("Sample rate unknown".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

    let mut mono: Vec<f64> = Vec::new();
    let mut channel_count = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(Error::Decode(format!("Error reading packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(Error::Decode(format!("Failed to decode packet: {}", e))),
        };

        let spec = *decoded.spec();
        channel_count = spec.channels.count().max(1);
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);

        mono.extend(
            buffer
                .samples()
                .chunks(channel_count)
                .map(|frame| frame.iter().map(|&s| s as f64).sum::<f64>() / frame.len() as f64),
        );
    }

    debug!(
        sample_rate = sample_rate,
        channels = channel_count,
        frames = mono.len(),
        "WAV decoding complete"
    );

    Ok(RawSignal {
        samples: mono,
        sample_rate: sample_rate as f64,
        source: "pcm".to_string(),
        channels: channel_count,
    })
}
