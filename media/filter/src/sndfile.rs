//! Dump-to-file filter, grounded in the original source's `sndfile` module: opens a
//! time-stamped WAV sink per direction and writes raw samples; never alters the frame
//! it observes.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use device::{AudioFrame, SampleFormat};

use crate::{Filter, FilterError, FilterEvent};

pub struct SndfileDump {
    file: File,
    bytes_written: u32,
    sample_rate: u32,
    channels: u16,
}

impl SndfileDump {
    pub fn create(path: &Path, sample_rate: u32, channels: u16) -> io::Result<Self> {
        let mut file = File::create(path)?;
        write_wav_header_placeholder(&mut file, sample_rate, channels)?;
        Ok(Self {
            file,
            bytes_written: 0,
            sample_rate,
            channels,
        })
    }
}

fn write_wav_header_placeholder(file: &mut File, sample_rate: u32, channels: u16) -> io::Result<()> {
    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * bits_per_sample as u32 / 8;
    let block_align = channels * bits_per_sample / 8;

    file.write_all(b"RIFF")?;
    file.write_all(&0u32.to_le_bytes())?; // patched on close
    file.write_all(b"WAVE")?;
    file.write_all(b"fmt ")?;
    file.write_all(&16u32.to_le_bytes())?;
    file.write_all(&1u16.to_le_bytes())?; // PCM
    file.write_all(&channels.to_le_bytes())?;
    file.write_all(&sample_rate.to_le_bytes())?;
    file.write_all(&byte_rate.to_le_bytes())?;
    file.write_all(&block_align.to_le_bytes())?;
    file.write_all(&bits_per_sample.to_le_bytes())?;
    file.write_all(b"data")?;
    file.write_all(&0u32.to_le_bytes())?; // patched on close
    Ok(())
}

impl Filter for SndfileDump {
    fn process(&mut self, frame: &mut AudioFrame) -> Result<Option<FilterEvent>, FilterError> {
        debug_assert_eq!(frame.sample_rate, self.sample_rate);
        debug_assert_eq!(frame.channels as u16, self.channels);
        if frame.format == SampleFormat::S16Le {
            let _ = self.file.write_all(&frame.data);
            self.bytes_written += frame.data.len() as u32;
        }
        Ok(None)
    }
}

impl Drop for SndfileDump {
    fn drop(&mut self) {
        use std::io::{Seek, SeekFrom};
        let riff_size = 36 + self.bytes_written;
        if self.file.seek(SeekFrom::Start(4)).is_ok() {
            let _ = self.file.write_all(&riff_size.to_le_bytes());
        }
        if self.file.seek(SeekFrom::Start(40)).is_ok() {
            let _ = self.file.write_all(&self.bytes_written.to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_does_not_mutate_the_frame() {
        let dir = std::env::temp_dir();
        let path = dir.join("callforge_sndfile_test.wav");
        let mut dump = SndfileDump::create(&path, 8000, 1).unwrap();
        let mut frame = AudioFrame::from_s16le(&[1, 2, 3], 8000, 1, 0);
        let before = frame.data.clone();
        dump.process(&mut frame).unwrap();
        assert_eq!(frame.data, before);
        drop(dump);
        let _ = std::fs::remove_file(&path);
    }
}
