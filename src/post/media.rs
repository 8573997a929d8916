use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::debug;
use mime_guess::MimeGuess;

use crate::error::GalleryError;

pub const MAX_ATTACHMENTS: usize = 3;
pub const MAX_CLIP_SECONDS: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// A local file selected for upload, classified before any request is made.
/// Anything that is neither an image nor a video clip is rejected here, so
/// the gateway never sees it.
#[derive(Debug, Clone)]
pub struct MediaFile {
    path: PathBuf,
    file_name: String,
    mime: String,
    kind: MediaKind,
    duration: Option<f64>,
}

impl MediaFile {
    pub fn open(path: &Path) -> Result<Self, GalleryError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime = MimeGuess::from_path(path)
            .first_or_octet_stream()
            .to_string();

        let kind = if mime.starts_with("image/") {
            MediaKind::Image
        } else if mime.starts_with("video/") {
            MediaKind::Video
        } else {
            return Err(GalleryError::InvalidMedia(format!(
                "{}: unsupported media type {}",
                file_name, mime
            )));
        };

        std::fs::metadata(path)?;
        let duration = match kind {
            MediaKind::Video => {
                let duration = clip_duration(path);
                debug!("{}: probed duration {:?}", file_name, duration);
                duration
            }
            MediaKind::Image => None,
        };

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            mime,
            kind,
            duration,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub async fn bytes(&self) -> Result<Vec<u8>, GalleryError> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}

/// The rules the create forms enforce: 1 to 3 attachments, and video clips
/// no longer than 30 seconds. A clip whose duration cannot be read is
/// rejected rather than waved through.
pub fn validate(files: &[MediaFile]) -> Result<(), GalleryError> {
    if files.is_empty() || files.len() > MAX_ATTACHMENTS {
        return Err(GalleryError::InvalidMedia(format!(
            "Upload 1 to {} images or videos",
            MAX_ATTACHMENTS
        )));
    }
    for file in files {
        if file.kind == MediaKind::Video {
            match file.duration {
                Some(duration) if duration <= MAX_CLIP_SECONDS => {}
                Some(_) => {
                    return Err(GalleryError::InvalidMedia(format!(
                        "Video clips must be {} seconds or less",
                        MAX_CLIP_SECONDS as u32
                    )))
                }
                None => {
                    return Err(GalleryError::InvalidMedia(format!(
                        "{}: could not read clip duration",
                        file.file_name
                    )))
                }
            }
        }
    }
    Ok(())
}

/// Encode files the way the create forms shipped attachments: as
/// `data:<mime>;base64,` URIs.
pub async fn to_data_uris(files: &[MediaFile]) -> Result<Vec<String>, GalleryError> {
    let mut urls = Vec::with_capacity(files.len());
    for file in files {
        let bytes = file.bytes().await?;
        urls.push(format!(
            "data:{};base64,{}",
            file.mime(),
            STANDARD.encode(bytes)
        ));
    }
    Ok(urls)
}

/// Clip length in seconds, read from the container's `mvhd` header.
///
/// Only the box walk down to `moov`/`mvhd` is implemented; no decoding.
fn clip_duration(path: &Path) -> Option<f64> {
    let file = File::open(path).ok()?;
    let len = file.metadata().ok()?.len();
    let mut reader = BufReader::new(file);
    scan_boxes(&mut reader, 0, len).ok().flatten()
}

fn scan_boxes<R: Read + Seek>(reader: &mut R, mut pos: u64, end: u64) -> io::Result<Option<f64>> {
    while pos + 8 <= end {
        reader.seek(SeekFrom::Start(pos))?;
        let mut header = [0u8; 8];
        reader.read_exact(&mut header)?;
        let mut size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let kind = [header[4], header[5], header[6], header[7]];

        let mut body = pos + 8;
        if size == 1 {
            let mut large = [0u8; 8];
            reader.read_exact(&mut large)?;
            size = u64::from_be_bytes(large);
            body = pos + 16;
        } else if size == 0 {
            size = end - pos;
        }
        if size < 8 || pos + size > end {
            return Ok(None);
        }

        match &kind {
            b"moov" => return scan_boxes(reader, body, pos + size),
            b"mvhd" => {
                reader.seek(SeekFrom::Start(body))?;
                return read_mvhd(reader);
            }
            _ => {}
        }
        pos += size;
    }
    Ok(None)
}

fn read_mvhd<R: Read>(reader: &mut R) -> io::Result<Option<f64>> {
    let mut version = [0u8; 4];
    reader.read_exact(&mut version)?;

    let (timescale, duration) = if version[0] == 1 {
        // 64-bit creation and modification times
        let mut skip = [0u8; 16];
        reader.read_exact(&mut skip)?;
        let mut timescale = [0u8; 4];
        reader.read_exact(&mut timescale)?;
        let mut duration = [0u8; 8];
        reader.read_exact(&mut duration)?;
        (u32::from_be_bytes(timescale), u64::from_be_bytes(duration))
    } else {
        let mut skip = [0u8; 8];
        reader.read_exact(&mut skip)?;
        let mut timescale = [0u8; 4];
        reader.read_exact(&mut timescale)?;
        let mut duration = [0u8; 4];
        reader.read_exact(&mut duration)?;
        (
            u32::from_be_bytes(timescale),
            u32::from_be_bytes(duration) as u64,
        )
    };

    if timescale == 0 {
        return Ok(None);
    }
    Ok(Some(duration as f64 / timescale as f64))
}
