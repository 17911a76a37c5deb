use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::backend::{Backend, PlotPayload};
use crate::error::{ChatError, ChatResult};

/// A fetched plot image kept in a temporary file. The file is removed when the
/// handle is dropped.
#[derive(Debug)]
pub struct PlotImage {
    file: NamedTempFile,
    mime: mime::Mime,
    len: usize,
    fetched_at: DateTime<Local>,
}

impl PlotImage {
    pub fn from_payload(payload: PlotPayload) -> ChatResult<Self> {
        if payload.bytes.is_empty() {
            return Err(ChatError::invalid_plot("empty body"));
        }

        let mime = match payload.content_type.as_deref() {
            Some(raw) => raw
                .parse::<mime::Mime>()
                .map_err(|e| ChatError::invalid_plot(format!("bad content type {raw:?}: {e}")))?,
            None => mime::IMAGE_PNG,
        };
        if mime.type_() != mime::IMAGE {
            return Err(ChatError::invalid_plot(format!("expected an image, got {mime}")));
        }

        let mut file = tempfile::Builder::new()
            .prefix("moodchat-plot-")
            .suffix(&format!(".{}", extension_for(&mime)))
            .tempfile()?;
        file.write_all(&payload.bytes)?;
        file.flush()?;
        debug!(path = %file.path().display(), bytes = payload.bytes.len(), "plot written");

        Ok(Self {
            file,
            mime,
            len: payload.bytes.len(),
            fetched_at: Local::now(),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn mime(&self) -> &mime::Mime {
        &self.mime
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Copies the image to `dest`, leaving the temporary file in place.
    pub fn save_to(&self, dest: &Path) -> ChatResult<()> {
        std::fs::copy(self.path(), dest)?;
        Ok(())
    }

    pub fn view(&self) -> PlotView {
        PlotView::Ready {
            path: self.path().to_path_buf(),
            bytes: self.len,
            fetched_at: self.fetched_at,
        }
    }
}

/// What the UI shows in the plot area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlotView {
    Loading,
    Ready {
        path: PathBuf,
        bytes: usize,
        fetched_at: DateTime<Local>,
    },
}

pub async fn fetch_plot<B>(backend: &B) -> ChatResult<PlotImage>
where
    B: Backend + ?Sized,
{
    let payload = backend.fetch_plot().await?;
    PlotImage::from_payload(payload)
}

fn extension_for(mime: &mime::Mime) -> &str {
    if mime.subtype() == mime::SVG {
        "svg"
    } else if mime.subtype() == mime::JPEG {
        "jpg"
    } else {
        mime.subtype().as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(bytes: &[u8], content_type: Option<&str>) -> PlotPayload {
        PlotPayload {
            bytes: bytes.to_vec(),
            content_type: content_type.map(str::to_string),
        }
    }

    #[test]
    fn test_png_is_written_to_temp_file() {
        let image = PlotImage::from_payload(payload(b"\x89PNG data", Some("image/png"))).unwrap();

        assert_eq!(std::fs::read(image.path()).unwrap(), b"\x89PNG data");
        assert_eq!(image.path().extension().and_then(|e| e.to_str()), Some("png"));
        assert_eq!(image.len(), 9);
        assert_eq!(image.mime(), &mime::IMAGE_PNG);
    }

    #[test]
    fn test_temp_file_removed_on_drop() {
        let image = PlotImage::from_payload(payload(b"img", None)).unwrap();
        let path = image.path().to_path_buf();
        assert!(path.exists());

        drop(image);
        assert!(!path.exists());
    }

    #[test]
    fn test_rejects_non_image_and_empty_bodies() {
        let json = payload(br#"{"error":"CSV file not found"}"#, Some("application/json"));
        assert!(matches!(PlotImage::from_payload(json), Err(ChatError::InvalidPlot(_))));

        let empty = payload(b"", Some("image/png"));
        assert!(matches!(PlotImage::from_payload(empty), Err(ChatError::InvalidPlot(_))));
    }

    #[test]
    fn test_save_to_copies_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("plot.svg");
        let image = PlotImage::from_payload(payload(b"<svg/>", Some("image/svg+xml"))).unwrap();
        assert_eq!(image.path().extension().and_then(|e| e.to_str()), Some("svg"));

        image.save_to(&dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"<svg/>");
    }
}
