use {
    image::RgbaImage,
    std::{
        path::{Path, PathBuf},
        sync::mpsc,
        thread,
    },
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("Unable to decode the glyph atlas at {:?}", .path)]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("The glyph atlas decoder stopped without producing an image")]
    Disconnected,
}

/// Decodes the glyph atlas image off the frame thread.
///
/// The decoder thread owns nothing but the path. Its result is handed over
/// a channel which the frame thread checks with [GlyphAtlasLoader::poll].
pub struct GlyphAtlasLoader {
    receiver: Option<mpsc::Receiver<Result<RgbaImage, AtlasError>>>,
}

impl GlyphAtlasLoader {
    /// Start decoding the image at `path` on a new thread.
    pub fn spawn(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (sender, receiver) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("glyph-atlas".to_owned())
            .spawn(move || {
                // the receiver may already be gone during teardown
                let _ = sender.send(decode(&path));
            });
        match spawned {
            Ok(_) => Self {
                receiver: Some(receiver),
            },
            Err(err) => {
                log::warn!(
                    "Unable to start the glyph atlas decoder, glyphs stay blank: {}",
                    err
                );
                Self::none()
            }
        }
    }

    /// A loader which never produces an image.
    pub fn none() -> Self {
        Self { receiver: None }
    }

    /// A loader which hands over `image` on the first poll.
    pub fn ready(image: RgbaImage) -> Self {
        let (sender, receiver) = mpsc::channel();
        let _ = sender.send(Ok(image));
        Self {
            receiver: Some(receiver),
        }
    }

    /// True until the loader has produced its (single) outcome.
    pub fn is_pending(&self) -> bool {
        self.receiver.is_some()
    }

    /// Check for a finished decode without blocking.
    ///
    /// Returns the outcome exactly once. Later calls return None.
    pub fn poll(&mut self) -> Option<Result<RgbaImage, AtlasError>> {
        let receiver = self.receiver.as_ref()?;
        let outcome = match receiver.try_recv() {
            Ok(outcome) => outcome,
            Err(mpsc::TryRecvError::Empty) => return None,
            Err(mpsc::TryRecvError::Disconnected) => {
                Err(AtlasError::Disconnected)
            }
        };
        self.receiver = None;
        Some(outcome)
    }
}

fn decode(path: &Path) -> Result<RgbaImage, AtlasError> {
    image::open(path)
        .map(|image| image.to_rgba8())
        .map_err(|source| AtlasError::Decode {
            path: path.to_owned(),
            source,
        })
}

#[cfg(test)]
mod test {
    use {super::*, image::Rgba, std::time::Duration};

    fn wait_for(loader: &mut GlyphAtlasLoader) -> Result<RgbaImage, AtlasError> {
        for _ in 0..500 {
            if let Some(outcome) = loader.poll() {
                return outcome;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("the decoder never finished");
    }

    #[test]
    fn decodes_a_png_off_thread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atlas.png");
        RgbaImage::from_pixel(8, 4, Rgba([255, 0, 0, 255]))
            .save(&path)
            .unwrap();

        let mut loader = GlyphAtlasLoader::spawn(&path);
        let image = wait_for(&mut loader).unwrap();
        assert_eq!(image.dimensions(), (8, 4));
        assert!(!loader.is_pending());
        assert!(loader.poll().is_none());
    }

    #[test]
    fn a_missing_file_is_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = GlyphAtlasLoader::spawn(dir.path().join("missing.png"));
        assert!(matches!(
            wait_for(&mut loader),
            Err(AtlasError::Decode { .. })
        ));
        assert!(loader.poll().is_none());
    }

    #[test]
    fn no_loader_never_produces_anything() {
        let mut loader = GlyphAtlasLoader::none();
        assert!(!loader.is_pending());
        assert!(loader.poll().is_none());
    }
}
