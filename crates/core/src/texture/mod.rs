//! Album art pipeline: fetch bytes, decode an image, hand pixel data to the
//! renderer as a texture.
//!
//! Each stage fails with its own [`FetchError`] variant. A fetch is a single
//! attempt; retry policy belongs to the caller. Cancelling the token passed to
//! [`TexturePipeline::fetch_texture`] abandons the in-flight work and yields
//! [`FetchError::Cancelled`].

use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::{config::FetchConfig, error::FetchError, PhysicalMediaError, Result};

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Renderer-ready RGBA8 texture data.
#[derive(Clone, PartialEq)]
pub struct TextureHandle {
    id: u64,
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl TextureHandle {
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
            width,
            height,
            pixels: pixels.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureHandle")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 rows.
    pub rgba: Vec<u8>,
}

/// Reason a single pipeline stage failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct StageFailure(String);

impl StageFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

pub type StageResult<T> = std::result::Result<T, StageFailure>;

impl From<reqwest::Error> for StageFailure {
    fn from(value: reqwest::Error) -> Self {
        Self(value.to_string())
    }
}

impl From<image::ImageError> for StageFailure {
    fn from(value: image::ImageError) -> Self {
        Self(value.to_string())
    }
}

impl From<std::io::Error> for StageFailure {
    fn from(value: std::io::Error) -> Self {
        Self(value.to_string())
    }
}

/// Retrieves the raw bytes behind a resource locator.
pub trait Transport: Send + Sync + 'static {
    fn fetch(&self, uri: &Url) -> impl Future<Output = StageResult<Vec<u8>>> + Send;
}

/// Renderer service turning encoded bytes into pixels.
pub trait ImageDecoder: Send + Sync + 'static {
    fn decode_image(&self, bytes: &[u8]) -> StageResult<DecodedImage>;
}

/// Renderer service turning pixels into a texture resource.
pub trait TextureFactory: Send + Sync + 'static {
    fn make_texture(&self, image: DecodedImage) -> StageResult<TextureHandle>;
}

/// `http`/`https` transport backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| PhysicalMediaError::msg(format!("failed to build http client: {err}")))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, uri: &Url) -> impl Future<Output = StageResult<Vec<u8>>> + Send {
        let client = self.client.clone();
        let uri = uri.clone();
        async move {
            let response = client.get(uri).send().await?.error_for_status()?;
            Ok(response.bytes().await?.to_vec())
        }
    }
}

/// `file://` transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransport;

impl Transport for FileTransport {
    fn fetch(&self, uri: &Url) -> impl Future<Output = StageResult<Vec<u8>>> + Send {
        let path = uri.to_file_path();
        async move {
            let path = path.map_err(|_| StageFailure::new("not a local file path"))?;
            Ok(tokio::fs::read(path).await?)
        }
    }
}

/// Dispatches on the URI scheme: `http`/`https` over the network, `file`
/// from disk.
#[derive(Debug, Clone)]
pub struct DefaultTransport {
    http: HttpTransport,
    file: FileTransport,
}

impl DefaultTransport {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: HttpTransport::new()?,
            file: FileTransport,
        })
    }
}

impl Transport for DefaultTransport {
    fn fetch(&self, uri: &Url) -> impl Future<Output = StageResult<Vec<u8>>> + Send {
        let uri = uri.clone();
        async move {
            match uri.scheme() {
                "http" | "https" => self.http.fetch(&uri).await,
                "file" => self.file.fetch(&uri).await,
                other => Err(StageFailure::new(format!("unsupported scheme `{other}`"))),
            }
        }
    }
}

/// In-memory transport serving pre-registered bodies, optionally after a
/// fixed latency. Every request is logged, hits and misses alike.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    bodies: Arc<HashMap<String, Vec<u8>>>,
    latency: Duration,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, uri: &str, body: Vec<u8>) -> Self {
        Arc::make_mut(&mut self.bodies).insert(uri.to_string(), body);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

impl Transport for MemoryTransport {
    fn fetch(&self, uri: &Url) -> impl Future<Output = StageResult<Vec<u8>>> + Send {
        if let Ok(mut log) = self.requests.lock() {
            log.push(uri.to_string());
        }
        let body = self.bodies.get(uri.as_str()).cloned();
        let latency = self.latency;
        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            body.ok_or_else(|| StageFailure::new("no such resource"))
        }
    }
}

/// Decoder for the raster formats enabled on the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterDecoder;

impl ImageDecoder for RasterDecoder {
    fn decode_image(&self, bytes: &[u8]) -> StageResult<DecodedImage> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = image.dimensions();
        Ok(DecodedImage {
            width,
            height,
            rgba: image.into_raw(),
        })
    }
}

/// Forwards RGBA8 pixels unchanged, rejecting images the renderer cannot
/// hold.
#[derive(Debug, Clone, Copy)]
pub struct RgbaTextureFactory {
    max_dimension: u32,
}

impl RgbaTextureFactory {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }
}

impl Default for RgbaTextureFactory {
    fn default() -> Self {
        Self::new(8_192)
    }
}

impl TextureFactory for RgbaTextureFactory {
    fn make_texture(&self, image: DecodedImage) -> StageResult<TextureHandle> {
        if image.width == 0 || image.height == 0 {
            return Err(StageFailure::new("image has no pixels"));
        }
        if image.width > self.max_dimension || image.height > self.max_dimension {
            return Err(StageFailure::new(format!(
                "{}x{} exceeds the {} pixel texture limit",
                image.width, image.height, self.max_dimension
            )));
        }
        let expected = image.width as usize * image.height as usize * 4;
        if image.rgba.len() != expected {
            return Err(StageFailure::new(format!(
                "expected {expected} bytes of rgba data, got {}",
                image.rgba.len()
            )));
        }
        Ok(TextureHandle::from_rgba8(image.width, image.height, image.rgba))
    }
}

pub struct TexturePipeline<T> {
    transport: T,
    decoder: Arc<dyn ImageDecoder>,
    factory: Arc<dyn TextureFactory>,
    transport_timeout: Duration,
}

impl<T: Transport> TexturePipeline<T> {
    /// Pipeline using the `image` crate decoder and the RGBA texture factory.
    pub fn new(transport: T, config: &FetchConfig) -> Self {
        Self::with_services(
            transport,
            Arc::new(RasterDecoder),
            Arc::new(RgbaTextureFactory::default()),
            config,
        )
    }

    pub fn with_services(
        transport: T,
        decoder: Arc<dyn ImageDecoder>,
        factory: Arc<dyn TextureFactory>,
        config: &FetchConfig,
    ) -> Self {
        Self {
            transport,
            decoder,
            factory,
            transport_timeout: config.transport_timeout(),
        }
    }

    /// Fetches, decodes and uploads the art at `uri`, unless `cancel` fires
    /// first.
    pub async fn fetch_texture(
        &self,
        uri: &Url,
        cancel: &CancellationToken,
    ) -> std::result::Result<TextureHandle, FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(%uri, "texture fetch cancelled");
                Err(FetchError::Cancelled { uri: uri.to_string() })
            }
            result = self.run_stages(uri) => result,
        }
    }

    async fn run_stages(&self, uri: &Url) -> std::result::Result<TextureHandle, FetchError> {
        let bytes = match tokio::time::timeout(self.transport_timeout, self.transport.fetch(uri)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(failure)) => {
                return Err(FetchError::TransportFailed {
                    uri: uri.to_string(),
                    reason: failure.to_string(),
                })
            }
            Err(_) => {
                return Err(FetchError::TransportFailed {
                    uri: uri.to_string(),
                    reason: format!("timed out after {:?}", self.transport_timeout),
                })
            }
        };
        debug!(%uri, bytes = bytes.len(), "album art retrieved");

        let decoder = Arc::clone(&self.decoder);
        let factory = Arc::clone(&self.factory);
        let source = uri.to_string();
        let staged = tokio::task::spawn_blocking(move || -> std::result::Result<TextureHandle, FetchError> {
            let image = decoder
                .decode_image(&bytes)
                .map_err(|failure| FetchError::DecodeFailed {
                    uri: source.clone(),
                    reason: failure.to_string(),
                })?;
            factory
                .make_texture(image)
                .map_err(|failure| FetchError::TextureGenerationFailed {
                    uri: source,
                    reason: failure.to_string(),
                })
        })
        .await;

        staged.unwrap_or_else(|join| {
            Err(FetchError::TextureGenerationFailed {
                uri: uri.to_string(),
                reason: join.to_string(),
            })
        })
    }
}

impl<T: fmt::Debug> fmt::Debug for TexturePipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TexturePipeline")
            .field("transport", &self.transport)
            .field("transport_timeout", &self.transport_timeout)
            .finish()
    }
}

/// Encodes a solid-color PNG. Handy for fixtures and offline previews.
pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Result<Vec<u8>> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut encoded = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut encoded, image::ImageFormat::Png)
        .map_err(|err| PhysicalMediaError::msg(format!("failed to encode png: {err}")))?;
    Ok(encoded.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ART: &str = "https://example.com/art.png";

    fn uri(value: &str) -> Url {
        Url::parse(value).unwrap()
    }

    fn pipeline(transport: MemoryTransport) -> TexturePipeline<MemoryTransport> {
        TexturePipeline::new(transport, &FetchConfig::default())
    }

    #[tokio::test]
    async fn produces_a_texture_from_png_bytes() {
        let transport = MemoryTransport::new().with_body(ART, solid_png(3, 2, [9, 8, 7, 255]).unwrap());

        let texture = pipeline(transport)
            .fetch_texture(&uri(ART), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!((texture.width(), texture.height()), (3, 2));
        assert_eq!(&texture.pixels()[..4], &[9, 8, 7, 255]);
    }

    #[tokio::test]
    async fn missing_resource_is_a_transport_failure() {
        let err = pipeline(MemoryTransport::new())
            .fetch_texture(&uri(ART), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::TransportFailed { .. }));
    }

    #[tokio::test]
    async fn corrupt_bytes_are_a_decode_failure() {
        let transport = MemoryTransport::new().with_body(ART, b"definitely not a png".to_vec());

        let err = pipeline(transport)
            .fetch_texture(&uri(ART), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::DecodeFailed { .. }));
    }

    #[tokio::test]
    async fn oversized_images_fail_texture_generation() {
        let transport = MemoryTransport::new().with_body(ART, solid_png(4, 4, [0; 4]).unwrap());
        let pipeline = TexturePipeline::with_services(
            transport,
            Arc::new(RasterDecoder),
            Arc::new(RgbaTextureFactory::new(2)),
            &FetchConfig::default(),
        );

        let err = pipeline
            .fetch_texture(&uri(ART), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::TextureGenerationFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_transport_times_out() {
        let transport = MemoryTransport::new()
            .with_body(ART, solid_png(1, 1, [0; 4]).unwrap())
            .with_latency(Duration::from_secs(60));

        let err = pipeline(transport)
            .fetch_texture(&uri(ART), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            FetchError::TransportFailed { reason, .. } => assert!(reason.contains("timed out")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_the_fetch() {
        let transport = MemoryTransport::new()
            .with_body(ART, solid_png(1, 1, [0; 4]).unwrap())
            .with_latency(Duration::from_secs(1));
        let pipeline = pipeline(transport);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = pipeline.fetch_texture(&uri(ART), &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn file_transport_reads_local_art() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("art.png");
        std::fs::write(&path, solid_png(2, 2, [1, 2, 3, 255]).unwrap()).unwrap();
        let pipeline = TexturePipeline::new(FileTransport, &FetchConfig::default());

        let texture = pipeline
            .fetch_texture(&Url::from_file_path(&path).unwrap(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(texture.width(), 2);
    }

    #[tokio::test]
    async fn default_transport_rejects_unknown_schemes() {
        let transport = DefaultTransport::new().unwrap();

        let err = transport.fetch(&uri("ftp://example.com/art.png")).await.unwrap_err();

        assert!(err.to_string().contains("ftp"));
    }

    #[test]
    fn texture_ids_are_unique() {
        let a = TextureHandle::from_rgba8(1, 1, vec![0; 4]);
        let b = TextureHandle::from_rgba8(1, 1, vec![0; 4]);

        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
    }
}
