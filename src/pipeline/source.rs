//! Page source: turn the input path into an ordered stream of page images.
//!
//! Two input shapes are accepted:
//!
//! * a `.pdf` file — every page is rasterised through pdfium at
//!   [`ConversionConfig::scale`];
//! * a directory — its entries are decoded with the `image` crate, one page
//!   per file.
//!
//! Anything else (a lone image file, a `.txt`) is rejected up front.
//!
//! Pages are produced lazily by a `spawn_blocking` task (pdfium keeps
//! thread-local state, image decoding is CPU-bound) and handed over through
//! a bounded channel, so only a couple of rasters are alive at any time
//! however long the document is. Each page is PNG-encoded once, on the
//! producer thread, and that payload is reused for every request it
//! appears in.
//!
//! Any unreadable entry fails the whole run. There is no partial recovery:
//! a document with a missing page is not a useful transcription.

use crate::config::{ConversionConfig, DirectoryOrder};
use crate::error::Pdf2HtmlError;
use crate::pipeline::encode::encode_page;
use edgequake_llm::ImageData;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Rendered pages allowed to wait in the channel ahead of the consumer.
const PAGE_BUFFER: usize = 1;

/// One rasterised unit of input.
#[derive(Debug, Clone)]
pub struct Page {
    /// 0-based position in the run.
    pub index: usize,
    /// File name for directory input, `page N` for PDF input.
    pub label: String,
    pub image: DynamicImage,
    /// `image` as a base64 PNG, ready for a multimodal request.
    pub encoded: ImageData,
}

impl Page {
    /// Build a page, encoding `image` for the request body.
    pub fn new(
        index: usize,
        label: impl Into<String>,
        image: DynamicImage,
    ) -> Result<Self, image::ImageError> {
        let encoded = encode_page(&image)?;
        Ok(Self {
            index,
            label: label.into(),
            image,
            encoded,
        })
    }

    /// 1-based page number, as shown to users.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Whether `path` should be read as a PDF (by extension, case-insensitive).
pub fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Pages of one input, in order, produced on demand.
#[derive(Debug)]
pub struct PageStream {
    total: usize,
    rx: mpsc::Receiver<Result<Page, Pdf2HtmlError>>,
}

impl PageStream {
    /// Number of pages the input holds.
    pub fn total(&self) -> usize {
        self.total
    }

    /// The next page, or `None` once the producer is done.
    ///
    /// After an `Err` the producer stops; the stream ends.
    pub async fn next(&mut self) -> Option<Result<Page, Pdf2HtmlError>> {
        self.rx.recv().await
    }

    /// Drain the stream into memory.
    pub async fn collect(mut self) -> Result<Vec<Page>, Pdf2HtmlError> {
        let mut pages = Vec::with_capacity(self.total);
        while let Some(page) = self.next().await {
            pages.push(page?);
        }
        Ok(pages)
    }
}

/// Open `path` and start producing its pages.
///
/// Returns once the input is open and its page count is known, so a
/// corrupt PDF, a wrong password or an unreadable directory is reported
/// here rather than from the stream.
pub async fn open_pages(path: &Path, config: &ConversionConfig) -> Result<PageStream, Pdf2HtmlError> {
    if !path.exists() {
        return Err(Pdf2HtmlError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let pdf = is_pdf_path(path);
    if !pdf && !path.is_dir() {
        return Err(Pdf2HtmlError::UnsupportedInput {
            path: path.to_path_buf(),
        });
    }

    let path = path.to_path_buf();
    let scale = config.scale;
    let password = config.password.clone();
    let order = config.directory_order;

    let (ready_tx, ready_rx) = oneshot::channel();
    let (page_tx, rx) = mpsc::channel(PAGE_BUFFER);

    tokio::task::spawn_blocking(move || {
        let mut out = Producer {
            ready: Some(ready_tx),
            pages: page_tx,
        };
        let result = if pdf {
            produce_pdf(&path, scale, password.as_deref(), &mut out)
        } else {
            produce_directory(&path, order, &mut out)
        };
        if let Err(e) = result {
            out.fail(e);
        }
    });

    let total = ready_rx.await.map_err(|_| {
        Pdf2HtmlError::Internal("Page loading task ended before opening the input".to_string())
    })??;

    Ok(PageStream { total, rx })
}

/// Load every page of `path` into memory.
pub async fn load_pages(path: &Path, config: &ConversionConfig) -> Result<Vec<Page>, Pdf2HtmlError> {
    open_pages(path, config).await?.collect().await
}

/// Producer half: announces the page count, then feeds pages.
struct Producer {
    ready: Option<oneshot::Sender<Result<usize, Pdf2HtmlError>>>,
    pages: mpsc::Sender<Result<Page, Pdf2HtmlError>>,
}

impl Producer {
    /// `false` if nobody is waiting any more.
    fn opened(&mut self, total: usize) -> bool {
        self.ready
            .take()
            .is_some_and(|ready| ready.send(Ok(total)).is_ok())
    }

    /// `false` if the consumer is gone or `page` is an error.
    fn send(&self, page: Result<Page, Pdf2HtmlError>) -> bool {
        let ok = page.is_ok();
        self.pages.blocking_send(page).is_ok() && ok
    }

    fn fail(mut self, e: Pdf2HtmlError) {
        match self.ready.take() {
            Some(ready) => {
                let _ = ready.send(Err(e));
            }
            None => {
                let _ = self.pages.blocking_send(Err(e));
            }
        }
    }
}

// ── PDF input ────────────────────────────────────────────────────────────

/// Bind to pdfium: `PDFIUM_LIB_PATH`, then the working directory, then the
/// system library.
pub fn bind_pdfium() -> Result<Pdfium, Pdf2HtmlError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => Pdfium::bind_to_library(&p).map_err(|e| {
            Pdf2HtmlError::PdfiumBindingFailed(format!("PDFIUM_LIB_PATH '{}': {}", p, e))
        })?,
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| Pdf2HtmlError::PdfiumBindingFailed(e.to_string()))?,
    };
    Ok(Pdfium::new(bindings))
}

fn produce_pdf(
    pdf_path: &Path,
    scale: f32,
    password: Option<&str>,
    out: &mut Producer,
) -> Result<(), Pdf2HtmlError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                Pdf2HtmlError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                Pdf2HtmlError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            Pdf2HtmlError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let pages = document.pages();
    info!("PDF loaded: {} pages, rendering at {}x", pages.len(), scale);

    if !out.opened(pages.len() as usize) {
        return Ok(());
    }
    for (index, page) in pages.iter().enumerate() {
        if !out.send(render_page(&page, index, &render_config)) {
            break;
        }
    }
    Ok(())
}

fn render_page(
    page: &PdfPage<'_>,
    index: usize,
    render_config: &PdfRenderConfig,
) -> Result<Page, Pdf2HtmlError> {
    let bitmap = page
        .render_with_config(render_config)
        .map_err(|e| Pdf2HtmlError::RasterisationFailed {
            page: index + 1,
            detail: format!("{:?}", e),
        })?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} → {}x{} px",
        index + 1,
        image.width(),
        image.height()
    );

    Page::new(index, format!("page {}", index + 1), image).map_err(|e| {
        Pdf2HtmlError::PageEncodeFailed {
            page: index + 1,
            detail: e.to_string(),
        }
    })
}

// ── Image-directory input ────────────────────────────────────────────────

fn produce_directory(
    dir: &Path,
    order: DirectoryOrder,
    out: &mut Producer,
) -> Result<(), Pdf2HtmlError> {
    let files = list_directory(dir, order)?;
    info!("Image directory {}: {} files", dir.display(), files.len());

    if !out.opened(files.len()) {
        return Ok(());
    }
    for (index, path) in files.iter().enumerate() {
        if !out.send(decode_image(index, path)) {
            break;
        }
    }
    Ok(())
}

/// Page files of `dir` in run order.
///
/// Every file's header is checked here, so a stray non-image fails the run
/// before the first page is transcribed.
fn list_directory(dir: &Path, order: DirectoryOrder) -> Result<Vec<PathBuf>, Pdf2HtmlError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_to_input_error(dir, e))?;

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_to_input_error(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            debug!("Skipping sub-directory {}", path.display());
            continue;
        }
        image::image_dimensions(&path).map_err(|e| Pdf2HtmlError::ImageDecodeFailed {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        files.push(path);
    }

    if order == DirectoryOrder::Name {
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    }
    Ok(files)
}

fn decode_image(index: usize, path: &Path) -> Result<Page, Pdf2HtmlError> {
    let decode_err = |e: image::ImageError| Pdf2HtmlError::ImageDecodeFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    };

    let image = image::open(path).map_err(decode_err)?;
    let label = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("page {}", index + 1));
    debug!(
        "Loaded {} → {}x{} px",
        label,
        image.width(),
        image.height()
    );
    Page::new(index, label, image).map_err(|e| Pdf2HtmlError::PageEncodeFailed {
        page: index + 1,
        detail: e.to_string(),
    })
}

fn io_to_input_error(path: &Path, e: std::io::Error) -> Pdf2HtmlError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => Pdf2HtmlError::PermissionDenied {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::NotFound => Pdf2HtmlError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::NotADirectory => Pdf2HtmlError::UnsupportedInput {
            path: path.to_path_buf(),
        },
        _ => Pdf2HtmlError::Internal(format!("Reading '{}': {}", path.display(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write_png(dir: &Path, name: &str, width: u32) {
        RgbaImage::from_pixel(width, 8, Rgba([255, 255, 255, 255]))
            .save(dir.join(name))
            .expect("write png fixture");
    }

    fn by_name() -> ConversionConfig {
        ConversionConfig::builder()
            .directory_order(DirectoryOrder::Name)
            .build()
            .unwrap()
    }

    #[test]
    fn test_is_pdf_path() {
        assert!(is_pdf_path(Path::new("paper.pdf")));
        assert!(is_pdf_path(Path::new("/tmp/SCAN.PDF")));
        assert!(!is_pdf_path(Path::new("scans")));
        assert!(!is_pdf_path(Path::new("page.png")));
        assert!(!is_pdf_path(Path::new("pdf")));
    }

    #[test]
    fn directory_yields_one_page_per_image() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "c.png", 30);
        write_png(dir.path(), "a.png", 10);
        write_png(dir.path(), "b.png", 20);

        let pages = tokio_test::block_on(load_pages(dir.path(), &by_name())).unwrap();

        assert_eq!(pages.len(), 3);
        let labels: Vec<&str> = pages.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["a.png", "b.png", "c.png"]);
        let widths: Vec<u32> = pages.iter().map(|p| p.image.width()).collect();
        assert_eq!(widths, vec![10, 20, 30]);
        assert_eq!(pages[2].index, 2);
        assert_eq!(pages[2].number(), 3);
    }

    #[tokio::test]
    async fn listing_order_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        for (i, name) in ["x.png", "m.png", "d.png", "q.png"].iter().enumerate() {
            write_png(dir.path(), name, 4 + i as u32);
        }
        let config = ConversionConfig::default();

        let first = load_pages(dir.path(), &config).await.unwrap();
        let second = load_pages(dir.path(), &config).await.unwrap();

        assert_eq!(first.len(), 4);
        let a: Vec<_> = first.iter().map(|p| p.label.clone()).collect();
        let b: Vec<_> = second.iter().map(|p| p.label.clone()).collect();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn subdirectories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "only.png", 5);
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let pages = load_pages(dir.path(), &by_name()).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].label, "only.png");
    }

    #[tokio::test]
    async fn undecodable_entry_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 5);
        std::fs::write(dir.path().join("notes.png"), b"definitely not a png").unwrap();

        let err = load_pages(dir.path(), &by_name()).await.unwrap_err();
        match err {
            Pdf2HtmlError::ImageDecodeFailed { path, .. } => {
                assert!(path.ends_with("notes.png"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_input_is_file_not_found() {
        let err = load_pages(Path::new("/definitely/not/here"), &ConversionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2HtmlError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn lone_image_file_is_unsupported_input() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "page.png", 5);

        let err = load_pages(&dir.path().join("page.png"), &ConversionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2HtmlError::UnsupportedInput { .. }), "got {err:?}");
        assert!(err.to_string().contains("page.png"));
    }

    #[tokio::test]
    async fn stream_knows_total_and_yields_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "b.png", 6);
        write_png(dir.path(), "a.png", 3);

        let mut stream = open_pages(dir.path(), &by_name()).await.unwrap();
        assert_eq!(stream.total(), 2);

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!((first.index, first.label.as_str()), (0, "a.png"));
        assert_eq!(first.encoded, encode_page(&first.image).unwrap());
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!((second.index, second.label.as_str()), (1, "b.png"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn dropping_the_stream_stops_the_producer() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..8 {
            write_png(dir.path(), &format!("{i}.png"), 4);
        }

        let mut stream = open_pages(dir.path(), &by_name()).await.unwrap();
        assert_eq!(stream.total(), 8);
        stream.next().await.unwrap().unwrap();
        drop(stream);
    }

    /// A generated N-page PDF rasterises to N pages. Skipped when no pdfium
    /// library can be bound.
    #[tokio::test]
    async fn pdf_yields_one_page_per_pdf_page() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("three.pdf");
        {
            let pdfium = match bind_pdfium() {
                Ok(p) => p,
                Err(e) => {
                    println!("SKIP — {e}");
                    return;
                }
            };
            let mut doc = pdfium.create_new_pdf().unwrap();
            for _ in 0..3 {
                doc.pages_mut()
                    .create_page_at_end(PdfPagePaperSize::a4())
                    .unwrap();
            }
            doc.save_to_file(&pdf).unwrap();
        }

        let config = ConversionConfig::builder().scale(0.25).build().unwrap();
        let pages = load_pages(&pdf, &config).await.unwrap();

        assert_eq!(pages.len(), 3);
        for (i, page) in pages.iter().enumerate() {
            assert_eq!(page.index, i);
            assert_eq!(page.label, format!("page {}", i + 1));
            assert!(page.image.width() > 0 && page.image.height() > page.image.width());
        }
    }

    #[tokio::test]
    async fn empty_directory_yields_no_pages() {
        let dir = tempfile::tempdir().unwrap();
        let pages = load_pages(dir.path(), &ConversionConfig::default())
            .await
            .unwrap();
        assert!(pages.is_empty());
    }
}
