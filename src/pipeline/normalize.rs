//! Payload normalisation: every stored invoice is a PDF.
//!
//! Scanned invoices arrive as JPEG or PNG. They are decoded, flattened to
//! RGB, re-encoded as JPEG and placed on a single page whose size matches the
//! image (one pixel per point). JPEG data can be embedded in a PDF as-is with
//! the `DCTDecode` filter, so no further compression step is needed.

use crate::error::NormalizeError;
use image::{DynamicImage, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Cursor;
use tracing::debug;

const IMAGE_EXTENSIONS: [&str; 3] = [".jpg", ".jpeg", ".png"];

/// How a downloaded body must be treated before it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Stored verbatim.
    Pdf,
    /// Converted to a one-page PDF.
    Image,
}

impl PayloadKind {
    /// Decide from the URL path suffix, ignoring case, query and fragment.
    pub fn from_url(url: &str) -> Self {
        let path = match reqwest::Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
        };
        let path = path.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            PayloadKind::Image
        } else {
            PayloadKind::Pdf
        }
    }
}

/// Turn a response body into the bytes written to `<id>.pdf`.
pub fn normalize(kind: PayloadKind, body: &[u8]) -> Result<Vec<u8>, NormalizeError> {
    match kind {
        PayloadKind::Pdf => Ok(body.to_vec()),
        PayloadKind::Image => {
            let img = image::load_from_memory(body).map_err(NormalizeError::Decode)?;
            image_to_pdf(&img)
        }
    }
}

/// Build a single-page PDF that shows `img` at its pixel size.
pub fn image_to_pdf(img: &DynamicImage) -> Result<Vec<u8>, NormalizeError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let (width, height) = (rgb.width() as i64, rgb.height() as i64);

    let mut jpeg = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .map_err(NormalizeError::Encode)?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0i64.into(),
                    0i64.into(),
                    height.into(),
                    0i64.into(),
                    0i64.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
        "MediaBox" => vec![0i64.into(), 0i64.into(), width.into(), height.into()],
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| NormalizeError::Pdf(e.into()))?;
    debug!("Converted {}x{} image → {} byte PDF", width, height, out.len());
    Ok(out)
}
