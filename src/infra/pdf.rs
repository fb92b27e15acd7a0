//! Single-page certificate documents assembled with `lopdf`.

use std::path::Path;

use async_trait::async_trait;
use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use tracing::debug;

use crate::application::certificates::{CertificateRenderer, RenderError, RenderRequest};
use crate::domain::events::format_certificate_date;

const PAGE_WIDTH: f32 = 842.0;
const PAGE_HEIGHT: f32 = 595.0;

const HEADING: &str = "Certificate of Participation";
const SIGNATURE_WIDTH: f32 = 180.0;
const SIGNATURE_BOTTOM: f32 = 70.0;

const HEADING_COLOR: Rgb = Rgb(0x1e, 0x40, 0xaf);
const NAME_COLOR: Rgb = Rgb(0x11, 0x18, 0x27);
const BODY_COLOR: Rgb = Rgb(0x37, 0x41, 0x51);
const MUTED_COLOR: Rgb = Rgb(0x6b, 0x72, 0x80);

#[derive(Debug, Clone, Copy)]
struct Rgb(u8, u8, u8);

impl Rgb {
    fn operands(self) -> Vec<Object> {
        [self.0, self.1, self.2]
            .into_iter()
            .map(|channel| Object::Real(f32::from(channel) / 255.0))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }

    fn base_font(self) -> &'static str {
        match self {
            Font::Regular => "Helvetica",
            Font::Bold => "Helvetica-Bold",
        }
    }
}

/// Renders certificates from optional background and signature images.
#[derive(Debug, Clone, Default)]
pub struct PdfCertificateRenderer;

impl PdfCertificateRenderer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CertificateRenderer for PdfCertificateRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
        let template = match &request.template_path {
            Some(path) => read_asset(path, "template").await,
            None => None,
        };
        let signature = match &request.signature_path {
            Some(path) => read_asset(path, "signature").await,
            None => None,
        };

        let layout = Layout {
            name: request.participant_name.clone(),
            attending: format!("for successfully attending {}", request.event_title),
            date: format!("Date: {}", format_certificate_date(request.date)),
        };

        tokio::task::spawn_blocking(move || {
            let template = template.and_then(|bytes| decode_asset(&bytes, "template"));
            let signature = signature.and_then(|bytes| decode_asset(&bytes, "signature"));
            build_document(&layout, template, signature)
        })
        .await
        .map_err(|err| RenderError::Task(err.to_string()))?
    }
}

struct Layout {
    name: String,
    attending: String,
    date: String,
}

async fn read_asset(path: &Path, kind: &'static str) -> Option<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            debug!(
                target = "eventhub::pdf",
                kind,
                path = %path.display(),
                error = %err,
                "certificate asset unreadable; skipping"
            );
            None
        }
    }
}

fn decode_asset(bytes: &[u8], kind: &'static str) -> Option<DynamicImage> {
    match image::load_from_memory(bytes) {
        Ok(image) => Some(image),
        Err(err) => {
            debug!(
                target = "eventhub::pdf",
                kind,
                error = %err,
                "certificate asset could not be decoded; skipping"
            );
            None
        }
    }
}

fn build_document(
    layout: &Layout,
    template: Option<DynamicImage>,
    signature: Option<DynamicImage>,
) -> Result<Vec<u8>, RenderError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut fonts = lopdf::Dictionary::new();
    for font in [Font::Regular, Font::Bold] {
        let id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(font.resource(), id);
    }

    let mut xobjects = lopdf::Dictionary::new();
    let mut ops = Vec::new();

    match template {
        Some(background) => {
            let id = add_image(&mut doc, &background, false);
            xobjects.set("Bg", id);
            draw_image(&mut ops, "Bg", 0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT);
        }
        None => {
            ops.push(Operation::new("rg", vec![1.0f32.into(), 1.0f32.into(), 1.0f32.into()]));
            ops.push(Operation::new(
                "re",
                vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            ));
            ops.push(Operation::new("f", vec![]));
            centered_text(&mut ops, HEADING, Font::Bold, 18.0, 470.0, HEADING_COLOR);
        }
    }

    centered_text(&mut ops, &layout.name, Font::Bold, 28.0, 340.0, NAME_COLOR);
    centered_text(&mut ops, &layout.attending, Font::Regular, 16.0, 300.0, BODY_COLOR);
    centered_text(&mut ops, &layout.date, Font::Regular, 12.0, 270.0, BODY_COLOR);

    if let Some(signature) = signature {
        let id = add_image(&mut doc, &signature, true);
        xobjects.set("Sig", id);

        let height = SIGNATURE_WIDTH * signature.height() as f32 / signature.width().max(1) as f32;
        let x = (PAGE_WIDTH - SIGNATURE_WIDTH) / 2.0;
        draw_image(&mut ops, "Sig", x, SIGNATURE_BOTTOM, SIGNATURE_WIDTH, height);
        centered_text(
            &mut ops,
            "Organizer",
            Font::Regular,
            10.0,
            SIGNATURE_BOTTOM - 16.0,
            MUTED_COLOR,
        );
    }

    let mut resources = dictionary! { "Font" => fonts };
    if !xobjects.is_empty() {
        resources.set("XObject", xobjects);
    }
    let resources_id = doc.add_object(resources);

    let content = Content { operations: ops }
        .encode()
        .map_err(|err| RenderError::Encode(err.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|err| RenderError::Encode(err.to_string()))?;
    Ok(bytes)
}

/// Embed an image XObject; with `keep_alpha` the alpha channel becomes a soft mask.
fn add_image(doc: &mut Document, image: &DynamicImage, keep_alpha: bool) -> ObjectId {
    let (width, height) = (i64::from(image.width()), i64::from(image.height()));
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width,
        "Height" => height,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };

    let rgb = if keep_alpha && image.color().has_alpha() {
        let rgba = image.to_rgba8();
        let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
        let mut alpha = Vec::with_capacity(rgba.len() / 4);
        for pixel in rgba.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel.0[3]);
        }
        let mask_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        ));
        dict.set("SMask", mask_id);
        rgb
    } else {
        image.to_rgb8().into_raw()
    };

    doc.add_object(Stream::new(dict, rgb))
}

fn draw_image(ops: &mut Vec<Operation>, name: &str, x: f32, y: f32, width: f32, height: f32) {
    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new(
        "cm",
        vec![
            width.into(),
            0.into(),
            0.into(),
            height.into(),
            x.into(),
            y.into(),
        ],
    ));
    ops.push(Operation::new("Do", vec![name.into()]));
    ops.push(Operation::new("Q", vec![]));
}

fn centered_text(
    ops: &mut Vec<Operation>,
    text: &str,
    font: Font,
    size: f32,
    baseline: f32,
    color: Rgb,
) {
    let encoded = encode_win_ansi(text);
    let x = ((PAGE_WIDTH - text_width(&encoded, font, size)) / 2.0).max(0.0);

    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("rg", color.operands()));
    ops.push(Operation::new("Tf", vec![font.resource().into(), size.into()]));
    ops.push(Operation::new("Td", vec![x.into(), baseline.into()]));
    ops.push(Operation::new("Tj", vec![Object::string_literal(encoded)]));
    ops.push(Operation::new("ET", vec![]));
}

/// Map text onto WinAnsiEncoding bytes, substituting `?` for anything it cannot represent.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            ' '..='~' => ch as u8,
            '\u{a0}'..='\u{ff}' => ch as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            'Š' => 0x8a,
            'š' => 0x9a,
            'Œ' => 0x8c,
            'œ' => 0x9c,
            'Ž' => 0x8e,
            'ž' => 0x9e,
            'Ÿ' => 0x9f,
            _ => b'?',
        })
        .collect()
}

fn text_width(encoded: &[u8], font: Font, size: f32) -> f32 {
    let units: u32 = encoded
        .iter()
        .map(|byte| u32::from(glyph_width(*byte, font)))
        .sum();
    units as f32 * size / 1000.0
}

// Advance widths from the standard 14 font metrics, printable ASCII only.
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722, 722, 667,
    611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667,
    667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500,
    222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, 975, 722, 722, 722, 722, 667,
    611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667,
    667, 611, 333, 278, 333, 584, 556, 333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556,
    278, 889, 611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

fn glyph_width(byte: u8, font: Font) -> u16 {
    let table = match font {
        Font::Regular => &HELVETICA,
        Font::Bold => &HELVETICA_BOLD,
    };
    match byte {
        0x20..=0x7e => table[usize::from(byte - 0x20)],
        _ => 556,
    }
}
