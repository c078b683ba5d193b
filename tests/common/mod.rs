// Shared fixture builders. Every test PDF is generated in memory with lopdf.
#![allow(dead_code)]

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use lopdf::{Dictionary, Document, Object, Stream, dictionary};

/// One entry of a page's /XObject resource dictionary.
#[derive(Debug, Clone)]
pub enum Fixture {
    /// Real JPEG bytes behind /DCTDecode.
    Jpeg { width: u32, height: u32 },
    /// 8-bit DeviceGray samples behind /FlateDecode.
    FlateGray { width: u32, height: u32 },
    /// 8-bit DeviceRGB samples, unfiltered.
    RawRgb { width: u32, height: u32 },
    /// /FlateDecode whose payload is not zlib data.
    CorruptFlate { width: u32, height: u32 },
    /// /CCITTFaxDecode payload (not decoded).
    Ccitt { width: u32, height: u32 },
    /// A form XObject, never an image.
    Form,
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let rgb: Vec<u8> = (0..width * height)
        .flat_map(|i| [(i % 256) as u8, 90, 200])
        .collect();
    let mut buf = Vec::new();
    JpegEncoder::new(&mut buf)
        .encode(&rgb, width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

fn image_dict(width: u32, height: u32, color_space: &str) -> Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
    }
}

pub fn fixture_stream(fixture: &Fixture) -> Stream {
    match *fixture {
        Fixture::Jpeg { width, height } => {
            let mut dict = image_dict(width, height, "DeviceRGB");
            dict.set("Filter", "DCTDecode");
            Stream::new(dict, jpeg_bytes(width, height))
        }
        Fixture::FlateGray { width, height } => {
            let mut dict = image_dict(width, height, "DeviceGray");
            dict.set("Filter", "FlateDecode");
            let samples: Vec<u8> = (0..width * height).map(|i| (i * 7 % 256) as u8).collect();
            Stream::new(dict, zlib(&samples))
        }
        Fixture::RawRgb { width, height } => {
            let dict = image_dict(width, height, "DeviceRGB");
            Stream::new(dict, vec![0x40; (width * height * 3) as usize])
        }
        Fixture::CorruptFlate { width, height } => {
            let mut dict = image_dict(width, height, "DeviceGray");
            dict.set("Filter", "FlateDecode");
            Stream::new(dict, b"this is definitely not zlib".to_vec())
        }
        Fixture::Ccitt { width, height } => {
            let mut dict = image_dict(width, height, "DeviceGray");
            dict.set("BitsPerComponent", 1);
            dict.set("Filter", "CCITTFaxDecode");
            Stream::new(dict, vec![0x00, 0x01, 0x02])
        }
        Fixture::Form => Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(10), Object::Integer(10)],
            },
            b"0 0 m 10 10 l S".to_vec(),
        ),
    }
}

/// Build a document with one page per entry; each page's XObjects are named
/// `Im0`, `Im1`, ... in the given order.
pub fn build_document(pages: &[Vec<Fixture>]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for fixtures in pages {
        let mut xobjects = Dictionary::new();
        for (i, fixture) in fixtures.iter().enumerate() {
            let id = doc.add_object(fixture_stream(fixture));
            xobjects.set(format!("Im{i}"), id);
        }
        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
            "Contents" => content_id,
            "Resources" => dictionary! { "XObject" => xobjects },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

pub fn save(doc: &mut Document) -> Vec<u8> {
    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

pub fn build_pdf(pages: &[Vec<Fixture>]) -> Vec<u8> {
    save(&mut build_document(pages))
}

/// 3 pages with 2 + 1 + 2 images (mixed encodings) and one form XObject.
pub fn three_page_five_images() -> Vec<u8> {
    build_pdf(&[
        vec![
            Fixture::Jpeg { width: 16, height: 8 },
            Fixture::FlateGray { width: 4, height: 4 },
        ],
        vec![Fixture::Form, Fixture::RawRgb { width: 3, height: 2 }],
        vec![
            Fixture::Jpeg { width: 8, height: 8 },
            Fixture::FlateGray { width: 2, height: 5 },
        ],
    ])
}

pub fn catalog(doc: &Document) -> &Dictionary {
    doc.catalog().unwrap()
}

pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap(),
        other => other,
    }
}

pub fn info(doc: &Document) -> &Dictionary {
    let info = doc.trailer.get(b"Info").unwrap();
    resolve(doc, info).as_dict().unwrap()
}

/// Decoded text of a string entry.
pub fn text(dict: &Dictionary, key: &[u8]) -> String {
    match dict.get(key).unwrap() {
        Object::String(bytes, _) => {
            if bytes.starts_with(&[0xFE, 0xFF]) {
                let units: Vec<u16> = bytes[2..]
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16(&units).unwrap()
            } else {
                String::from_utf8(bytes.clone()).unwrap()
            }
        }
        other => panic!("expected string, got {other:?}"),
    }
}

/// Alt texts of the Figure children of StructTreeRoot -> Document, in order.
pub fn figure_alt_texts(doc: &Document) -> Vec<String> {
    let root = resolve(doc, catalog(doc).get(b"StructTreeRoot").unwrap())
        .as_dict()
        .unwrap();
    let document = resolve(doc, root.get(b"K").unwrap()).as_dict().unwrap();
    assert_eq!(document.get(b"S").unwrap().as_name().unwrap(), b"Document");
    document
        .get(b"K")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|kid| {
            let figure = resolve(doc, kid).as_dict().unwrap();
            assert_eq!(figure.get(b"S").unwrap().as_name().unwrap(), b"Figure");
            text(figure, b"Alt")
        })
        .collect()
}
