// Phase 3: 画像XObjectのメタデータ読み取りと表示可能な形式へのデコード

use std::io::Read;

use flate2::read::ZlibDecoder;
use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Object, Stream};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::data_url::{data_url, raw_data_url};
use crate::codec::png::encode_rgba_png;
use crate::error::A11yError;
use crate::pdf::object_to_i64;
use crate::pdf::reader::PdfReader;

/// フィルタ展開後のサンプルデータの上限（256 MiB）
const MAX_DECODED_LEN: usize = 256 * 1024 * 1024;

/// /DecodeParms /Colors の上限（DeviceNの最大成分数）
const MAX_PREDICTOR_COLORS: usize = 32;

/// 抽出した画像バイト列の形式タグ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// DCTDecodeのペイロードをそのまま使用
    Jpeg,
    /// JPXDecodeのペイロードをそのまま使用
    Jpeg2000,
    /// 生サンプルをデコードしてPNGに再エンコード
    Png,
    /// PNG化に失敗した生RGBA（寸法付きdata URL）
    Raw,
    /// 未対応のフィルタ・色空間（インラインデータなし）
    Unsupported,
}

/// 画像XObjectの色空間
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    Indexed {
        base: Box<ColorSpace>,
        hival: u8,
        lookup: Vec<u8>,
    },
    Unsupported(String),
}

impl ColorSpace {
    fn components(&self) -> Option<usize> {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed { .. } => Some(1),
            ColorSpace::Rgb => Some(3),
            ColorSpace::Cmyk => Some(4),
            ColorSpace::Unsupported(_) => None,
        }
    }
}

/// FlateDecodeの/DecodeParms（PNG予測子）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorParams {
    pub predictor: i64,
    pub colors: usize,
    pub bits_per_component: usize,
    pub columns: usize,
}

/// 画像XObjectのメタデータ
#[derive(Debug, Clone)]
pub struct ImageMeta {
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    pub color_space: ColorSpace,
    /// フィルタ連鎖（適用順）
    pub filters: Vec<String>,
    /// フィルタごとのPNG予測子パラメータ
    pub predictors: Vec<Option<PredictorParams>>,
    /// /Decode [1 0] による階調反転
    pub inverted: bool,
}

/// 表示可能な形に変換した画像
#[derive(Debug, Clone)]
pub struct DisplayImage {
    pub format: ImageFormat,
    pub data_url: Option<String>,
    /// 最終段のフィルタ名（フィルタなしは`None`）
    pub filter: Option<String>,
}

/// オブジェクトが`/Subtype /Image`のストリームならそのストリームを返す。
///
/// フォームXObjectやフォント等は`None`。
pub fn as_image_stream(object: &Object) -> Option<&Stream> {
    let Object::Stream(stream) = object else {
        return None;
    };
    match stream.dict.get(b"Subtype").and_then(Object::as_name) {
        Ok(b"Image") => Some(stream),
        _ => None,
    }
}

/// 宣言された/Widthと/Heightが共に正の整数なら返す。
pub fn declared_dimensions(reader: &PdfReader, dict: &Dictionary) -> Option<(u32, u32)> {
    let dim = |key: &[u8]| {
        reader
            .dict_get(dict, key)
            .and_then(object_to_i64)
            .filter(|v| *v > 0 && *v <= u32::MAX as i64)
            .map(|v| v as u32)
    };
    Some((dim(b"Width")?, dim(b"Height")?))
}

/// 画像XObjectのストリーム辞書からメタデータを読み取る。
pub fn read_image_meta(reader: &PdfReader, stream: &Stream) -> crate::error::Result<ImageMeta> {
    let dict = &stream.dict;

    let (width, height) = declared_dimensions(reader, dict)
        .ok_or_else(|| A11yError::image_xobject("Width/Height must be positive integers"))?;

    let is_mask = reader
        .dict_get(dict, b"ImageMask")
        .and_then(|o| o.as_bool().ok())
        .unwrap_or(false);

    // BitsPerComponent: ImageMaskは常に1、キーなしはデフォルト8
    let bits_per_component = if is_mask {
        1
    } else {
        match reader.dict_get(dict, b"BitsPerComponent") {
            Some(obj) => match object_to_i64(obj) {
                Some(v @ (1 | 2 | 4 | 8 | 16)) => v as u8,
                _ => {
                    return Err(A11yError::image_xobject(format!(
                        "Invalid BitsPerComponent: {:?}",
                        obj
                    )));
                }
            },
            None => 8,
        }
    };

    let color_space = if is_mask {
        ColorSpace::Gray
    } else {
        match reader.dict_get(dict, b"ColorSpace") {
            Some(obj) => parse_color_space(reader, obj),
            None => ColorSpace::Gray,
        }
    };

    let filters = read_filters(reader, dict)?;
    let predictors = read_predictors(reader, dict, filters.len());

    // ImageMaskはサンプル0が描画（黒）なので、/Decode [1 0]のとき反転
    let decode_inverted = reader
        .dict_get(dict, b"Decode")
        .and_then(|o| o.as_array().ok())
        .and_then(|arr| Some((object_to_i64(arr.first()?)?, object_to_i64(arr.get(1)?)?)))
        .is_some_and(|pair| pair == (1, 0));

    Ok(ImageMeta {
        width,
        height,
        bits_per_component,
        color_space,
        filters,
        predictors,
        inverted: decode_inverted,
    })
}

fn read_filters(reader: &PdfReader, dict: &Dictionary) -> crate::error::Result<Vec<String>> {
    let name_of = |obj: &Object| -> crate::error::Result<String> {
        match reader.deref(obj) {
            Some(Object::Name(name)) => Ok(String::from_utf8_lossy(name).into_owned()),
            other => Err(A11yError::image_xobject(format!(
                "Filter entry is not a name: {:?}",
                other
            ))),
        }
    };

    match reader.dict_get(dict, b"Filter") {
        None | Some(Object::Null) => Ok(Vec::new()),
        Some(Object::Array(arr)) => arr.iter().map(name_of).collect(),
        Some(obj) => Ok(vec![name_of(obj)?]),
    }
}

fn read_predictors(
    reader: &PdfReader,
    dict: &Dictionary,
    filter_count: usize,
) -> Vec<Option<PredictorParams>> {
    let parse = |obj: &Object| -> Option<PredictorParams> {
        let Some(Object::Dictionary(parms)) = reader.deref(obj) else {
            return None;
        };
        let get = |key: &[u8], default: i64| {
            reader
                .dict_get(parms, key)
                .and_then(object_to_i64)
                .unwrap_or(default)
        };
        let predictor = get(b"Predictor", 1);
        if predictor <= 1 {
            return None;
        }
        Some(PredictorParams {
            predictor,
            colors: get(b"Colors", 1).max(1) as usize,
            bits_per_component: get(b"BitsPerComponent", 8).max(1) as usize,
            columns: get(b"Columns", 1).max(1) as usize,
        })
    };

    match reader.dict_get(dict, b"DecodeParms") {
        Some(Object::Array(arr)) => (0..filter_count)
            .map(|i| arr.get(i).and_then(parse))
            .collect(),
        Some(obj) => {
            let mut v = vec![None; filter_count];
            if let Some(first) = v.first_mut() {
                *first = parse(obj);
            }
            v
        }
        None => vec![None; filter_count],
    }
}

/// /ColorSpaceオブジェクトを解釈する。
fn parse_color_space(reader: &PdfReader, obj: &Object) -> ColorSpace {
    match obj {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => ColorSpace::Gray,
            b"DeviceRGB" | b"CalRGB" | b"RGB" => ColorSpace::Rgb,
            b"DeviceCMYK" | b"CMYK" => ColorSpace::Cmyk,
            other => ColorSpace::Unsupported(String::from_utf8_lossy(other).into_owned()),
        },
        Object::Array(arr) => {
            let family = arr
                .first()
                .and_then(|o| reader.deref(o))
                .and_then(|o| o.as_name().ok());
            match family {
                Some(b"ICCBased") => {
                    let n = arr
                        .get(1)
                        .and_then(|o| reader.deref(o))
                        .and_then(|o| o.as_stream().ok())
                        .and_then(|s| reader.dict_get(&s.dict, b"N"))
                        .and_then(object_to_i64);
                    match n {
                        Some(1) => ColorSpace::Gray,
                        Some(3) => ColorSpace::Rgb,
                        Some(4) => ColorSpace::Cmyk,
                        _ => ColorSpace::Unsupported("ICCBased".to_string()),
                    }
                }
                Some(b"CalGray") => ColorSpace::Gray,
                Some(b"CalRGB") => ColorSpace::Rgb,
                Some(b"Indexed" | b"I") => parse_indexed(reader, arr),
                Some(other) => ColorSpace::Unsupported(String::from_utf8_lossy(other).into_owned()),
                None => ColorSpace::Unsupported("empty color space array".to_string()),
            }
        }
        other => ColorSpace::Unsupported(format!("{:?}", crate::pdf::kind_of(other))),
    }
}

/// `[/Indexed base hival lookup]`を解釈する。
fn parse_indexed(reader: &PdfReader, arr: &[Object]) -> ColorSpace {
    let base = match arr.get(1).and_then(|o| reader.deref(o)) {
        Some(obj) => parse_color_space(reader, obj),
        None => return ColorSpace::Unsupported("Indexed without base".to_string()),
    };
    if !matches!(base, ColorSpace::Gray | ColorSpace::Rgb | ColorSpace::Cmyk) {
        return ColorSpace::Unsupported("Indexed with unsupported base".to_string());
    }
    let hival = match arr.get(2).and_then(|o| reader.deref(o)).and_then(object_to_i64) {
        Some(v @ 0..=255) => v as u8,
        _ => return ColorSpace::Unsupported("Indexed hival out of range".to_string()),
    };
    let lookup = match arr.get(3).and_then(|o| reader.deref(o)) {
        Some(Object::String(bytes, _)) => bytes.clone(),
        Some(Object::Stream(s)) => match s.decompressed_content() {
            Ok(content) => content,
            Err(_) => s.content.clone(),
        },
        _ => return ColorSpace::Unsupported("Indexed without lookup".to_string()),
    };
    ColorSpace::Indexed {
        base: Box::new(base),
        hival,
        lookup,
    }
}

/// 画像XObjectを表示可能な形式に変換する。
///
/// - 最終段がDCTDecode: JPEGバイト列をそのまま使用（SOIマーカー必須）
/// - 最終段がJPXDecode: JPEG 2000バイト列をそのまま使用
/// - FlateDecode / フィルタなし: 生サンプルをRGBAに展開しPNG化
/// - それ以外: `ImageFormat::Unsupported`（データなし）
///
/// ストリームが壊れている場合はエラー（呼び出し側でその画像だけスキップする）。
pub fn decode_image(reader: &PdfReader, stream: &Stream) -> crate::error::Result<DisplayImage> {
    let meta = read_image_meta(reader, stream)?;
    let last_filter = meta.filters.last().cloned();

    let limit = decoded_len_limit(&meta)?;
    let mut data = stream.content.clone();
    for (i, filter) in meta.filters.iter().enumerate() {
        let is_last = i + 1 == meta.filters.len();
        match filter.as_str() {
            "FlateDecode" | "Fl" => {
                data = inflate(&data, limit)?;
                if let Some(params) = meta.predictors.get(i).copied().flatten() {
                    data = undo_png_predictor(&data, &params)?;
                }
            }
            "DCTDecode" | "DCT" if is_last => {
                if !data.starts_with(&[0xFF, 0xD8]) {
                    return Err(A11yError::image_xobject(
                        "DCTDecode payload does not start with a JPEG SOI marker",
                    ));
                }
                return Ok(DisplayImage {
                    format: ImageFormat::Jpeg,
                    data_url: Some(data_url("image/jpeg", &data)),
                    filter: last_filter,
                });
            }
            "JPXDecode" if is_last => {
                return Ok(DisplayImage {
                    format: ImageFormat::Jpeg2000,
                    data_url: Some(data_url("image/jp2", &data)),
                    filter: last_filter,
                });
            }
            other => {
                debug!(filter = other, "image filter not decoded");
                return Ok(unsupported(last_filter));
            }
        }
    }

    if let ColorSpace::Unsupported(name) = &meta.color_space {
        debug!(color_space = %name, "image color space not decoded");
        return Ok(unsupported(last_filter));
    }

    let mut rgba = samples_to_rgba(&data, &meta)?;
    if let Some(alpha) = read_soft_mask(reader, stream, &meta) {
        for (pixel, a) in rgba.chunks_exact_mut(4).zip(alpha) {
            pixel[3] = a;
        }
    }

    let display = match encode_rgba_png(meta.width, meta.height, &rgba) {
        Ok(png) => DisplayImage {
            format: ImageFormat::Png,
            data_url: Some(data_url("image/png", &png)),
            filter: last_filter,
        },
        Err(e) => {
            tracing::warn!(error = %e, "PNG encoding failed, falling back to raw samples");
            DisplayImage {
                format: ImageFormat::Raw,
                data_url: Some(raw_data_url(meta.width, meta.height, &rgba)),
                filter: last_filter,
            }
        }
    };
    Ok(display)
}

fn unsupported(filter: Option<String>) -> DisplayImage {
    DisplayImage {
        format: ImageFormat::Unsupported,
        data_url: None,
        filter,
    }
}

/// 宣言された寸法から、展開後に必要なバイト数の上限を求める。
///
/// 各行に予測子のフィルタバイトが1つ付く場合も含む。色空間が未対応なら
/// 4成分として見積もる。
fn decoded_len_limit(meta: &ImageMeta) -> crate::error::Result<usize> {
    let ncomp = meta.color_space.components().unwrap_or(4);
    (meta.width as usize)
        .checked_mul(ncomp)
        .and_then(|samples| samples.checked_mul(meta.bits_per_component as usize))
        .map(|bits| bits.div_ceil(8) + 1)
        .and_then(|row| row.checked_mul(meta.height as usize))
        .filter(|len| *len <= MAX_DECODED_LEN)
        .ok_or_else(|| {
            A11yError::image_xobject(format!(
                "Image too large to decode: {}x{}",
                meta.width, meta.height
            ))
        })
}

/// zlibで伸張する。`limit`バイトを超える分は読まない。
fn inflate(data: &[u8], limit: usize) -> crate::error::Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .take(limit as u64)
        .read_to_end(&mut out)
        .map_err(|e| A11yError::image_xobject(format!("FlateDecode error: {}", e)))?;
    Ok(out)
}

/// PNG予測子（Predictor >= 10）を元に戻す。TIFF予測子(2)は未対応。
fn undo_png_predictor(data: &[u8], params: &PredictorParams) -> crate::error::Result<Vec<u8>> {
    if params.predictor < 10 {
        return Err(A11yError::image_xobject(format!(
            "Unsupported predictor: {}",
            params.predictor
        )));
    }

    if params.colors > MAX_PREDICTOR_COLORS
        || !matches!(params.bits_per_component, 1 | 2 | 4 | 8 | 16)
    {
        return Err(A11yError::image_xobject(format!(
            "Invalid predictor parameters: Colors {} BitsPerComponent {}",
            params.colors, params.bits_per_component
        )));
    }

    // 行長はデータ長を超えない（巨大な/Columnsで確保しない）
    let bits_per_pixel = params
        .colors
        .checked_mul(params.bits_per_component)
        .ok_or_else(|| A11yError::image_xobject("Overflow computing predictor pixel size"))?;
    let bpp = bits_per_pixel.div_ceil(8).max(1);
    let row_len = params
        .columns
        .checked_mul(bits_per_pixel)
        .map(|bits| bits.div_ceil(8))
        .filter(|len| *len < data.len())
        .ok_or_else(|| {
            A11yError::image_xobject(format!(
                "Predictor row of {} columns does not fit {} bytes of data",
                params.columns,
                data.len()
            ))
        })?;

    let mut out = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; row_len];
    for chunk in data.chunks(row_len + 1) {
        if chunk.len() < row_len + 1 {
            // 末尾の不完全な行は捨てる
            break;
        }
        let filter_type = chunk[0];
        let mut row = chunk[1..].to_vec();
        for x in 0..row_len {
            let left = if x >= bpp { row[x - bpp] } else { 0 };
            let up = prev[x];
            let up_left = if x >= bpp { prev[x - bpp] } else { 0 };
            row[x] = match filter_type {
                0 => row[x],
                1 => row[x].wrapping_add(left),
                2 => row[x].wrapping_add(up),
                3 => row[x].wrapping_add(((left as u16 + up as u16) / 2) as u8),
                4 => row[x].wrapping_add(paeth(left, up, up_left)),
                other => {
                    return Err(A11yError::image_xobject(format!(
                        "Invalid PNG predictor row filter: {}",
                        other
                    )));
                }
            };
        }
        out.extend_from_slice(&row);
        prev = row;
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// 1行分のパック済みサンプルを取り出す（1/2/4/8/16 bit）。
fn unpack_row(row: &[u8], count: usize, bpc: u8, out: &mut Vec<u16>) {
    match bpc {
        8 => out.extend(row[..count].iter().map(|&b| b as u16)),
        16 => out.extend(
            row[..count * 2]
                .chunks_exact(2)
                .map(|p| u16::from_be_bytes([p[0], p[1]])),
        ),
        _ => {
            let bpc = bpc as usize;
            let mask = (1u16 << bpc) - 1;
            for i in 0..count {
                let bit = i * bpc;
                let byte = row[bit / 8] as u16;
                let shift = 8 - bpc - (bit % 8);
                out.push((byte >> shift) & mask);
            }
        }
    }
}

/// 生サンプルをRGBA（8bit×4）に展開する。
fn samples_to_rgba(data: &[u8], meta: &ImageMeta) -> crate::error::Result<Vec<u8>> {
    let ncomp = meta.color_space.components().ok_or_else(|| {
        A11yError::image_xobject(format!("Unsupported color space: {:?}", meta.color_space))
    })?;
    let w = meta.width as usize;
    let h = meta.height as usize;
    let bpc = meta.bits_per_component;

    let samples_per_row = w
        .checked_mul(ncomp)
        .ok_or_else(|| A11yError::image_xobject("Overflow computing row size"))?;
    let row_bytes = (samples_per_row * bpc as usize).div_ceil(8);
    let expected = row_bytes
        .checked_mul(h)
        .ok_or_else(|| A11yError::image_xobject("Overflow computing image size"))?;
    if data.len() < expected {
        return Err(A11yError::image_xobject(format!(
            "Image data too short: expected {}, got {}",
            expected,
            data.len()
        )));
    }

    let mut samples: Vec<u16> = Vec::with_capacity(samples_per_row * h);
    for row in data[..expected].chunks_exact(row_bytes) {
        unpack_row(row, samples_per_row, bpc, &mut samples);
    }

    let max = (1u32 << bpc) - 1;
    let scale = |v: u16| -> u8 {
        let v = (v as u32 * 255 + max / 2) / max;
        v as u8
    };

    let dynamic = match &meta.color_space {
        ColorSpace::Gray => {
            let gray: Vec<u8> = samples
                .iter()
                .map(|&v| {
                    let g = scale(v);
                    if meta.inverted { 255 - g } else { g }
                })
                .collect();
            DynamicImage::ImageLuma8(gray_image(meta, gray)?)
        }
        ColorSpace::Rgb => {
            let rgb: Vec<u8> = samples.iter().map(|&v| scale(v)).collect();
            DynamicImage::ImageRgb8(rgb_image(meta, rgb)?)
        }
        ColorSpace::Cmyk => {
            let rgb: Vec<u8> = samples
                .chunks_exact(4)
                .flat_map(|c| cmyk_to_rgb(scale(c[0]), scale(c[1]), scale(c[2]), scale(c[3])))
                .collect();
            DynamicImage::ImageRgb8(rgb_image(meta, rgb)?)
        }
        ColorSpace::Indexed {
            base,
            hival,
            lookup,
        } => {
            let base_comp = base.components().unwrap_or(3);
            let rgb: Vec<u8> = samples
                .iter()
                .flat_map(|&idx| {
                    let idx = (idx as usize).min(*hival as usize);
                    let entry = lookup
                        .get(idx * base_comp..(idx + 1) * base_comp)
                        .unwrap_or(&[]);
                    match (base.as_ref(), entry) {
                        (ColorSpace::Gray, [g]) => [*g, *g, *g],
                        (ColorSpace::Rgb, [r, g, b]) => [*r, *g, *b],
                        (ColorSpace::Cmyk, [c, m, y, k]) => cmyk_to_rgb(*c, *m, *y, *k),
                        _ => [0, 0, 0],
                    }
                })
                .collect();
            DynamicImage::ImageRgb8(rgb_image(meta, rgb)?)
        }
        ColorSpace::Unsupported(name) => {
            return Err(A11yError::image_xobject(format!(
                "Unsupported color space: {}",
                name
            )));
        }
    };

    Ok(dynamic.to_rgba8().into_raw())
}

fn gray_image(meta: &ImageMeta, data: Vec<u8>) -> crate::error::Result<GrayImage> {
    GrayImage::from_raw(meta.width, meta.height, data)
        .ok_or_else(|| A11yError::image_xobject("Failed to create Gray image from raw data"))
}

fn rgb_image(meta: &ImageMeta, data: Vec<u8>) -> crate::error::Result<RgbImage> {
    RgbImage::from_raw(meta.width, meta.height, data)
        .ok_or_else(|| A11yError::image_xobject("Failed to create RGB image from raw data"))
}

fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let inv_k = 255 - k as u16;
    let channel = |v: u8| ((255 - v as u16) * inv_k / 255) as u8;
    [channel(c), channel(m), channel(y)]
}

/// /SMaskをアルファチャンネルとして読み取る。
///
/// 寸法が一致するグレースケール画像のときのみ使用し、それ以外は無視する。
fn read_soft_mask(reader: &PdfReader, stream: &Stream, meta: &ImageMeta) -> Option<Vec<u8>> {
    let smask = reader
        .dict_get(&stream.dict, b"SMask")
        .and_then(as_image_stream)?;
    let smask_meta = match read_image_meta(reader, smask) {
        Ok(m) => m,
        Err(e) => {
            debug!(error = %e, "ignoring unreadable SMask");
            return None;
        }
    };
    if (smask_meta.width, smask_meta.height) != (meta.width, meta.height)
        || smask_meta.color_space != ColorSpace::Gray
    {
        debug!("ignoring SMask with mismatched geometry or color space");
        return None;
    }

    let limit = decoded_len_limit(&smask_meta).ok()?;
    let mut data = smask.content.clone();
    for (i, filter) in smask_meta.filters.iter().enumerate() {
        if !matches!(filter.as_str(), "FlateDecode" | "Fl") {
            debug!(filter = %filter, "ignoring SMask with unsupported filter");
            return None;
        }
        data = inflate(&data, limit).ok()?;
        if let Some(params) = smask_meta.predictors.get(i).copied().flatten() {
            data = undo_png_predictor(&data, &params).ok()?;
        }
    }

    let rgba = samples_to_rgba(&data, &smask_meta).ok()?;
    Some(rgba.chunks_exact(4).map(|p| p[0]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use lopdf::{Document, dictionary};
    use std::io::Write;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    /// テスト用: 1ページ・空のPDFをリーダーとして用意する
    fn empty_reader() -> PdfReader {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => Vec::<Object>::new(),
                "Count" => 0,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        PdfReader::from_document(doc).expect("reader")
    }

    fn image_dict(width: i64, height: i64, cs: &str, filter: Option<&str>) -> Dictionary {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => cs,
            "BitsPerComponent" => 8,
        };
        if let Some(f) = filter {
            dict.set("Filter", f);
        }
        dict
    }

    #[test]
    fn test_as_image_stream_rejects_forms() {
        let form = Object::Stream(Stream::new(
            dictionary! { "Type" => "XObject", "Subtype" => "Form" },
            vec![],
        ));
        assert!(as_image_stream(&form).is_none());
        assert!(as_image_stream(&Object::Integer(1)).is_none());
    }

    #[test]
    fn test_declared_dimensions_rejects_zero() {
        let reader = empty_reader();
        let dict = image_dict(0, 10, "DeviceRGB", None);
        assert_eq!(declared_dimensions(&reader, &dict), None);
        let dict = image_dict(4, 10, "DeviceRGB", None);
        assert_eq!(declared_dimensions(&reader, &dict), Some((4, 10)));
    }

    #[test]
    fn test_dct_passthrough() {
        let reader = empty_reader();
        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        let stream = Stream::new(image_dict(2, 2, "DeviceRGB", Some("DCTDecode")), jpeg);
        let img = decode_image(&reader, &stream).expect("decode");
        assert_eq!(img.format, ImageFormat::Jpeg);
        assert_eq!(img.filter.as_deref(), Some("DCTDecode"));
        assert!(img.data_url.unwrap().starts_with("data:image/jpeg;base64,/9j/"));
    }

    #[test]
    fn test_dct_without_soi_is_error() {
        let reader = empty_reader();
        let stream = Stream::new(
            image_dict(2, 2, "DeviceRGB", Some("DCTDecode")),
            b"garbage".to_vec(),
        );
        assert!(decode_image(&reader, &stream).is_err());
    }

    #[test]
    fn test_flate_rgb_becomes_png() {
        let reader = empty_reader();
        let raw: Vec<u8> = [10u8, 20, 30].repeat(6);
        let stream = Stream::new(image_dict(3, 2, "DeviceRGB", Some("FlateDecode")), zlib(&raw));
        let img = decode_image(&reader, &stream).expect("decode");
        assert_eq!(img.format, ImageFormat::Png);

        let url = img.data_url.unwrap();
        let payload = crate::codec::data_url::base64_payload(&url);
        use base64::Engine as _;
        let png = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(2, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_corrupt_flate_is_error() {
        let reader = empty_reader();
        let stream = Stream::new(
            image_dict(3, 2, "DeviceRGB", Some("FlateDecode")),
            vec![0x00, 0x01, 0x02, 0x03],
        );
        assert!(decode_image(&reader, &stream).is_err());
    }

    #[test]
    fn test_ccitt_is_marked_unsupported() {
        let reader = empty_reader();
        let stream = Stream::new(
            image_dict(8, 8, "DeviceGray", Some("CCITTFaxDecode")),
            vec![0u8; 4],
        );
        let img = decode_image(&reader, &stream).expect("decode");
        assert_eq!(img.format, ImageFormat::Unsupported);
        assert!(img.data_url.is_none());
        assert_eq!(img.filter.as_deref(), Some("CCITTFaxDecode"));
    }

    #[test]
    fn test_one_bit_gray_unpacks() {
        let reader = empty_reader();
        let mut dict = image_dict(8, 1, "DeviceGray", None);
        dict.set("BitsPerComponent", 1);
        let stream = Stream::new(dict, vec![0b1010_0000]);
        let meta = read_image_meta(&reader, &stream).expect("meta");
        let rgba = samples_to_rgba(&stream.content, &meta).expect("rgba");
        let gray: Vec<u8> = rgba.chunks_exact(4).map(|p| p[0]).collect();
        assert_eq!(gray, vec![255, 0, 255, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_indexed_lookup() {
        let reader = empty_reader();
        let mut dict = image_dict(2, 1, "DeviceRGB", None);
        dict.set(
            "ColorSpace",
            vec![
                Object::Name(b"Indexed".to_vec()),
                Object::Name(b"DeviceRGB".to_vec()),
                Object::Integer(1),
                Object::string_literal(vec![255u8, 0, 0, 0, 0, 255]),
            ],
        );
        let stream = Stream::new(dict, vec![1, 0]);
        let meta = read_image_meta(&reader, &stream).expect("meta");
        let rgba = samples_to_rgba(&stream.content, &meta).expect("rgba");
        assert_eq!(rgba, vec![0, 0, 255, 255, 255, 0, 0, 255]);
    }

    #[test]
    fn test_png_up_predictor() {
        let params = PredictorParams {
            predictor: 12,
            colors: 1,
            bits_per_component: 8,
            columns: 3,
        };
        // 1行目: None, 2行目: Up
        let data = vec![0, 1, 2, 3, 2, 1, 1, 1];
        let out = undo_png_predictor(&data, &params).expect("unpredict");
        assert_eq!(out, vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_predictor_rejects_oversized_rows() {
        let data = vec![0u8; 8];
        let huge = |colors: usize, columns: usize| PredictorParams {
            predictor: 12,
            colors,
            bits_per_component: 8,
            columns,
        };
        assert!(undo_png_predictor(&data, &huge(1 << 40, 1 << 40)).is_err());
        assert!(undo_png_predictor(&data, &huge(1, i64::MAX as usize)).is_err());
        assert!(undo_png_predictor(&data, &huge(1, 1 << 20)).is_err());
    }

    #[test]
    fn test_inflate_stops_at_limit() {
        let bomb = zlib(&vec![0u8; 1 << 16]);
        let out = inflate(&bomb, 100).expect("inflate");
        assert_eq!(out.len(), 100);
    }

    #[test]
    fn test_declared_size_over_limit_is_error() {
        let reader = empty_reader();
        let stream = Stream::new(
            image_dict(1 << 20, 1 << 20, "DeviceRGB", Some("FlateDecode")),
            zlib(&[0u8; 4]),
        );
        assert!(decode_image(&reader, &stream).is_err());
    }

    #[test]
    fn test_cmyk_conversion() {
        assert_eq!(cmyk_to_rgb(0, 0, 0, 0), [255, 255, 255]);
        assert_eq!(cmyk_to_rgb(0, 0, 0, 255), [0, 0, 0]);
        assert_eq!(cmyk_to_rgb(255, 0, 0, 0), [0, 255, 255]);
    }
}
