use rqrr::PreparedImage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub payload: String,
}

/// Pure decode of an RGBA pixel buffer. `None` is a decode miss.
pub trait Decoder: Send {
    fn decode(&self, pixels: &[u8], width: u32, height: u32) -> Option<Decoded>;
}

/// QR decoding without inversion attempts.
#[derive(Debug, Default, Clone, Copy)]
pub struct QrDecoder;

impl Decoder for QrDecoder {
    fn decode(&self, pixels: &[u8], width: u32, height: u32) -> Option<Decoded> {
        let (w, h) = (width as usize, height as usize);
        if pixels.len() < w * h * 4 {
            return None;
        }
        let luma: Vec<u8> = pixels
            .chunks_exact(4)
            .take(w * h)
            .map(|px| ((px[0] as u32 * 299 + px[1] as u32 * 587 + px[2] as u32 * 114) / 1000) as u8)
            .collect();

        let mut prepared = PreparedImage::prepare_from_greyscale(w, h, |x, y| luma[y * w + x]);
        prepared
            .detect_grids()
            .into_iter()
            .filter_map(|grid| grid.decode().ok())
            .map(|(_, payload)| payload)
            .find(|payload| !payload.is_empty())
            .map(|payload| Decoded { payload })
    }
}
