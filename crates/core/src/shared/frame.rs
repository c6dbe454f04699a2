use ndarray::ArrayView3;

/// A single decoded frame: contiguous RGB24 bytes in row-major order.
///
/// Pixel format conversion happens at the source boundary only; everything
/// downstream treats the buffer as opaque RGB. A frame is owned by exactly
/// one pipeline stage at a time and cloned when it crosses the handoff
/// queue, so no pixel data is ever shared between threads.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: u64,
}

impl Frame {
    /// Bytes per pixel; frames are always RGB24.
    pub const CHANNELS: usize = 3;

    pub fn new(data: Vec<u8>, width: u32, height: u32, index: u64) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * Self::CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consumes the frame, returning the raw pixel buffer.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sequence index assigned by the source, monotonically increasing
    /// within one playback run.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// (height, width, channels) view for inference preprocessing.
    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        let shape = (
            self.height as usize,
            self.width as usize,
            Self::CHANNELS,
        );
        ArrayView3::from_shape(shape, &self.data)
            .expect("frame data length must match dimensions")
    }
}
