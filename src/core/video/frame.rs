use super::error::CaptureError;

/// 分析分辨率，固定为小尺寸以降低每次 tick 的开销
pub const SAMPLE_WIDTH: u32 = 64;
pub const SAMPLE_HEIGHT: u32 = 64;

const LUMA_R: f64 = 0.299;
const LUMA_G: f64 = 0.587;
const LUMA_B: f64 = 0.114;

pub fn luma(r: u8, g: u8, b: u8) -> f64 {
    r as f64 * LUMA_R + g as f64 * LUMA_G + b as f64 * LUMA_B
}

/// 帧数据结构
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGBA 格式
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CaptureError> {
        check_rgba(width, height, &data)?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    pub fn resize_to(&self, target_width: u32, target_height: u32) -> Result<Frame, CaptureError> {
        if target_width == 0 || target_height == 0 {
            return Err(CaptureError::ZeroDimension {
                width: target_width,
                height: target_height,
            });
        }

        let img = image::RgbaImage::from_raw(self.width, self.height, self.data.clone()).ok_or(
            CaptureError::BufferSize {
                expected: self.pixel_count() * 4,
                actual: self.data.len(),
            },
        )?;
        let resized = image::imageops::resize(
            &img,
            target_width,
            target_height,
            image::imageops::FilterType::Triangle,
        );

        Ok(Frame {
            width: target_width,
            height: target_height,
            data: resized.into_raw(),
        })
    }
}

pub(crate) fn check_rgba(width: u32, height: u32, data: &[u8]) -> Result<(), CaptureError> {
    if width == 0 || height == 0 {
        return Err(CaptureError::ZeroDimension { width, height });
    }
    let expected = width as usize * height as usize * 4;
    if data.len() != expected {
        return Err(CaptureError::BufferSize {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

/// 单帧亮度网格，估计器只保留当前帧和上一帧
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSample {
    width: u32,
    height: u32,
    luma: Vec<f64>,
}

impl FrameSample {
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<Self, CaptureError> {
        check_rgba(width, height, rgba)?;
        let luma = rgba
            .chunks_exact(4)
            .map(|px| luma(px[0], px[1], px[2]))
            .collect();
        Ok(Self {
            width,
            height,
            luma,
        })
    }

    pub fn from_frame(frame: &Frame) -> Result<Self, CaptureError> {
        Self::from_rgba(frame.width, frame.height, &frame.data)
    }

    /// Y plane 本身就是亮度，按块平均下采样到目标尺寸，跳过 RGBA 转换
    pub fn from_y_plane(
        y_plane: &[u8],
        width: u32,
        height: u32,
        target_width: u32,
        target_height: u32,
    ) -> Result<Self, CaptureError> {
        if width == 0 || height == 0 {
            return Err(CaptureError::ZeroDimension { width, height });
        }
        if target_width == 0 || target_height == 0 {
            return Err(CaptureError::ZeroDimension {
                width: target_width,
                height: target_height,
            });
        }
        let expected = width as usize * height as usize;
        if y_plane.len() < expected {
            return Err(CaptureError::BufferSize {
                expected,
                actual: y_plane.len(),
            });
        }

        let w = width as usize;
        let h = height as usize;
        let tw = target_width as usize;
        let th = target_height as usize;

        let mut luma = Vec::with_capacity(tw * th);
        for by in 0..th {
            let y_start = by * h / th;
            let y_end = ((by + 1) * h / th).max(y_start + 1).min(h);
            for bx in 0..tw {
                let x_start = bx * w / tw;
                let x_end = ((bx + 1) * w / tw).max(x_start + 1).min(w);

                let mut block_sum = 0u64;
                let mut count = 0u64;
                for py in y_start..y_end {
                    let row_offset = py * w;
                    for px in x_start..x_end {
                        block_sum += y_plane[row_offset + px] as u64;
                        count += 1;
                    }
                }

                luma.push(if count > 0 {
                    block_sum as f64 / count as f64
                } else {
                    0.0
                });
            }
        }

        Ok(Self {
            width: target_width,
            height: target_height,
            luma,
        })
    }

    pub fn from_luma(width: u32, height: u32, luma: Vec<f64>) -> Result<Self, CaptureError> {
        if width == 0 || height == 0 {
            return Err(CaptureError::ZeroDimension { width, height });
        }
        let expected = width as usize * height as usize;
        if luma.len() != expected {
            return Err(CaptureError::BufferSize {
                expected,
                actual: luma.len(),
            });
        }
        Ok(Self {
            width,
            height,
            luma,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn luma(&self) -> &[f64] {
        &self.luma
    }

    /// Mean absolute luma difference in [0, 255]. `None` when the grids differ in size.
    pub fn mean_abs_diff(&self, other: &FrameSample) -> Option<f64> {
        if self.width != other.width || self.height != other.height || self.luma.is_empty() {
            return None;
        }

        let diff_sum: f64 = self
            .luma
            .iter()
            .zip(other.luma.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        Some(diff_sum / self.luma.len() as f64)
    }
}
