//! Core viewer primitives shared across asset pipelines.

pub mod logging;

pub mod types {
    use serde::{Deserialize, Serialize};

    /// A decoded RGBA8 image, 4 bytes per pixel, row-major.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Texture {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u8>,
    }

    impl Texture {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height * 4) as usize],
            }
        }

        /// RGBA of one pixel; None when out of bounds.
        pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
            if x >= self.width || y >= self.height {
                return None;
            }
            let i = ((y * self.width + x) * 4) as usize;
            Some([
                self.pixels[i],
                self.pixels[i + 1],
                self.pixels[i + 2],
                self.pixels[i + 3],
            ])
        }

        pub fn put_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
            if x >= self.width || y >= self.height {
                return;
            }
            let i = ((y * self.width + x) * 4) as usize;
            self.pixels[i..i + 4].copy_from_slice(&rgba);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::types::Texture;

    #[test]
    fn test_texture_creation() {
        let tex = Texture::new(8, 4);
        assert_eq!(tex.width, 8);
        assert_eq!(tex.height, 4);
        assert_eq!(tex.pixels.len(), 8 * 4 * 4);
        assert!(tex.pixels.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_texture_pixel_roundtrip() {
        let mut tex = Texture::new(4, 4);
        tex.put_pixel(2, 3, [1, 2, 3, 4]);
        assert_eq!(tex.pixel(2, 3), Some([1, 2, 3, 4]));
        assert_eq!(tex.pixel(4, 0), None);
    }

    #[test]
    fn test_texture_json_roundtrip() {
        let mut tex = Texture::new(2, 1);
        tex.put_pixel(1, 0, [9, 8, 7, 6]);
        let json = serde_json::to_string(&tex).unwrap();
        let back: Texture = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tex);
    }

    #[test]
    fn test_texture_put_pixel_out_of_bounds() {
        let mut tex = Texture::new(2, 2);
        tex.put_pixel(5, 5, [255; 4]);
        assert!(tex.pixels.iter().all(|&b| b == 0));
    }
}
