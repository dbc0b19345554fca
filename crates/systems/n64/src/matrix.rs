//! 4x4 model matrices and the N64 fixed-point wire format.
//!
//! Matrices are stored row-major as 16 f32s. The wire format is the RSP's
//! split 16.16 layout: 32 bytes of big-endian signed integer parts
//! followed by 32 bytes of unsigned fractional parts, element for
//! element.

use crate::segment::{read_u16, read_i16};

pub type Matrix = [f32; 16];

pub fn identity() -> Matrix {
    [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]
}

/// result = a * b, row-major.
pub fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    let mut result = [0.0f32; 16];
    for i in 0..4 {
        for j in 0..4 {
            result[i * 4 + j] = a[i * 4] * b[j]
                + a[i * 4 + 1] * b[4 + j]
                + a[i * 4 + 2] * b[8 + j]
                + a[i * 4 + 3] * b[12 + j];
        }
    }
    result
}

/// Load a matrix from its 64-byte split fixed-point encoding.
/// Short reads yield zero elements rather than faulting.
pub fn from_fixed(data: &[u8], offset: usize) -> Matrix {
    let mut matrix = [0.0f32; 16];
    for (i, elem) in matrix.iter_mut().enumerate() {
        let int_part = read_i16(data, offset + i * 2) as i32;
        let frac_part = read_u16(data, offset + 32 + i * 2) as i32;
        *elem = ((int_part << 16) | frac_part) as f32 / 65536.0;
    }
    matrix
}

/// Transform a point as a row vector (`v' = v * M`), the RSP convention:
/// translation lives in the fourth row. No perspective divide, projection
/// is the renderer's job.
pub fn transform_point(m: &Matrix, x: f32, y: f32, z: f32) -> [f32; 3] {
    [
        m[0] * x + m[4] * y + m[8] * z + m[12],
        m[1] * x + m[5] * y + m[9] * z + m[13],
        m[2] * x + m[6] * y + m[10] * z + m[14],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transform() {
        let m = identity();
        assert_eq!(transform_point(&m, 3.0, -4.0, 5.0), [3.0, -4.0, 5.0]);
    }

    #[test]
    fn test_multiply_identity() {
        let scale = [
            2.0, 0.0, 0.0, 0.0, //
            0.0, 2.0, 0.0, 0.0, //
            0.0, 0.0, 2.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        assert_eq!(multiply(&identity(), &scale), scale);
        assert_eq!(multiply(&scale, &identity()), scale);
    }

    #[test]
    fn test_translation_in_fourth_row() {
        let mut m = identity();
        m[12] = 10.0;
        m[13] = -5.0;
        m[14] = 2.0;
        assert_eq!(transform_point(&m, 1.0, 1.0, 1.0), [11.0, -4.0, 3.0]);
    }

    #[test]
    fn test_multiply_scaling() {
        let s2 = [
            2.0, 0.0, 0.0, 0.0, //
            0.0, 2.0, 0.0, 0.0, //
            0.0, 0.0, 2.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        let s3 = [
            3.0, 0.0, 0.0, 0.0, //
            0.0, 3.0, 0.0, 0.0, //
            0.0, 0.0, 3.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        let result = multiply(&s2, &s3);
        assert_eq!(result[0], 6.0);
        assert_eq!(result[5], 6.0);
        assert_eq!(result[10], 6.0);
        assert_eq!(result[15], 1.0);
    }

    #[test]
    fn test_from_fixed_split_format() {
        // Identity with one element of 1.5 (int 1, frac 0x8000) at [0].
        let mut bytes = vec![0u8; 64];
        let write_elem = |bytes: &mut Vec<u8>, i: usize, int: i16, frac: u16| {
            bytes[i * 2..i * 2 + 2].copy_from_slice(&int.to_be_bytes());
            bytes[32 + i * 2..32 + i * 2 + 2].copy_from_slice(&frac.to_be_bytes());
        };
        write_elem(&mut bytes, 0, 1, 0x8000);
        write_elem(&mut bytes, 5, 1, 0);
        write_elem(&mut bytes, 10, 1, 0);
        write_elem(&mut bytes, 15, 1, 0);

        let m = from_fixed(&bytes, 0);
        assert_eq!(m[0], 1.5);
        assert_eq!(m[5], 1.0);
        assert_eq!(m[1], 0.0);
    }

    #[test]
    fn test_from_fixed_negative() {
        let mut bytes = vec![0u8; 64];
        bytes[0..2].copy_from_slice(&(-2i16).to_be_bytes());
        let m = from_fixed(&bytes, 0);
        assert_eq!(m[0], -2.0);
    }

    #[test]
    fn test_from_fixed_short_buffer() {
        let m = from_fixed(&[0u8; 10], 0);
        assert!(m.iter().all(|&e| e == 0.0));
    }
}
