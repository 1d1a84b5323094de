//! Floating-point precision handling
//!
//! The operators compute in f32. Reduced-precision runs quantize their
//! inputs through IEEE half precision before evaluation, reproducing the
//! rounding a 16-bit kernel would see at its inputs.

use ndarray::Array1;
use std::fmt;

/// Data type precision levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Precision {
    /// 32-bit floating point (default)
    #[default]
    Fp32,
    /// 16-bit floating point (IEEE half precision)
    Fp16,
}

impl Precision {
    /// Size in bytes
    pub fn size_bytes(&self) -> usize {
        match self {
            Precision::Fp32 => 4,
            Precision::Fp16 => 2,
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Precision::Fp32 => "fp32",
            Precision::Fp16 => "fp16",
        }
    }

    /// Whether this is a reduced precision type
    pub fn is_reduced(&self) -> bool {
        matches!(self, Precision::Fp16)
    }

    /// Quantize an array to this precision
    ///
    /// Fp32 is the identity; Fp16 round-trips every element through half
    /// precision, discarding the bits a 16-bit representation cannot hold.
    pub fn quantize(&self, x: &Array1<f32>) -> Array1<f32> {
        match self {
            Precision::Fp32 => x.clone(),
            Precision::Fp16 => x.mapv(|v| fp16_to_f32(f32_to_fp16(v))),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Convert f32 to fp16 (IEEE half precision)
///
/// Note: this is a truncating conversion; values below the half-precision
/// normal range flush to zero.
pub fn f32_to_fp16(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = (bits >> 31) & 1;
    let exp = ((bits >> 23) & 0xFF) as i32;
    let mantissa = bits & 0x7F_FFFF;

    // Handle special cases
    if exp == 0xFF {
        // Inf or NaN
        return ((sign << 15) | 0x7C00 | (mantissa >> 13).min(1)) as u16;
    }

    let new_exp = exp - 127 + 15; // Rebias exponent

    if new_exp <= 0 {
        // Underflow to zero
        return (sign << 15) as u16;
    }

    if new_exp >= 31 {
        // Overflow to infinity
        return ((sign << 15) | 0x7C00) as u16;
    }

    // Normal number
    let new_mantissa = mantissa >> 13;
    ((sign << 15) | ((new_exp as u32) << 10) | new_mantissa) as u16
}

/// Convert fp16 to f32
pub fn fp16_to_f32(value: u16) -> f32 {
    let sign = u32::from((value >> 15) & 1);
    let exp = u32::from((value >> 10) & 0x1F);
    let mantissa = u32::from(value & 0x3FF);

    if exp == 0x1F {
        // Inf or NaN
        let new_mantissa = if mantissa != 0 { 0x40_0000 } else { 0 };
        return f32::from_bits((sign << 31) | 0x7F80_0000 | new_mantissa);
    }

    if exp == 0 {
        // Zero or denormal
        if mantissa == 0 {
            return f32::from_bits(sign << 31);
        }
        // Denormal - convert to normal
        let mut m = mantissa;
        let mut e = 1i32;
        while (m & 0x400) == 0 {
            m <<= 1;
            e -= 1;
        }
        let new_exp = ((e + 127 - 15) as u32) & 0xFF;
        let new_mantissa = (m & 0x3FF) << 13;
        return f32::from_bits((sign << 31) | (new_exp << 23) | new_mantissa);
    }

    // Normal number
    let new_exp = (exp + 127 - 15) & 0xFF;
    let new_mantissa = mantissa << 13;
    f32::from_bits((sign << 31) | (new_exp << 23) | new_mantissa)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_size_bytes() {
        assert_eq!(Precision::Fp32.size_bytes(), 4);
        assert_eq!(Precision::Fp16.size_bytes(), 2);
    }

    #[test]
    fn test_precision_name() {
        assert_eq!(Precision::Fp32.name(), "fp32");
        assert_eq!(Precision::Fp16.name(), "fp16");
    }

    #[test]
    fn test_precision_is_reduced() {
        assert!(!Precision::Fp32.is_reduced());
        assert!(Precision::Fp16.is_reduced());
    }

    #[test]
    fn test_precision_display() {
        assert_eq!(format!("{}", Precision::Fp16), "fp16");
    }

    #[test]
    fn test_precision_default() {
        assert_eq!(Precision::default(), Precision::Fp32);
    }

    #[test]
    fn test_f32_to_fp16_roundtrip() {
        let values = vec![0.0, 1.0, -1.0, 0.5, 100.0];
        for &val in &values {
            let fp16 = f32_to_fp16(val);
            let back = fp16_to_f32(fp16);
            // FP16 has limited precision
            if val.abs() > 1e-4 {
                let rel_err = (back - val).abs() / val.abs();
                assert!(rel_err < 0.01, "FP16 roundtrip error too large for {val}");
            }
        }
    }

    #[test]
    fn test_fp16_infinity() {
        let inf = f32_to_fp16(f32::INFINITY);
        let back = fp16_to_f32(inf);
        assert!(back.is_infinite() && back > 0.0);

        let neg_inf = f32_to_fp16(f32::NEG_INFINITY);
        let back_neg = fp16_to_f32(neg_inf);
        assert!(back_neg.is_infinite() && back_neg < 0.0);
    }

    #[test]
    fn test_fp16_underflow_flushes_to_zero() {
        // Below the half-precision normal range
        assert_eq!(fp16_to_f32(f32_to_fp16(1e-6)), 0.0);
        assert_eq!(fp16_to_f32(f32_to_fp16(-1e-6)), -0.0);
    }

    #[test]
    fn test_quantize_fp32_identity() {
        let x = ndarray::arr1(&[1.0, -2.5, 1e-6]);
        let q = Precision::Fp32.quantize(&x);
        assert_eq!(q, x);
    }

    #[test]
    fn test_quantize_fp16_rounds() {
        let x = ndarray::arr1(&[1.0, 0.1, -3.0]);
        let q = Precision::Fp16.quantize(&x);

        assert_eq!(q[0], 1.0);
        assert_eq!(q[2], -3.0);
        // 0.1 is not exactly representable in half precision
        assert!((q[1] - 0.1).abs() < 1e-3);
    }
}
