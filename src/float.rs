//! Floating-point width selection and NaN/Inf normalization.
//!
//! Width changes are only ever bit-exact: a finite value shrinks when the
//! narrower format round-trips to the identical `f64`, a NaN shrinks when
//! the mantissa bits that would be dropped are already zero. Widening for
//! [`crate::Float::value`] reverses the same mantissa alignment, so NaN
//! payloads survive a decode/encode cycle under the preserve policies.

use half::f16;

use crate::profile::{EncodeOptions, FloatMode, InfMode, NanMode};
use crate::value::{Float, FloatWidth};

const F64_EXP_MASK: u64 = 0x7ff0_0000_0000_0000;
const F64_MANT_MASK: u64 = 0x000f_ffff_ffff_ffff;
const F32_EXP_MASK: u64 = 0x7f80_0000;
const F32_MANT_MASK: u64 = 0x007f_ffff;
const F16_EXP_MASK: u64 = 0x7c00;
const F16_MANT_MASK: u64 = 0x03ff;

/// The canonical quiet NaN, as float16 bits.
const CANONICAL_NAN_F16: u64 = 0x7e00;

fn is_nan(width: FloatWidth, bits: u64) -> bool {
    match width {
        FloatWidth::F16 => bits & F16_EXP_MASK == F16_EXP_MASK && bits & F16_MANT_MASK != 0,
        FloatWidth::F32 => bits & F32_EXP_MASK == F32_EXP_MASK && bits & F32_MANT_MASK != 0,
        FloatWidth::F64 => bits & F64_EXP_MASK == F64_EXP_MASK && bits & F64_MANT_MASK != 0,
    }
}

fn is_infinite(width: FloatWidth, bits: u64) -> bool {
    match width {
        FloatWidth::F16 => bits & 0x7fff == F16_EXP_MASK,
        FloatWidth::F32 => bits & 0x7fff_ffff == F32_EXP_MASK,
        FloatWidth::F64 => bits & 0x7fff_ffff_ffff_ffff == F64_EXP_MASK,
    }
}

/// Widen a bit pattern to `f64` bits, preserving NaN payload alignment.
pub(crate) fn widen_to_f64(width: FloatWidth, bits: u64) -> u64 {
    match width {
        FloatWidth::F64 => bits,
        FloatWidth::F32 => {
            if is_nan(width, bits) {
                let sign = (bits >> 31) & 1;
                let mant = bits & F32_MANT_MASK;
                (sign << 63) | F64_EXP_MASK | (mant << 29)
            } else {
                f64::from(f32::from_bits(bits as u32)).to_bits()
            }
        }
        FloatWidth::F16 => {
            if is_nan(width, bits) {
                let sign = (bits >> 15) & 1;
                let mant = bits & F16_MANT_MASK;
                (sign << 63) | F64_EXP_MASK | (mant << 42)
            } else {
                f16::from_bits(bits as u16).to_f64().to_bits()
            }
        }
    }
}

/// Set the quiet bit (mantissa MSB) at the pattern's own width.
fn set_quiet(width: FloatWidth, bits: u64) -> u64 {
    match width {
        FloatWidth::F16 => bits | 0x0200,
        FloatWidth::F32 => bits | 0x0040_0000,
        FloatWidth::F64 => bits | 0x0008_0000_0000_0000,
    }
}

/// Shrink a NaN pattern as far as the payload allows, one width at a time.
fn shrink_nan(width: FloatWidth, bits: u64) -> (FloatWidth, u64) {
    let (mut width, mut bits) = (width, bits);
    if width == FloatWidth::F64 {
        let mant = bits & F64_MANT_MASK;
        if mant & ((1 << 29) - 1) == 0 {
            let sign = (bits >> 63) & 1;
            bits = (sign << 31) | F32_EXP_MASK | (mant >> 29);
            width = FloatWidth::F32;
        }
    }
    if width == FloatWidth::F32 {
        let mant = bits & F32_MANT_MASK;
        if mant & ((1 << 13) - 1) == 0 {
            let sign = (bits >> 31) & 1;
            bits = (sign << 15) | F16_EXP_MASK | (mant >> 13);
            width = FloatWidth::F16;
        }
    }
    (width, bits)
}

/// The narrowest width whose round-trip reproduces the finite value `v`.
fn shortest_finite(v: f64) -> (FloatWidth, u64) {
    let h = f16::from_f64(v);
    if h.to_f64() == v {
        return (FloatWidth::F16, u64::from(h.to_bits()));
    }
    let s = v as f32;
    if f64::from(s) == v {
        return (FloatWidth::F32, u64::from(s.to_bits()));
    }
    (FloatWidth::F64, v.to_bits())
}

/// Write the `0xf9`/`0xfa`/`0xfb` item for `bits` at `width`.
fn write_at(buf: &mut Vec<u8>, width: FloatWidth, bits: u64) {
    match width {
        FloatWidth::F16 => {
            buf.push(0xf9);
            buf.extend_from_slice(&(bits as u16).to_be_bytes());
        }
        FloatWidth::F32 => {
            buf.push(0xfa);
            buf.extend_from_slice(&(bits as u32).to_be_bytes());
        }
        FloatWidth::F64 => {
            buf.push(0xfb);
            buf.extend_from_slice(&bits.to_be_bytes());
        }
    }
}

/// Encode `f` under the profile's float policies.
pub(crate) fn encode_float(buf: &mut Vec<u8>, f: Float, opts: &EncodeOptions) {
    let width = f.width();
    let bits = f.bits();

    if is_nan(width, bits) {
        match opts.nan {
            NanMode::Canonical => write_at(buf, FloatWidth::F16, CANONICAL_NAN_F16),
            NanMode::Preserve => write_at(buf, width, bits),
            NanMode::PreserveSignal => {
                let (w, b) = shrink_nan(width, bits);
                write_at(buf, w, b);
            }
            NanMode::Quiet => {
                let (w, b) = shrink_nan(width, set_quiet(width, bits));
                write_at(buf, w, b);
            }
        }
        return;
    }

    if is_infinite(width, bits) {
        match opts.inf {
            InfMode::Float16 => {
                let sign = match width {
                    FloatWidth::F16 => (bits >> 15) & 1,
                    FloatWidth::F32 => (bits >> 31) & 1,
                    FloatWidth::F64 => (bits >> 63) & 1,
                };
                write_at(buf, FloatWidth::F16, (sign << 15) | F16_EXP_MASK);
            }
            InfMode::Preserve => write_at(buf, width, bits),
        }
        return;
    }

    match opts.float {
        FloatMode::Shortest => {
            let (w, b) = shortest_finite(f.value());
            write_at(buf, w, b);
        }
        FloatMode::None => write_at(buf, width, bits),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(f: Float, opts: &EncodeOptions) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_float(&mut buf, f, opts);
        buf
    }

    fn shortest() -> EncodeOptions {
        EncodeOptions {
            float: FloatMode::Shortest,
            ..EncodeOptions::default()
        }
    }

    #[test]
    fn shortest_picks_float16_for_1_5() {
        assert_eq!(enc(Float::from_f64(1.5), &shortest()), vec![0xf9, 0x3e, 0x00]);
        assert_eq!(enc(Float::from_f32(1.5), &shortest()), vec![0xf9, 0x3e, 0x00]);
    }

    #[test]
    fn shortest_keeps_width_when_needed() {
        // 0.1 has no exact narrower representation.
        let out = enc(Float::from_f64(0.1), &shortest());
        assert_eq!(out[0], 0xfb);
        // 1/3 as f32 survives at f32 but not f16.
        let third = 1.0f32 / 3.0;
        let out = enc(Float::from_f32(third), &shortest());
        assert_eq!(out[0], 0xfa);
    }

    #[test]
    fn negative_zero_keeps_sign_when_shrunk() {
        assert_eq!(enc(Float::from_f64(-0.0), &shortest()), vec![0xf9, 0x80, 0x00]);
    }

    #[test]
    fn nan_modes_follow_payload_rules() {
        let quiet = EncodeOptions {
            nan: NanMode::Quiet,
            ..EncodeOptions::default()
        };
        let preserve_signal = EncodeOptions {
            nan: NanMode::PreserveSignal,
            ..EncodeOptions::default()
        };
        let preserve = EncodeOptions {
            nan: NanMode::Preserve,
            ..EncodeOptions::default()
        };

        // f32 sNaN with payload only in the high mantissa bits.
        let snan = Float::from_f32(f32::from_bits(0x7f80_2000));
        assert_eq!(enc(snan, &preserve), vec![0xfa, 0x7f, 0x80, 0x20, 0x00]);
        assert_eq!(enc(snan, &preserve_signal), vec![0xf9, 0x7c, 0x01]);
        assert_eq!(enc(snan, &quiet), vec![0xf9, 0x7e, 0x01]);

        // f64 qNaN whose payload does not fit f32.
        let wide = Float::from_f64(f64::from_bits(0x7ff8_0000_0000_0001));
        assert_eq!(
            enc(wide, &quiet),
            vec![0xfb, 0x7f, 0xf8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01]
        );

        // Default mode collapses everything to the canonical quiet NaN.
        assert_eq!(enc(wide, &EncodeOptions::default()), vec![0xf9, 0x7e, 0x00]);
    }

    #[test]
    fn inf_modes() {
        let preserve = EncodeOptions {
            inf: InfMode::Preserve,
            ..EncodeOptions::default()
        };
        assert_eq!(
            enc(Float::from_f64(f64::NEG_INFINITY), &EncodeOptions::default()),
            vec![0xf9, 0xfc, 0x00]
        );
        assert_eq!(
            enc(Float::from_f32(f32::INFINITY), &preserve),
            vec![0xfa, 0x7f, 0x80, 0x00, 0x00]
        );
    }

    #[test]
    fn widen_preserves_nan_payload() {
        let wide = widen_to_f64(FloatWidth::F16, 0x7e01);
        assert!(f64::from_bits(wide).is_nan());
        // Shrinking back under PreserveSignal reproduces the original bits.
        let (w, b) = shrink_nan(FloatWidth::F64, wide);
        assert_eq!((w, b), (FloatWidth::F16, 0x7e01));
    }
}
