//! Fixed-point exponential and logarithm
//!
//! All values carry 18 decimal digits (`WAD = 1e18`). `exp` is evaluated as a
//! power of two: the exponent is rebased by `log2(e)`, the integer part becomes
//! a bit shift and the fractional part goes through a 64-entry table of
//! `2^(k/64)` followed by a 6-term polynomial on the remaining `[0, 1/64)`.
//! `ln` is `log2(x) * ln(2)`, with `log2` built from the most significant bit
//! plus iterative squaring for the fractional bits.
//!
//! Relative error stays around 1e-17 in the reduced range; `exp(ln(x))` and
//! `ln(exp(x))` agree with their input only up to that tolerance.

use crate::error::LmsrMarketError;

/// 1.0 in fixed point
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// 0.5 in fixed point
pub const HALF_WAD: u128 = WAD / 2;

/// ln(2) in fixed point
pub const LN_2: u128 = 693_147_180_559_945_309;

/// log2(e) = 1 / ln(2) in fixed point
pub const LOG2_E: u128 = 1_442_695_040_888_963_407;

/// Largest accepted `exp` input (46.0). `2^(46 * log2 e)` scaled by WAD still fits in u128.
pub const MAX_EXP_INPUT: i128 = 46 * WAD as i128;

/// ln(1e-18): below this `exp` rounds to zero.
pub const MIN_EXP_INPUT: i128 = -41_446_531_673_892_822_312;

/// Width of one table step for the fractional part of `exp2` (1/64)
const FRAC_STEP: u128 = WAD / 64;

/// `2^(k/64)` for k in 0..64, rounded to the nearest WAD unit
const EXP2_TABLE: [u128; 64] = [
    1_000_000_000_000_000_000,
    1_010_889_286_051_700_460,
    1_021_897_148_654_116_678,
    1_033_024_879_021_228_423,
    1_044_273_782_427_413_840,
    1_055_645_178_360_557_159,
    1_067_140_400_676_823_618,
    1_078_760_797_757_119_794,
    1_090_507_732_665_257_659,
    1_102_382_583_307_840_944,
    1_114_386_742_595_892_536,
    1_126_521_618_608_241_900,
    1_138_788_634_756_691_654,
    1_151_189_229_952_982_706,
    1_163_724_858_777_577_514,
    1_176_396_991_650_281_276,
    1_189_207_115_002_721_067,
    1_202_156_731_452_703_142,
    1_215_247_359_980_468_878,
    1_228_480_536_106_870_006,
    1_241_857_812_073_484_049,
    1_255_380_757_024_691_090,
    1_269_050_957_191_733_223,
    1_282_870_016_078_778_281,
    1_296_839_554_651_009_666,
    1_310_961_211_524_764_342,
    1_325_236_643_159_741_295,
    1_339_667_524_053_303_005,
    1_354_255_546_936_892_728,
    1_369_002_422_974_590_612,
    1_383_909_881_963_831_955,
    1_398_979_672_538_311_140,
    1_414_213_562_373_095_049,
    1_429_613_338_391_970_011,
    1_445_180_806_977_046_620,
    1_460_917_794_180_646_989,
    1_476_826_145_939_499_311,
    1_492_907_728_291_264_849,
    1_509_164_427_593_422_740,
    1_525_598_150_744_538_307,
    1_542_210_825_407_940_824,
    1_559_004_400_237_836_967,
    1_575_980_845_107_886_486,
    1_593_142_151_342_266_898,
    1_610_490_331_949_254_308,
    1_628_027_421_857_347_767,
    1_645_755_478_153_964_845,
    1_663_676_580_326_736_435,
    1_681_792_830_507_429_086,
    1_700_106_353_718_523_470,
    1_718_619_298_122_477_916,
    1_737_333_835_273_706_249,
    1_756_252_160_373_299_483,
    1_775_376_492_526_521_253,
    1_794_709_075_003_107_186,
    1_814_252_175_500_398_756,
    1_834_008_086_409_342_463,
    1_853_979_125_083_385_568,
    1_874_167_634_110_299_901,
    1_894_575_981_586_965_641,
    1_915_206_561_397_147_294,
    1_936_061_793_492_294_451,
    1_957_144_124_175_400_269,
    1_978_456_026_387_950_968,
];

/// Coefficients (lowest degree first) of the minimax fit of `2^r` on `[0, 1/64)`.
/// The constant term is pinned to exactly 1.0 so that `exp(0) == WAD`.
const EXP2_POLY: [u128; 6] = [
    1_000_000_000_000_000_000,
    693_147_180_559_945_591,
    240_226_506_958_200_661,
    55_504_109_125_573_042,
    9_618_046_570_606_250,
    1_339_387_974_298_852,
];

/// Natural exponential of a signed fixed-point value.
///
/// Fails with `NumericOverflow` above [`MAX_EXP_INPUT`], returns exactly zero
/// below [`MIN_EXP_INPUT`].
pub fn exp(x: i128) -> Result<u128, LmsrMarketError> {
    if x > MAX_EXP_INPUT {
        return Err(LmsrMarketError::NumericOverflow);
    }
    if x < MIN_EXP_INPUT {
        return Ok(0);
    }

    // |x| <= 46e18 and LOG2_E < 1.5e18, so the product stays far below i128::MAX
    let x2 = x
        .checked_mul(LOG2_E as i128)
        .ok_or(LmsrMarketError::NumericOverflow)?
        / WAD as i128;

    exp2(x2)
}

/// Binary exponential of a signed fixed-point value.
pub fn exp2(x: i128) -> Result<u128, LmsrMarketError> {
    let wad = WAD as i128;
    let whole = x.div_euclid(wad);
    let frac = x.rem_euclid(wad) as u128;

    let mantissa = exp2_fraction(frac);

    if whole >= 0 {
        if whole >= 127 {
            return Err(LmsrMarketError::NumericOverflow);
        }
        mantissa
            .checked_mul(1u128 << whole)
            .ok_or(LmsrMarketError::NumericOverflow)
    } else {
        let shift = whole.unsigned_abs();
        if shift >= 128 {
            Ok(0)
        } else {
            Ok(mantissa >> shift)
        }
    }
}

/// `2^f` for `f` in `[0, WAD)`, result in `[WAD, 2 * WAD)`
fn exp2_fraction(frac: u128) -> u128 {
    let k = (frac / FRAC_STEP) as usize;
    let r = frac - (k as u128) * FRAC_STEP;

    // Horner on the reduced remainder
    let mut acc = EXP2_POLY[5];
    for coeff in EXP2_POLY[..5].iter().rev() {
        acc = coeff + acc * r / WAD;
    }

    EXP2_TABLE[k] * acc / WAD
}

/// Natural logarithm of an unsigned fixed-point value.
///
/// Non-positive input is a domain error and fails with `NumericUnderflow`.
pub fn ln(x: u128) -> Result<i128, LmsrMarketError> {
    let l2 = log2(x)?;
    l2.checked_mul(LN_2 as i128)
        .map(|v| v / WAD as i128)
        .ok_or(LmsrMarketError::NumericOverflow)
}

/// Binary logarithm of an unsigned fixed-point value.
pub fn log2(x: u128) -> Result<i128, LmsrMarketError> {
    if x == 0 {
        return Err(LmsrMarketError::NumericUnderflow);
    }

    if x >= WAD {
        Ok(log2_at_least_one(x) as i128)
    } else {
        // log2(x) = -log2(1/x); WAD * WAD fits in u128
        let inverse = WAD * WAD / x;
        Ok(-(log2_at_least_one(inverse) as i128))
    }
}

/// `log2(x)` for `x >= WAD`
fn log2_at_least_one(x: u128) -> u128 {
    let n = most_significant_bit(x / WAD);
    let mut result = (n as u128) * WAD;

    // Normalize into [1, 2)
    let mut y = x >> n;
    if y == WAD {
        return result;
    }

    let double_wad = 2 * WAD;
    let mut delta = HALF_WAD;
    for _ in 0..64 {
        if delta == 0 {
            break;
        }
        y = y * y / WAD;
        if y >= double_wad {
            result += delta;
            y >>= 1;
        }
        delta >>= 1;
    }

    result
}

/// Index of the highest set bit. Caller guarantees `v >= 1`.
fn most_significant_bit(v: u128) -> u32 {
    127 - v.leading_zeros()
}
