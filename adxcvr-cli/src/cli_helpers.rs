use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use adxcvr_io::units::Khz;
use color_eyre::eyre::{OptionExt, bail};

/// A clock or lane rate, written with a `k`, `M` or `G` suffix
/// (`625M`, `6.25G`, `156250k`). Bare numbers are kHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate(pub Khz);

impl FromStr for Rate {
    type Err = color_eyre::eyre::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (num, scale) = match s.char_indices().last().ok_or_eyre("empty rate")? {
            (i, 'k' | 'K') => (&s[..i], 1),
            (i, 'M') => (&s[..i], 1_000),
            (i, 'G') => (&s[..i], 1_000_000),
            _ => (s, 1),
        };
        let (int, frac) = num.split_once('.').unwrap_or((num, ""));
        if frac.len() > 6 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            bail!("bad fraction in {s:?}");
        }

        let int: u64 = int.parse()?;
        let mut khz = int * scale;
        if !frac.is_empty() {
            let digits = frac.len() as u32;
            let frac: u64 = frac.parse()?;
            let frac = frac * scale;
            let den = 10u64.pow(digits);
            if frac % den != 0 {
                bail!("{s:?} is not a whole number of kHz");
            }
            khz += frac / den;
        }
        Ok(Self(Khz(u32::try_from(khz)?)))
    }
}

impl Display for Rate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let khz = self.0.0;
        let (unit, scale, width) = match khz {
            1_000_000.. => ('G', 1_000_000, 6),
            1_000.. => ('M', 1_000, 3),
            _ => ('k', 1, 0),
        };
        let (int, frac) = (khz / scale, khz % scale);
        if frac == 0 {
            return write!(f, "{int}{unit}");
        }
        let frac = format!("{frac:0width$}");
        write!(f, "{int}.{}{unit}", frac.trim_end_matches('0'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let khz = |s: &str| s.parse::<Rate>().map(|r| r.0.0).ok();
        assert_eq!(khz("625M"), Some(625_000));
        assert_eq!(khz("6.25G"), Some(6_250_000));
        assert_eq!(khz("156.25M"), Some(156_250));
        assert_eq!(khz("156250k"), Some(156_250));
        assert_eq!(khz("156250"), Some(156_250));
        assert_eq!(khz("1.0005M"), None);
        assert_eq!(khz("M"), None);
        assert_eq!(khz(""), None);
        assert_eq!(khz("5000G"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Rate(Khz(6_250_000)).to_string(), "6.25G");
        assert_eq!(Rate(Khz(625_000)).to_string(), "625M");
        assert_eq!(Rate(Khz(156_250)).to_string(), "156.25M");
        assert_eq!(Rate(Khz(10_312_500)).to_string(), "10.3125G");
        assert_eq!(Rate(Khz(500)).to_string(), "500k");
    }
}
