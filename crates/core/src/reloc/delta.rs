//! Delta-adjust encoder
//!
//! Used where there is no dedicated page/offset pair (x86-64). The field was
//! computed against the new copy of the variable; whatever it holds (a
//! RIP-relative displacement or an absolute pointer) resolves to the
//! persistent instance once shifted by `persistent - fresh`.

use super::{EncodeError, PatchSite};

pub(super) fn adjust(current: u64, site: &PatchSite) -> Result<u64, EncodeError> {
    let delta = site.persistent as i128 - site.fresh as i128;
    let overflow = || {
        EncodeError::OutOfRange(format!(
            "adjusting {}-byte field by {:#x} overflows",
            site.size, delta
        ))
    };

    match site.size {
        4 => {
            let value = current as u32 as i32;
            let delta = i32::try_from(delta).map_err(|_| overflow())?;
            let adjusted = value.checked_add(delta).ok_or_else(overflow)?;
            Ok(u64::from(adjusted as u32))
        }
        8 => {
            let value = current as i64;
            let delta = i64::try_from(delta).map_err(|_| overflow())?;
            let adjusted = value.checked_add(delta).ok_or_else(overflow)?;
            Ok(adjusted as u64)
        }
        size => Err(EncodeError::Unsupported(format!(
            "delta relocation with size {}",
            size
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(size: u8, persistent: usize, fresh: usize) -> PatchSite {
        PatchSite {
            address: 0x40_0000,
            size,
            persistent,
            fresh,
        }
    }

    #[test]
    fn test_rip_relative_displacement_moves_backwards() {
        // disp32 pointing 0x100 past the field at the new copy
        let s = site(4, 0x10_0000, 0x50_0000);
        let adjusted = adjust(0x100, &s).unwrap();
        assert_eq!(adjusted as u32 as i32, 0x100 - 0x40_0000);
    }

    #[test]
    fn test_negative_displacement_stays_in_field() {
        let s = site(4, 0x50_0000, 0x10_0000);
        let current = (-0x20i32) as u32 as u64;
        let adjusted = adjust(current, &s).unwrap();
        assert_eq!(adjusted as u32 as i32, 0x40_0000 - 0x20);
        // Upper half is never set for a 4-byte field
        assert_eq!(adjusted >> 32, 0);
    }

    #[test]
    fn test_pointer_field() {
        let s = site(8, 0x7F00_0000_1000, 0x7F10_0000_2000);
        assert_eq!(adjust(0x7F10_0000_2008, &s).unwrap(), 0x7F00_0000_1008);
    }

    #[test]
    fn test_overflow_is_out_of_range() {
        let s = site(4, 0x7FFF_FFF0, 0);
        let result = adjust(0x100, &s);
        assert!(matches!(result, Err(EncodeError::OutOfRange(_))));
    }

    #[test]
    fn test_bad_size() {
        let s = site(2, 0x10, 0x20);
        assert!(matches!(adjust(0, &s), Err(EncodeError::Unsupported(_))));
    }
}
