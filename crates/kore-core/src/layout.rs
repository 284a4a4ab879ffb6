//! Memory layout tags for 4-D tensors.

use std::fmt;
use std::str::FromStr;

use crate::KoreError;

const LAYOUT_NAMES: [&str; 4] = ["NHWC", "NCHW", "ANYLAYOUT", "MKLDNNLAYOUT"];

/// Physical arrangement of a tensor's elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DataLayout {
    /// Channels-last
    Nhwc = 0,
    /// Channels-first
    Nchw = 1,
    /// Wildcard: compatible with every layout
    #[default]
    AnyLayout = 2,
    /// Opaque blocked layout owned by the MKL-DNN backend
    MklDnn = 3,
}

impl DataLayout {
    pub const ALL: [DataLayout; 4] = [
        DataLayout::Nhwc,
        DataLayout::Nchw,
        DataLayout::AnyLayout,
        DataLayout::MklDnn,
    ];

    /// Stable ordinal, used for kernel hashing.
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    pub fn is_any(&self) -> bool {
        matches!(self, DataLayout::AnyLayout)
    }
}

/// Whether data in layout `l` must be rearranged before a consumer expecting `r`
/// can read it. `AnyLayout` on either side never requires a transform.
pub fn need_transform_layout(l: DataLayout, r: DataLayout) -> bool {
    !l.is_any() && !r.is_any() && l != r
}

impl FromStr for DataLayout {
    type Err = KoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.to_ascii_uppercase();
        LAYOUT_NAMES
            .iter()
            .position(|name| *name == key)
            .map(|i| Self::ALL[i])
            .ok_or_else(|| KoreError::UnknownEnumerator {
                kind: "DataLayout",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for DataLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(LAYOUT_NAMES[*self as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("nhwc".parse::<DataLayout>().unwrap(), DataLayout::Nhwc);
        assert_eq!("NcHw".parse::<DataLayout>().unwrap(), DataLayout::Nchw);
        assert_eq!("AnyLayout".parse::<DataLayout>().unwrap(), DataLayout::AnyLayout);
        assert_eq!("mkldnnlayout".parse::<DataLayout>().unwrap(), DataLayout::MklDnn);
    }

    #[test]
    fn test_round_trip() {
        for layout in DataLayout::ALL {
            assert_eq!(layout.to_string().parse::<DataLayout>().unwrap(), layout);
        }
    }

    #[test]
    fn test_unknown_layout_fails() {
        let err = "NWCH".parse::<DataLayout>().unwrap_err();
        assert!(err.to_string().contains("NWCH"));
        assert!("".parse::<DataLayout>().is_err());
    }

    #[test]
    fn test_need_transform_layout() {
        assert!(need_transform_layout(DataLayout::Nhwc, DataLayout::Nchw));
        assert!(need_transform_layout(DataLayout::MklDnn, DataLayout::Nchw));
        assert!(!need_transform_layout(DataLayout::Nhwc, DataLayout::Nhwc));
        assert!(!need_transform_layout(DataLayout::AnyLayout, DataLayout::Nchw));
        assert!(!need_transform_layout(DataLayout::Nhwc, DataLayout::AnyLayout));
    }
}
