use std::fmt::Display;

#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hz(pub u64);

#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Khz(pub u32);

impl From<Khz> for Hz {
    fn from(value: Khz) -> Self {
        Self(u64::from(value.0) * 1000)
    }
}

impl Khz {
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Display for Khz {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} kHz", self.0)
    }
}

impl Display for Hz {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} Hz", self.0)
    }
}
