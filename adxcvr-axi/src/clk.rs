use adxcvr_io::units::Khz;
use eyre::Result;
use tracing::instrument;

/// Operations a clock framework drives on a rate-programmable clock source.
pub trait ClkOps {
    fn enable(&mut self) -> Result<()>;

    fn disable(&mut self) -> Result<()>;

    fn recalc_rate(&mut self, parent_rate: Khz) -> Result<Khz>;

    /// The rate [`ClkOps::set_rate`] would produce, without touching hardware.
    fn round_rate(&mut self, rate: Khz, parent_rate: Khz) -> Result<Khz>;

    fn set_rate(&mut self, rate: Khz, parent_rate: Khz) -> Result<()>;
}

impl<P: ClkOps + ?Sized> ClkOps for &mut P {
    fn enable(&mut self) -> Result<()> {
        P::enable(&mut **self)
    }

    fn disable(&mut self) -> Result<()> {
        P::disable(&mut **self)
    }

    fn recalc_rate(&mut self, parent_rate: Khz) -> Result<Khz> {
        P::recalc_rate(&mut **self, parent_rate)
    }

    fn round_rate(&mut self, rate: Khz, parent_rate: Khz) -> Result<Khz> {
        P::round_rate(&mut **self, rate, parent_rate)
    }

    fn set_rate(&mut self, rate: Khz, parent_rate: Khz) -> Result<()> {
        P::set_rate(&mut **self, rate, parent_rate)
    }
}

/// A named clock backed by a provider.
pub struct Clk<P> {
    name: String,
    provider: P,
}

impl<P: ClkOps> Clk<P> {
    pub fn new(name: impl Into<String>, provider: P) -> Self {
        Self {
            name: name.into(),
            provider,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn into_provider(self) -> P {
        self.provider
    }

    #[instrument(skip_all, fields(clk = %self.name))]
    pub fn enable(&mut self) -> Result<()> {
        self.provider.enable()
    }

    #[instrument(skip_all, fields(clk = %self.name))]
    pub fn disable(&mut self) -> Result<()> {
        self.provider.disable()
    }

    pub fn recalc_rate(&mut self, parent_rate: Khz) -> Result<Khz> {
        self.provider.recalc_rate(parent_rate)
    }

    pub fn round_rate(&mut self, rate: Khz, parent_rate: Khz) -> Result<Khz> {
        self.provider.round_rate(rate, parent_rate)
    }

    #[instrument(skip_all, fields(clk = %self.name, %rate))]
    pub fn set_rate(&mut self, rate: Khz, parent_rate: Khz) -> Result<()> {
        self.provider.set_rate(rate, parent_rate)
    }
}
