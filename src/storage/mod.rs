use fixed::types::I14F2;
use heapless::HistoryBuffer;

use crate::{thermometer::Temperature, time::Instant};

/// Ring of the last `N` log entries, each holding `C` channels.
pub struct Storage<const N: usize, const C: usize> {
    temps: HistoryBuffer<Entry<C>, N>,
}

impl<const N: usize, const C: usize> Storage<N, C> {
    pub const fn new() -> Self {
        Self {
            temps: HistoryBuffer::new(),
        }
    }

    /// Append a reading of every channel; `None` marks a failed read.
    pub fn write(&mut self, now: Instant, temps: &[Option<Temperature>; C], heating: bool) {
        self.temps.write(Entry::new(now, temps, heating));
    }

    pub fn recent(&self) -> Option<Entry<C>> {
        self.temps.recent().copied()
    }

    /// Entries from oldest to newest.
    pub fn oldest(&self) -> impl Iterator<Item = Entry<C>> + '_ {
        self.temps.oldest_ordered().copied()
    }

    pub fn len(&self) -> usize {
        self.temps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.temps.len() == 0
    }

    pub fn clear(&mut self) {
        self.temps.clear();
    }
}

impl<const N: usize, const C: usize> Default for Storage<N, C> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone)]
#[repr(C, packed)]
pub struct Entry<const C: usize> {
    /// Seconds since startup (LSB u24)
    secs: [u8; 3],
    /// Bit 0: heater asserted
    flags: u8,
    /// Reduced precision temperatures, `I14F2::MIN` for a failed read
    temps: [I14F2; C],
}

static_assertions::assert_eq_size!(Entry<2>, u64);

impl<const C: usize> Entry<C> {
    const HEATING: u8 = 1 << 0;
    const MISSING: I14F2 = I14F2::MIN;

    #[inline]
    fn new(now: Instant, temps: &[Option<Temperature>; C], heating: bool) -> Self {
        let secs = now.duration_since_epoch().to_secs();
        let [b0, b1, b2, _] = secs.to_le_bytes();

        Self {
            secs: [b0, b1, b2],
            flags: if heating { Self::HEATING } else { 0 },
            temps: temps.map(|t| t.map_or(Self::MISSING, reduce)),
        }
    }

    pub const fn secs(&self) -> u32 {
        let [b0, b1, b2] = self.secs;
        u32::from_le_bytes([b0, b1, b2, 0])
    }

    pub const fn heating(&self) -> bool {
        self.flags & Self::HEATING != 0
    }

    /// Logged temperature of a channel, `None` if the read failed or the channel does not exist.
    pub fn temp(&self, channel: usize) -> Option<Temperature> {
        let temps = self.temps;
        temps
            .get(channel)
            .filter(|t| **t != Self::MISSING)
            .map(|t| Temperature::from_num(*t))
    }
}

impl<const C: usize> core::fmt::Debug for Entry<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let temps = self.temps;
        f.debug_struct("Entry")
            .field("secs", &self.secs())
            .field("heating", &self.heating())
            .field("temps", &temps)
            .finish()
    }
}

/// Round to the 0.25 °C log resolution, saturating at the edge of the range.
#[inline]
fn reduce(temp: Temperature) -> I14F2 {
    let reduced = I14F2::saturating_from_num(temp);
    // Keep the sentinel free for failed reads
    if reduced == I14F2::MIN {
        I14F2::MIN + I14F2::DELTA
    } else {
        reduced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(v: f32) -> Temperature {
        Temperature::from_num(v)
    }

    #[test]
    fn keeps_last_n_in_order() {
        let mut storage = Storage::<4, 2>::new();
        assert!(storage.is_empty());
        assert!(storage.recent().is_none());

        for i in 0..6u32 {
            storage.write(
                Instant::from_ticks(i * 1_000),
                &[Some(t(20.0 + i as f32)), None],
                i % 2 == 0,
            );
        }

        assert_eq!(storage.len(), 4);
        let secs: heapless::Vec<u32, 4> = storage.oldest().map(|e| e.secs()).collect();
        assert_eq!(secs.as_slice(), &[2, 3, 4, 5]);

        let recent = storage.recent().unwrap();
        assert_eq!(recent.secs(), 5);
        assert!(!recent.heating());
        assert_eq!(recent.temp(0), Some(t(25.0)));
        assert_eq!(recent.temp(1), None);
        assert_eq!(recent.temp(2), None);

        storage.clear();
        assert!(storage.is_empty());
    }

    #[test]
    fn reduces_precision_to_quarter_degrees() {
        let mut storage = Storage::<1, 1>::new();
        storage.write(Instant::from_ticks(0), &[Some(t(100.3125))], true);

        let entry = storage.recent().unwrap();
        assert!(entry.heating());
        assert_eq!(entry.temp(0), Some(t(100.25)));
    }

    #[test]
    fn out_of_range_saturates() {
        let mut storage = Storage::<2, 1>::new();
        storage.write(Instant::from_ticks(0), &[Some(t(100_000.0))], false);
        storage.write(Instant::from_ticks(0), &[Some(t(-100_000.0))], false);

        let entries: heapless::Vec<Entry<1>, 2> = storage.oldest().collect();
        assert_eq!(entries[0].temp(0), Some(Temperature::from_num(I14F2::MAX)));
        assert_eq!(
            entries[1].temp(0),
            Some(Temperature::from_num(I14F2::MIN + I14F2::DELTA))
        );
    }
}
