//! Per-message counters and aggregate decode statistics.

use std::collections::BTreeMap;

use log::info;

use crate::header::{Header, WireFormat};

/// Messages whose headers carry a stale week stamp on some receiver
/// firmware: the ionosphere/UTC almanac logs. Excluded from time bounds
/// only when [`CounterConfig::gps_time_gap_fix`] is set.
const TIME_GAP_MESSAGE_IDS: [u16; 2] = [8, 1347];

/// Statistics configuration.
#[derive(Debug, Clone, Default)]
pub struct CounterConfig {
    /// Work around receiver firmware that stamps ionosphere/UTC almanac
    /// logs with a stale week, which would otherwise stretch the decode
    /// time bounds. Off by default; this is a firmware quirk, not a
    /// protocol rule.
    pub gps_time_gap_fix: bool,
}

/// Tallies for one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageInfo {
    /// Total frames decoded.
    pub count: u64,
    /// Of which in a binary wire form.
    pub binary: u64,
    /// Of which in a text wire form.
    pub ascii: u64,
}

/// Aggregate decode statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStatistics {
    /// Total messages decoded.
    pub total_messages: u64,
    /// Messages in binary wire forms.
    pub binary_messages: u64,
    /// Messages in text wire forms.
    pub ascii_messages: u64,
    /// Week of the earliest time-stamped message, 0 if none seen.
    pub start_week: u16,
    /// Milliseconds of the earliest time-stamped message.
    pub start_milliseconds: u32,
    /// Week of the latest time-stamped message, 0 if none seen.
    pub end_week: u16,
    /// Milliseconds of the latest time-stamped message.
    pub end_milliseconds: u32,
}

/// Counts decoded messages by id and name and tracks the stream's time
/// bounds.
#[derive(Debug, Default)]
pub struct MessageCounter {
    config: CounterConfig,
    by_id: BTreeMap<u16, MessageInfo>,
    by_name: BTreeMap<String, MessageInfo>,
    stats: DecoderStatistics,
}

impl Drop for MessageCounter {
    fn drop(&mut self) {
        if self.stats.total_messages > 0 {
            info!(
                "decoded {} messages ({} binary, {} ascii)",
                self.stats.total_messages, self.stats.binary_messages, self.stats.ascii_messages
            );
        }
    }
}

impl MessageCounter {
    /// Create a counter.
    #[must_use]
    pub fn new(config: CounterConfig) -> Self {
        Self {
            config,
            by_id: BTreeMap::new(),
            by_name: BTreeMap::new(),
            stats: DecoderStatistics::default(),
        }
    }

    /// Record one decoded message.
    pub fn count(&mut self, header: &Header) {
        let binary = matches!(
            header.format,
            WireFormat::Binary | WireFormat::ShortBinary
        );
        self.stats.total_messages += 1;
        if binary {
            self.stats.binary_messages += 1;
        } else {
            self.stats.ascii_messages += 1;
        }

        let info = if header.message_id != 0 {
            self.by_id.entry(header.message_id).or_default()
        } else {
            self.by_name.entry(header.message_name.clone()).or_default()
        };
        info.count += 1;
        if binary {
            info.binary += 1;
        } else {
            info.ascii += 1;
        }

        self.update_time_bounds(header);
    }

    fn update_time_bounds(&mut self, header: &Header) {
        // Week 0 means the receiver had no time; never let it set a bound.
        if header.week == 0 {
            return;
        }
        if self.config.gps_time_gap_fix && TIME_GAP_MESSAGE_IDS.contains(&header.message_id) {
            return;
        }
        let stamp = (header.week, header.milliseconds);
        let start = (self.stats.start_week, self.stats.start_milliseconds);
        let end = (self.stats.end_week, self.stats.end_milliseconds);
        if self.stats.start_week == 0 || stamp < start {
            self.stats.start_week = stamp.0;
            self.stats.start_milliseconds = stamp.1;
        }
        if self.stats.end_week == 0 || stamp > end {
            self.stats.end_week = stamp.0;
            self.stats.end_milliseconds = stamp.1;
        }
    }

    /// Aggregate statistics.
    #[must_use]
    pub fn statistics(&self) -> &DecoderStatistics {
        &self.stats
    }

    /// Per-id tallies (messages whose wire form carries an id).
    #[must_use]
    pub fn by_id(&self) -> &BTreeMap<u16, MessageInfo> {
        &self.by_id
    }

    /// Per-name tallies (messages counted before an id is known: NMEA,
    /// responses).
    #[must_use]
    pub fn by_name(&self) -> &BTreeMap<String, MessageInfo> {
        &self.by_name
    }

    /// Clear all tallies.
    pub fn reset(&mut self) {
        self.by_id.clear();
        self.by_name.clear();
        self.stats = DecoderStatistics::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Header;

    fn header(id: u16, format: WireFormat, week: u16, ms: u32) -> Header {
        Header {
            message_id: id,
            format,
            week,
            milliseconds: ms,
            ..Header::default()
        }
    }

    #[test]
    fn counts_by_id_and_format() {
        let mut c = MessageCounter::new(CounterConfig::default());
        c.count(&header(42, WireFormat::Binary, 1949, 1000));
        c.count(&header(42, WireFormat::Ascii, 1949, 2000));
        c.count(&header(43, WireFormat::ShortBinary, 1949, 3000));

        let info = c.by_id()[&42];
        assert_eq!(info.count, 2);
        assert_eq!(info.binary, 1);
        assert_eq!(info.ascii, 1);
        assert_eq!(c.statistics().total_messages, 3);
        assert_eq!(c.statistics().binary_messages, 2);
    }

    #[test]
    fn time_bounds() {
        let mut c = MessageCounter::new(CounterConfig::default());
        c.count(&header(42, WireFormat::Binary, 1949, 5000));
        c.count(&header(42, WireFormat::Binary, 1948, 9000));
        c.count(&header(42, WireFormat::Binary, 1949, 7000));
        let s = c.statistics();
        assert_eq!((s.start_week, s.start_milliseconds), (1948, 9000));
        assert_eq!((s.end_week, s.end_milliseconds), (1949, 7000));
    }

    #[test]
    fn week_zero_never_sets_bounds() {
        let mut c = MessageCounter::new(CounterConfig::default());
        c.count(&header(42, WireFormat::Binary, 0, 5000));
        assert_eq!(c.statistics().start_week, 0);
        assert_eq!(c.statistics().end_week, 0);
        assert_eq!(c.statistics().total_messages, 1);
    }

    #[test]
    fn time_gap_fix_excludes_almanac_ids() {
        let mut c = MessageCounter::new(CounterConfig {
            gps_time_gap_fix: true,
        });
        c.count(&header(8, WireFormat::Binary, 1000, 1));
        assert_eq!(c.statistics().start_week, 0);
        c.count(&header(42, WireFormat::Binary, 1949, 1));
        assert_eq!(c.statistics().start_week, 1949);

        // Without the fix the almanac id participates.
        let mut c = MessageCounter::new(CounterConfig::default());
        c.count(&header(8, WireFormat::Binary, 1000, 1));
        assert_eq!(c.statistics().start_week, 1000);
    }

    #[test]
    fn nmea_counts_by_name() {
        let mut c = MessageCounter::new(CounterConfig::default());
        let mut h = header(0, WireFormat::Nmea, 0, 0);
        h.message_name = "GPALM".to_string();
        c.count(&h);
        assert_eq!(c.by_name()["GPALM"].count, 1);
    }
}
